//! Stylesheet templates and token substitution.
//!
//! Three placeholder syntaxes are equivalent: `{{name}}` (whitespace allowed
//! inside the braces), `${name}` and `{name}`. A single brace only counts
//! as a placeholder when an identifier follows it directly, so ordinary
//! stylesheet blocks such as `QWidget { color: red; }` pass through.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::tokens::{self, TokenMap, TokenSource};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\{\{\s*([A-Za-z_][A-Za-z0-9_.-]*)\s*\}\}|\$\{([A-Za-z_][A-Za-z0-9_.-]*)\}|\{([A-Za-z_][A-Za-z0-9_.-]*)\}",
    )
    .expect("placeholder pattern is valid")
});

fn token_name<'h>(caps: &Captures<'h>) -> &'h str {
    caps.get(1)
        .or_else(|| caps.get(2))
        .or_else(|| caps.get(3))
        .map(|m| m.as_str())
        .unwrap_or_default()
}

/// Output of a render: the stylesheet plus the tokens nothing could supply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedStyle {
    pub text: String,

    /// Unresolved token names in order of first appearance
    pub unresolved: Vec<String>,
}

impl ResolvedStyle {
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}

/// A stylesheet template with token placeholders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleTemplate {
    source: String,
}

impl StyleTemplate {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Names referenced by the template.
    pub fn placeholders(&self) -> BTreeSet<String> {
        PLACEHOLDER
            .captures_iter(&self.source)
            .map(|caps| token_name(&caps).to_string())
            .collect()
    }

    /// Substitutes every placeholder.
    ///
    /// Lookup order is `overrides`, then `tokens`, then the built-in
    /// defaults. Anything still missing becomes an empty string and is
    /// listed in [`ResolvedStyle::unresolved`].
    pub fn render<S>(&self, tokens: &S, overrides: Option<&TokenMap>) -> ResolvedStyle
    where
        S: TokenSource + ?Sized,
    {
        let mut unresolved: Vec<String> = Vec::new();

        let text = PLACEHOLDER.replace_all(&self.source, |caps: &Captures<'_>| {
            let name = token_name(caps);
            let value = overrides
                .and_then(|o| o.get(name).map(String::as_str))
                .or_else(|| tokens.token(name))
                .or_else(|| tokens::default_value(name));
            match value {
                Some(value) => value.to_string(),
                None => {
                    if !unresolved.iter().any(|n| n == name) {
                        unresolved.push(name.to_string());
                    }
                    String::new()
                }
            }
        });

        if !unresolved.is_empty() {
            tracing::debug!("Unresolved tokens: {}", unresolved.join(", "));
        }

        ResolvedStyle {
            text: text.into_owned(),
            unresolved,
        }
    }
}
