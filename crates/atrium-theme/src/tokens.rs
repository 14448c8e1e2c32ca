//! Token sets: built-in defaults, derived tokens and layered lookup.

use crate::color::{ColorFormat, Rgba};

pub use atrium_core::TokenMap;

/// Built-in tokens used when a theme does not define them.
pub const DEFAULT_TOKENS: &[(&str, &str)] = &[
    ("bg", "#1e1f29"),
    ("surface", "#282a36"),
    ("text", "#f8f8f2"),
    ("text_muted", "#6272a4"),
    ("accent", "#bd93f9"),
    ("border", "#44475a"),
    ("danger", "#ff5555"),
    ("success", "#50fa7b"),
    ("warning", "#f1fa8c"),
    ("radius", "8px"),
    ("font_family", "\"Segoe UI\", sans-serif"),
    ("font_size", "10pt"),
];

/// Overlay color used when `surface` is not a color.
pub const OVERLAY_FALLBACK: &str = "rgba(255,255,255,0.12)";

const CONTENT_SHIFT: f64 = 0.04;
const HOVER_SHIFT: f64 = 0.08;
const OVERLAY_ALPHA: f64 = 0.05;

/// Looks up a built-in default.
pub fn default_value(name: &str) -> Option<&'static str> {
    DEFAULT_TOKENS
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, value)| *value)
}

/// All built-in defaults as a map.
pub fn default_tokens() -> TokenMap {
    DEFAULT_TOKENS
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Computes derived tokens from a merged (defaults + vars) set.
///
/// Pure: the same input always yields the same output.
pub fn derive_tokens(base: &TokenMap) -> TokenMap {
    let mut derived = TokenMap::new();

    if let Some((bg, format)) = color_of(base, "bg") {
        let shifted = if bg.is_dark() {
            bg.lighten(CONTENT_SHIFT)
        } else {
            bg.darken(CONTENT_SHIFT)
        };
        derived.insert("content_bg".into(), shifted.format(format));
    }

    if let Some((accent, format)) = color_of(base, "accent") {
        let shifted = if accent.is_dark() {
            accent.lighten(HOVER_SHIFT)
        } else {
            accent.darken(HOVER_SHIFT)
        };
        derived.insert("accent_hover".into(), shifted.format(format));
    }

    let overlay = match color_of(base, "surface") {
        Some((surface, _)) => surface.with_alpha(OVERLAY_ALPHA).to_functional(),
        None => OVERLAY_FALLBACK.to_string(),
    };
    derived.insert("loading_overlay_bg".into(), overlay);

    derived
}

fn color_of(tokens: &TokenMap, name: &str) -> Option<(Rgba, ColorFormat)> {
    tokens.get(name).and_then(|v| Rgba::parse_with_format(v))
}

/// Anything tokens can be looked up in.
pub trait TokenSource {
    fn token(&self, name: &str) -> Option<&str>;
}

impl TokenSource for TokenMap {
    fn token(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

/// A theme's tokens in resolution order: vars, then derived, then defaults.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TokenSet {
    vars: TokenMap,
    derived: TokenMap,
}

impl TokenSet {
    pub fn new(vars: TokenMap) -> Self {
        let mut merged = default_tokens();
        merged.extend(vars.iter().map(|(k, v)| (k.clone(), v.clone())));
        let derived = derive_tokens(&merged);
        Self { vars, derived }
    }

    /// Defaults and their derived tokens only.
    pub fn builtin() -> Self {
        Self::new(TokenMap::new())
    }

    pub fn vars(&self) -> &TokenMap {
        &self.vars
    }

    pub fn derived(&self) -> &TokenMap {
        &self.derived
    }

    /// Every token with its effective value.
    pub fn flatten(&self) -> TokenMap {
        let mut flat = default_tokens();
        flat.extend(self.derived.clone());
        flat.extend(self.vars.clone());
        flat
    }
}

impl TokenSource for TokenSet {
    fn token(&self, name: &str) -> Option<&str> {
        self.vars
            .get(name)
            .or_else(|| self.derived.get(name))
            .map(String::as_str)
            .or_else(|| default_value(name))
    }
}
