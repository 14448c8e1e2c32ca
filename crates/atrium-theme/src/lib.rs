//! Atrium Theme - token-based stylesheet themes
//!
//! A theme is a flat map of tokens loaded from `<themes_dir>/<name>.json`.
//! Applying one goes through these steps:
//!
//! ```text
//! load vars -> merge defaults -> derive tokens -> render template
//!           -> (optional) animate frames -> emit events -> persist
//! ```
//!
//! [`ThemeService`] owns the active theme and the only running
//! transition. Every apply bumps a generation counter, and animation ticks
//! carry the generation they were scheduled for, so a newer apply makes
//! older ticks no-ops.

pub mod animator;
pub mod color;
pub mod repository;
pub mod resolver;
pub mod service;
pub mod tokens;
pub mod watcher;

use std::path::PathBuf;

pub use animator::{AnimationState, ease, interpolate};
pub use color::{ColorFormat, Rgba};
pub use repository::{JsonThemeRepository, Theme, ThemeRepository};
pub use resolver::{ResolvedStyle, StyleTemplate};
pub use service::{ApplyOptions, TickOutcome, TickScheduler, ThemeService};
pub use tokens::{TokenMap, TokenSet, TokenSource, derive_tokens};
pub use watcher::{RetryPolicy, ThemeWatcher, WatchTargets, resolve_path};

/// Why a theme file could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum ThemeLoadError {
    #[error("Theme not found: {0}")]
    Missing(String),

    #[error("Invalid theme name: {0:?}")]
    InvalidName(String),

    #[error("Theme {name} is malformed: {reason}")]
    Malformed { name: String, reason: String },

    #[error("Failed to read theme {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Theme engine errors.
#[derive(Debug, thiserror::Error)]
pub enum ThemeError {
    #[error(transparent)]
    Load(#[from] ThemeLoadError),

    #[error("Failed to read template {path}: {source}")]
    Template {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to store theme {name}: {source}")]
    Storage {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to persist theme selection: {0}")]
    Settings(#[from] atrium_core::SettingsError),
}

/// Result type for theme operations
pub type ThemeResult<T> = Result<T, ThemeError>;
