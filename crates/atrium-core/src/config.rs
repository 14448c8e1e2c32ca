//! Shell configuration.
//!
//! Loaded from `<config dir>/atrium/config.toml`. Every section uses
//! `#[serde(default)]`, so a file only needs the keys it wants to change.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main shell configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Navigation settings
    pub router: RouterConfig,

    /// Theme engine settings
    pub theme: ThemeConfig,

    /// Hot-reload watcher settings
    pub watcher: WatcherConfig,

    /// Storage locations
    pub paths: PathsConfig,
}

impl Config {
    /// Loads config from the default location, falling back to defaults.
    pub fn load() -> Self {
        match Self::load_from_default_path() {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!("Using default configuration: {}", err);
                Self::default()
            }
        }
    }

    /// Loads config from a file.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    fn load_from_default_path() -> Result<Self, ConfigError> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Returns the default config file path.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("atrium").join("config.toml"))
    }

    /// Saves the config to `path`.
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        crate::settings::write_atomic(path.as_ref(), content.as_bytes())?;
        Ok(())
    }
}

/// How the router treats page instances across navigations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PagePolicy {
    /// Build a fresh page every time a route is entered.
    Rebuild,
    /// Build a page once per path and reuse it afterwards.
    #[default]
    CacheByPath,
}

/// Easing curve for theme transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EasingCurve {
    Linear,
    EaseIn,
    EaseOut,
    #[default]
    EaseInOut,
}

/// Router configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Maximum entries kept on each history stack
    pub max_history: usize,

    /// Page reuse policy
    pub page_policy: PagePolicy,

    /// Route shown when nothing was persisted
    pub first_route: String,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_history: 50,
            page_policy: PagePolicy::CacheByPath,
            first_route: "home".to_string(),
        }
    }
}

/// Theme engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeConfig {
    /// Directory holding `<name>.json` theme files
    pub themes_dir: PathBuf,

    /// Stylesheet template with token placeholders
    pub template_path: PathBuf,

    /// Theme used when nothing was persisted
    pub default_theme: String,

    /// Animate theme switches
    pub animate: bool,

    /// Transition duration in ms
    pub animation_ms: u64,

    /// Number of interpolation frames per transition
    pub animation_steps: u32,

    /// Transition easing
    pub easing: EasingCurve,

    /// Write the last applied stylesheet into the cache dir
    pub dump_stylesheet: bool,
}

impl ThemeConfig {
    /// Shortest transition that still reads as an animation.
    pub const MIN_ANIMATION_MS: u64 = 80;

    /// Transition duration, clamped to [`Self::MIN_ANIMATION_MS`].
    pub fn animation_duration(&self) -> Duration {
        Duration::from_millis(self.animation_ms.max(Self::MIN_ANIMATION_MS))
    }

    /// Number of frames, at least one.
    pub fn steps(&self) -> u32 {
        self.animation_steps.max(1)
    }

    /// Delay between two frames.
    pub fn frame_interval(&self) -> Duration {
        (self.animation_duration() / self.steps()).max(Duration::from_millis(8))
    }
}

impl Default for ThemeConfig {
    fn default() -> Self {
        let data = app_dir(dirs::data_dir());
        Self {
            themes_dir: data.join("themes"),
            template_path: data.join("qss").join("base.qss"),
            default_theme: "Dracula".to_string(),
            animate: true,
            animation_ms: 400,
            animation_steps: 12,
            easing: EasingCurve::EaseInOut,
            dump_stylesheet: false,
        }
    }
}

/// Hot-reload watcher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Watch themes and template for changes
    pub enabled: bool,

    /// Window for coalescing bursts of file events (ms)
    pub debounce_ms: u64,

    /// First retry delay after a watcher failure (ms)
    pub retry_base_ms: u64,

    /// Upper bound for the retry delay (ms)
    pub retry_max_ms: u64,

    /// Consecutive failures before the watcher disables itself
    pub max_failures: u32,
}

impl WatcherConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_ms: 150,
            retry_base_ms: 250,
            retry_max_ms: 4000,
            max_failures: 5,
        }
    }
}

/// Storage locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Persisted settings (selected theme, last route)
    pub settings_file: PathBuf,

    /// Scratch directory for stylesheet dumps
    pub cache_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            settings_file: app_dir(dirs::config_dir()).join("settings.json"),
            cache_dir: app_dir(dirs::cache_dir()),
        }
    }
}

fn app_dir(base: Option<PathBuf>) -> PathBuf {
    base.unwrap_or_else(|| PathBuf::from(".")).join("atrium")
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config directory not found")]
    NoConfigDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.router.max_history, 50);
        assert_eq!(config.router.page_policy, PagePolicy::CacheByPath);
        assert_eq!(config.watcher.debounce_ms, 150);
        assert_eq!(config.theme.default_theme, "Dracula");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [router]
            page_policy = "rebuild"

            [theme]
            easing = "linear"
            animation_ms = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.router.page_policy, PagePolicy::Rebuild);
        assert_eq!(config.router.max_history, 50);
        assert_eq!(config.theme.easing, EasingCurve::Linear);
        assert_eq!(
            config.theme.animation_duration(),
            Duration::from_millis(ThemeConfig::MIN_ANIMATION_MS)
        );
    }

    #[test]
    fn test_frame_interval() {
        let theme = ThemeConfig {
            animation_ms: 400,
            animation_steps: 0,
            ..ThemeConfig::default()
        };
        assert_eq!(theme.steps(), 1);
        assert_eq!(theme.frame_interval(), Duration::from_millis(400));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config::default();
        config.router.first_route = "settings".into();

        config.save_to(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();

        assert_eq!(loaded.router.first_route, "settings");
    }
}
