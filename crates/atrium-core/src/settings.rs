//! Persisted shell settings.
//!
//! The settings file is tiny (`{"selectedTheme": ..., "lastRoute": ...}`)
//! but it is rewritten on every theme switch and navigation, so every
//! write goes through [`write_atomic`]: a crash mid-write leaves the
//! previous file intact.

use std::cell::RefCell;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde::{Deserialize, Serialize};

/// Settings that survive a restart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_theme: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_route: Option<String>,
}

/// Settings store shared on the UI thread.
pub type SharedSettings = Rc<RefCell<SettingsStore>>;

/// In-memory settings backed by a JSON file.
///
/// The in-memory copy is authoritative: a failed write is reported to the
/// caller but never rolls the value back.
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    current: PersistedSettings,
}

impl SettingsStore {
    /// Opens the store. A missing file yields defaults; an unreadable or
    /// corrupt one is logged and also yields defaults.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let current = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|err| {
                tracing::warn!("Ignoring corrupt settings file {}: {}", path.display(), err);
                PersistedSettings::default()
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => PersistedSettings::default(),
            Err(err) => {
                tracing::warn!("Cannot read settings file {}: {}", path.display(), err);
                PersistedSettings::default()
            }
        };
        Self { path, current }
    }

    /// Opens the store wrapped for sharing.
    pub fn shared(path: impl Into<PathBuf>) -> SharedSettings {
        Rc::new(RefCell::new(Self::open(path)))
    }

    /// Returns the current settings.
    pub fn get(&self) -> &PersistedSettings {
        &self.current
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records the selected theme and writes the file.
    pub fn set_selected_theme(&mut self, name: impl Into<String>) -> Result<(), SettingsError> {
        let name = name.into();
        if self.current.selected_theme.as_deref() == Some(name.as_str()) {
            return Ok(());
        }
        self.current.selected_theme = Some(name);
        self.save()
    }

    /// Records the last visited route and writes the file.
    pub fn set_last_route(&mut self, path: impl Into<String>) -> Result<(), SettingsError> {
        let path = path.into();
        if self.current.last_route.as_deref() == Some(path.as_str()) {
            return Ok(());
        }
        self.current.last_route = Some(path);
        self.save()
    }

    /// Writes the current settings to disk.
    pub fn save(&self) -> Result<(), SettingsError> {
        let bytes = serde_json::to_vec_pretty(&self.current)?;
        write_atomic(&self.path, &bytes).map_err(|source| SettingsError::Write {
            path: self.path.clone(),
            source,
        })?;
        tracing::debug!("Saved settings to {}", self.path.display());
        Ok(())
    }
}

/// Writes `bytes` to `path` through a sibling temp file and a rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut temp_name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    let result = (|| {
        let mut file = File::create(&temp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&temp_path, path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

/// Settings persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Failed to write settings to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialize error: {0}")]
    Serialize(#[from] serde_json::Error),
}
