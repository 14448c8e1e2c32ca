//! Theme storage.
//!
//! Theme files are JSON, either `{"vars": {...}}` or a bare flat object.
//! When a `vars` object is present it wins and other keys are ignored.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use atrium_core::write_atomic;

use crate::tokens::TokenMap;
use crate::{ThemeError, ThemeLoadError, ThemeResult};

/// A named set of theme variables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theme {
    #[serde(skip)]
    pub name: String,
    pub vars: TokenMap,
}

impl Theme {
    pub fn new(name: impl Into<String>, vars: TokenMap) -> Self {
        Self {
            name: name.into(),
            vars,
        }
    }

    /// Parses a theme file body.
    pub fn from_json(name: &str, text: &str) -> Result<Self, ThemeLoadError> {
        let malformed = |reason: String| ThemeLoadError::Malformed {
            name: name.to_string(),
            reason,
        };

        let value: Value = serde_json::from_str(text).map_err(|e| malformed(e.to_string()))?;
        let Value::Object(object) = value else {
            return Err(malformed("expected a JSON object".into()));
        };
        let object = match object.get("vars").cloned() {
            Some(Value::Object(vars)) => vars,
            _ => object,
        };

        let mut vars = TokenMap::new();
        for (key, value) in object {
            let text = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                other => {
                    return Err(malformed(format!(
                        "token {key:?} must be a string, number or boolean, got {other}"
                    )));
                }
            };
            vars.insert(key, text);
        }

        Ok(Self::new(name, vars))
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Loads and stores themes and the stylesheet template.
pub trait ThemeRepository {
    /// Theme names, sorted.
    fn list_themes(&self) -> Vec<String>;

    fn load_theme(&self, name: &str) -> Result<Theme, ThemeLoadError>;

    fn save_theme(&self, name: &str, theme: &Theme) -> ThemeResult<()>;

    fn delete_theme(&self, name: &str) -> ThemeResult<()>;

    fn load_template(&self) -> ThemeResult<String>;

    /// Directory the themes live in, if they live on disk.
    fn theme_dir(&self) -> Option<&Path> {
        None
    }

    /// File backing `name`, if themes live on disk.
    fn theme_path(&self, _name: &str) -> Option<PathBuf> {
        None
    }

    /// File backing the template, if it lives on disk.
    fn template_path(&self) -> Option<&Path> {
        None
    }
}

/// Themes stored as `<dir>/<name>.json`.
#[derive(Debug, Clone)]
pub struct JsonThemeRepository {
    dir: PathBuf,
    template: PathBuf,
}

impl JsonThemeRepository {
    pub const EXTENSION: &'static str = "json";

    pub fn new(dir: impl Into<PathBuf>, template: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            template: template.into(),
        }
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, ThemeLoadError> {
        let valid = !name.trim().is_empty()
            && !name.contains(['/', '\\'])
            && name != "."
            && name != "..";
        if !valid {
            return Err(ThemeLoadError::InvalidName(name.to_string()));
        }
        Ok(self.dir.join(format!("{name}.{}", Self::EXTENSION)))
    }
}

impl ThemeRepository for JsonThemeRepository {
    fn list_themes(&self) -> Vec<String> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!("Cannot list themes in {}: {}", self.dir.display(), e);
                return Vec::new();
            }
        };

        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter(|path| path.extension().is_some_and(|ext| ext == Self::EXTENSION))
            .filter_map(|path| path.file_stem().and_then(|s| s.to_str()).map(String::from))
            .collect();
        names.sort();
        names
    }

    fn load_theme(&self, name: &str) -> Result<Theme, ThemeLoadError> {
        let path = self.path_for(name)?;
        let text = fs::read_to_string(&path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => ThemeLoadError::Missing(name.to_string()),
            _ => ThemeLoadError::Io {
                name: name.to_string(),
                source,
            },
        })?;
        Theme::from_json(name, &text)
    }

    fn save_theme(&self, name: &str, theme: &Theme) -> ThemeResult<()> {
        let path = self.path_for(name)?;
        let storage = |source| ThemeError::Storage {
            name: name.to_string(),
            source,
        };
        let json = theme
            .to_json()
            .map_err(|e| storage(io::Error::new(io::ErrorKind::InvalidData, e)))?;
        fs::create_dir_all(&self.dir).map_err(storage)?;
        write_atomic(&path, json.as_bytes()).map_err(storage)?;
        tracing::info!("Saved theme {} to {}", name, path.display());
        Ok(())
    }

    fn delete_theme(&self, name: &str) -> ThemeResult<()> {
        let path = self.path_for(name)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!("Deleted theme {}", name);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(ThemeLoadError::Missing(name.to_string()).into())
            }
            Err(source) => Err(ThemeError::Storage {
                name: name.to_string(),
                source,
            }),
        }
    }

    fn load_template(&self) -> ThemeResult<String> {
        fs::read_to_string(&self.template).map_err(|source| ThemeError::Template {
            path: self.template.clone(),
            source,
        })
    }

    fn theme_dir(&self) -> Option<&Path> {
        Some(&self.dir)
    }

    fn theme_path(&self, name: &str) -> Option<PathBuf> {
        self.path_for(name).ok()
    }

    fn template_path(&self) -> Option<&Path> {
        Some(&self.template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn repo(dir: &TempDir) -> JsonThemeRepository {
        JsonThemeRepository::new(dir.path().join("themes"), dir.path().join("base.qss"))
    }

    fn write(dir: &TempDir, name: &str, body: &str) {
        let themes = dir.path().join("themes");
        fs::create_dir_all(&themes).unwrap();
        fs::write(themes.join(name), body).unwrap();
    }

    #[test]
    fn test_list_sorted_json_only() {
        let dir = TempDir::new().unwrap();
        write(&dir, "Light.json", "{}");
        write(&dir, "Dracula.json", "{}");
        write(&dir, "notes.txt", "");

        assert_eq!(repo(&dir).list_themes(), vec!["Dracula", "Light"]);
    }

    #[test]
    fn test_list_missing_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(repo(&dir).list_themes().is_empty());
    }

    #[test]
    fn test_vars_wrapper_and_flat_object() {
        let dir = TempDir::new().unwrap();
        write(&dir, "Wrapped.json", r##"{"vars": {"bg": "#000"}, "meta": {"x": 1}}"##);
        write(&dir, "Flat.json", r##"{"bg": "#111", "radius": 6, "bold": true}"##);

        let repo = repo(&dir);
        let wrapped = repo.load_theme("Wrapped").unwrap();
        assert_eq!(wrapped.vars.len(), 1);
        assert_eq!(wrapped.vars["bg"], "#000");

        let flat = repo.load_theme("Flat").unwrap();
        assert_eq!(flat.name, "Flat");
        assert_eq!(flat.vars["radius"], "6");
        assert_eq!(flat.vars["bold"], "true");
    }

    #[test]
    fn test_load_errors() {
        let dir = TempDir::new().unwrap();
        write(&dir, "Broken.json", "{ not json");
        write(&dir, "Nested.json", r#"{"bg": {"r": 1}}"#);
        write(&dir, "List.json", "[1, 2]");
        let repo = repo(&dir);

        assert!(matches!(repo.load_theme("Ghost"), Err(ThemeLoadError::Missing(_))));
        assert!(matches!(repo.load_theme("Broken"), Err(ThemeLoadError::Malformed { .. })));
        assert!(matches!(repo.load_theme("Nested"), Err(ThemeLoadError::Malformed { .. })));
        assert!(matches!(repo.load_theme("List"), Err(ThemeLoadError::Malformed { .. })));
        assert!(matches!(repo.load_theme("../etc"), Err(ThemeLoadError::InvalidName(_))));
    }

    #[test]
    fn test_save_then_delete() {
        let dir = TempDir::new().unwrap();
        let repo = repo(&dir);
        let mut vars = TokenMap::new();
        vars.insert("accent".into(), "#ff79c6".into());

        repo.save_theme("Pink", &Theme::new("Pink", vars.clone())).unwrap();
        let text = fs::read_to_string(repo.theme_path("Pink").unwrap()).unwrap();
        assert!(text.contains("\"vars\""));
        assert_eq!(repo.load_theme("Pink").unwrap().vars, vars);

        repo.delete_theme("Pink").unwrap();
        assert!(repo.list_themes().is_empty());
        assert!(matches!(
            repo.delete_theme("Pink"),
            Err(ThemeError::Load(ThemeLoadError::Missing(_)))
        ));
    }

    #[test]
    fn test_template_read() {
        let dir = TempDir::new().unwrap();
        let repo = repo(&dir);
        assert!(matches!(repo.load_template(), Err(ThemeError::Template { .. })));

        fs::write(dir.path().join("base.qss"), "QWidget { color: {text}; }").unwrap();
        assert_eq!(repo.load_template().unwrap(), "QWidget { color: {text}; }");
    }
}
