//! Persisted viewer preferences

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ViewerError;

/// Configuration values remembered between sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ViewerPreferences {
    /// Config name to last applied value
    #[serde(default)]
    pub configs: BTreeMap<String, Value>,
    /// Tab open when the viewer was closed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_tab: Option<String>,
}

impl ViewerPreferences {
    /// Platform config file, if the platform has a config dir
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "bim-viewer", "bim-viewer")
            .map(|dirs| dirs.config_dir().join("settings.json"))
    }

    /// Load preferences from the platform config dir, or defaults if not found
    pub fn load() -> Self {
        Self::default_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    /// Load from a file; missing or corrupt files give defaults
    pub fn load_from(path: &Path) -> Self {
        if let Ok(json) = std::fs::read_to_string(path) {
            match serde_json::from_str(&json) {
                Ok(prefs) => return prefs,
                Err(e) => tracing::warn!("Ignoring unreadable preferences {}: {e}", path.display()),
            }
        }
        Self::default()
    }

    /// Save to the platform config dir
    pub fn save(&self) -> Result<(), ViewerError> {
        let path = Self::default_path()
            .ok_or_else(|| ViewerError::NotFound("platform config directory".into()))?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ViewerError> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .map_err(|e| ViewerError::InvalidArgument(format!("{}: {e}", dir.display())))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .map_err(|e| ViewerError::InvalidArgument(format!("{}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("bim-viewer-test-{}", uuid::Uuid::new_v4()))
            .join("settings.json")
    }

    #[test]
    fn test_save_and_load() {
        let path = temp_path();
        let mut prefs = ViewerPreferences::default();
        prefs.configs.insert("saoEnabled".into(), Value::Bool(false));
        prefs.last_tab = Some("storeys".into());
        prefs.save_to(&path).unwrap();

        let loaded = ViewerPreferences::load_from(&path);
        assert_eq!(loaded, prefs);
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let loaded = ViewerPreferences::load_from(&temp_path());
        assert_eq!(loaded, ViewerPreferences::default());
    }

    #[test]
    fn test_corrupt_file_gives_defaults() {
        let path = temp_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(ViewerPreferences::load_from(&path), ViewerPreferences::default());
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
