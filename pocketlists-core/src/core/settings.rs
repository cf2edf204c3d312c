//! Application settings persistence.
//!
//! Settings live in a JSON file at an OS-appropriate location. A missing or corrupt
//! file yields the defaults.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Persisted application settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    /// SQLite file holding every collection.
    pub database_path: String,
    /// How long a share-target import waits for the payload, in milliseconds.
    pub share_import_wait_ms: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            database_path: default_database_path().to_string_lossy().to_string(),
            share_import_wait_ms: 500,
        }
    }
}

impl AppSettings {
    pub fn share_import_wait(&self) -> Duration {
        Duration::from_millis(self.share_import_wait_ms)
    }
}

fn config_base() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("PocketLists")
    }
    #[cfg(not(target_os = "windows"))]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("pocketlists")
    }
}

/// Returns the path to the settings JSON file.
///
/// - macOS / Linux: `~/.config/pocketlists/settings.json`
/// - Windows: `%APPDATA%/PocketLists/settings.json`
pub fn settings_file_path() -> PathBuf {
    config_base().join("settings.json")
}

/// Returns the default database location inside the platform data directory.
pub fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("pocketlists"))
        .unwrap_or_else(config_base)
        .join("pocketlists.db")
}

/// Loads settings from the default location.
pub fn load_settings() -> AppSettings {
    load_settings_from(&settings_file_path())
}

/// Loads settings from `path`; returns defaults if the file is missing or corrupt.
pub fn load_settings_from(path: &Path) -> AppSettings {
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            log::warn!("ignoring corrupt settings file {}: {e}", path.display());
            AppSettings::default()
        }),
        Err(_) => AppSettings::default(),
    }
}

/// Saves settings to the default location.
pub fn save_settings(settings: &AppSettings) -> Result<()> {
    save_settings_to(settings, &settings_file_path())
}

/// Saves settings to `path`, creating parent directories as needed.
pub fn save_settings_to(settings: &AppSettings, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let settings = load_settings_from(&dir.path().join("absent.json"));
        assert_eq!(settings, AppSettings::default());
        assert_eq!(settings.share_import_wait(), Duration::from_millis(500));
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = AppSettings {
            database_path: "/tmp/lists.db".to_string(),
            share_import_wait_ms: 250,
        };

        save_settings_to(&settings, &path).unwrap();

        assert_eq!(load_settings_from(&path), settings);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"shareImportWaitMs": 100}"#).unwrap();

        let settings = load_settings_from(&path);

        assert_eq!(settings.share_import_wait_ms, 100);
        assert_eq!(settings.database_path, AppSettings::default().database_path);
    }

    #[test]
    fn test_corrupt_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "not json").unwrap();

        assert_eq!(load_settings_from(&path), AppSettings::default());
    }
}
