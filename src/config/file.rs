//! Settings persistence
//!
//! Settings live in one JSON document, `~/.config/voicechat/settings.json`
//! by default. Loading never fails: a missing or unreadable document yields
//! defaults. Every change is written back in full.

use std::path::{Path, PathBuf};

use super::Settings;
use crate::{Error, Result};

/// File name of the persisted settings document
pub const SETTINGS_FILE: &str = "settings.json";

/// Return the settings path: `~/.config/voicechat/settings.json`
#[must_use]
pub fn settings_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("voicechat").join(SETTINGS_FILE))
}

/// Loaded settings bound to the file they persist to
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    settings: Settings,
}

impl SettingsStore {
    /// Load settings from `path`, falling back to defaults
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut settings = load_settings(&path);
        settings.migrate_server_url();
        Self { path, settings }
    }

    /// Load settings from the standard location
    ///
    /// # Errors
    ///
    /// Returns error if no home/config directory can be determined
    pub fn open_default() -> Result<Self> {
        let path = settings_file_path()
            .ok_or_else(|| Error::Settings("no config directory available".to_string()))?;
        Ok(Self::open(path))
    }

    /// Current settings
    #[must_use]
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Path the settings are saved to
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Mutate the settings and save them
    ///
    /// # Errors
    ///
    /// Returns error if the document cannot be written
    pub fn update<F>(&mut self, change: F) -> Result<()>
    where
        F: FnOnce(&mut Settings),
    {
        change(&mut self.settings);
        self.save()
    }

    /// Restore defaults and save them
    ///
    /// # Errors
    ///
    /// Returns error if the document cannot be written
    pub fn reset(&mut self) -> Result<()> {
        self.update(|s| *s = Settings::default())
    }

    /// Write the full settings document
    ///
    /// # Errors
    ///
    /// Returns error if the directory or file cannot be written
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(&self.settings)?;
        std::fs::write(&self.path, content)?;

        tracing::debug!(path = %self.path.display(), "saved settings");
        Ok(())
    }
}

/// Read the settings document, returning defaults on absence or corruption
fn load_settings(path: &Path) -> Settings {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no settings file, using defaults");
        return Settings::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str(&content) {
            Ok(settings) => {
                tracing::info!(path = %path.display(), "loaded settings");
                settings
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse settings, using defaults"
                );
                Settings::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read settings"
            );
            Settings::default()
        }
    }
}
