//! Engine settings persisted as a JSON file under the user config directory.
//!
//! Missing fields fall back to their defaults, so a settings file written by
//! an older version keeps loading.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::types::errors::SettingsError;
use crate::types::settings::EngineSettings;

pub const APP_DIR: &str = "tabhost";

/// Trait defining the settings engine interface.
pub trait SettingsEngineTrait {
    fn load(&mut self) -> Result<EngineSettings, SettingsError>;
    fn save(&self) -> Result<(), SettingsError>;
    fn get_settings(&self) -> &EngineSettings;
    fn set_value(&mut self, key: &str, value: serde_json::Value) -> Result<(), SettingsError>;
    fn reset(&mut self) -> Result<(), SettingsError>;
    fn get_config_path(&self) -> &Path;
}

pub struct SettingsEngine {
    config_path: PathBuf,
    settings: EngineSettings,
}

impl SettingsEngine {
    /// Uses `path_override` when given, else `<config dir>/tabhost/settings.json`.
    pub fn new(path_override: Option<PathBuf>) -> Self {
        let config_path = path_override.unwrap_or_else(|| {
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR)
                .join("settings.json")
        });

        Self {
            config_path,
            settings: EngineSettings::default(),
        }
    }
}

impl SettingsEngineTrait for SettingsEngine {
    /// Loads settings from disk. A missing file yields defaults; a malformed
    /// one is an error.
    fn load(&mut self) -> Result<EngineSettings, SettingsError> {
        if !self.config_path.exists() {
            debug!(path = %self.config_path.display(), "no settings file, using defaults");
            self.settings = EngineSettings::default();
            return Ok(self.settings.clone());
        }

        let content = fs::read_to_string(&self.config_path)
            .map_err(|e| SettingsError::IoError(format!("Failed to read config file: {}", e)))?;

        self.settings = serde_json::from_str(&content).map_err(|e| {
            SettingsError::SerializationError(format!("Failed to parse config file: {}", e))
        })?;
        info!(path = %self.config_path.display(), "settings loaded");
        Ok(self.settings.clone())
    }

    fn save(&self) -> Result<(), SettingsError> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SettingsError::IoError(format!("Failed to create config directory: {}", e))
            })?;
        }

        let json = serde_json::to_string_pretty(&self.settings).map_err(|e| {
            SettingsError::SerializationError(format!("Failed to serialize settings: {}", e))
        })?;

        fs::write(&self.config_path, json)
            .map_err(|e| SettingsError::IoError(format!("Failed to write config file: {}", e)))
    }

    fn get_settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Updates one setting by dot-separated key (`scroll.poll_interval_ms`)
    /// and persists the result. The whole document is re-validated, so a
    /// value of the wrong type is rejected without touching memory or disk.
    fn set_value(&mut self, key: &str, value: serde_json::Value) -> Result<(), SettingsError> {
        if key.is_empty() {
            return Err(SettingsError::InvalidKey("Key cannot be empty".to_string()));
        }

        let mut document = serde_json::to_value(&self.settings).map_err(|e| {
            SettingsError::SerializationError(format!("Failed to serialize settings: {}", e))
        })?;

        let (parents, leaf) = match key.rsplit_once('.') {
            Some((parents, leaf)) => (parents.split('.').collect::<Vec<_>>(), leaf),
            None => (Vec::new(), key),
        };

        let mut current = &mut document;
        for part in parents {
            current = current
                .get_mut(part)
                .ok_or_else(|| SettingsError::InvalidKey(format!("Key '{}' not found in settings", key)))?;
        }
        match current {
            serde_json::Value::Object(map) if map.contains_key(leaf) => {
                map.insert(leaf.to_string(), value);
            }
            _ => {
                return Err(SettingsError::InvalidKey(format!(
                    "Key '{}' not found in settings",
                    key
                )))
            }
        }

        self.settings = serde_json::from_value(document).map_err(|e| {
            SettingsError::InvalidValue(format!("Invalid value for key '{}': {}", key, e))
        })?;
        self.save()
    }

    fn reset(&mut self) -> Result<(), SettingsError> {
        self.settings = EngineSettings::default();
        self.save()
    }

    fn get_config_path(&self) -> &Path {
        &self.config_path
    }
}
