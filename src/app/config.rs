use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Observer launch settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserverConfig {
    /// Command line starting the observer (`[program, args...]`).
    /// Empty when the observer is started by something else.
    pub command: Vec<String>,
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Identifier looked up in the notification listener list
    pub app_id: String,
    /// Socket the observer sends broadcasts to
    pub socket_path: PathBuf,
    /// File holding the secure settings (`enabled_notification_listeners`)
    pub settings_path: PathBuf,
    /// Log level
    pub log_level: String,
    /// Shell command that opens the notification access settings
    pub settings_command: Option<String>,
    /// Observer settings
    pub observer: ObserverConfig,
}

fn default_config_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().join(".config/notification-relay"))
        .unwrap_or_else(|| std::env::temp_dir().join("notification-relay"))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_id: "notification-relay".to_string(),
            socket_path: crate::notify::socket_path(),
            settings_path: default_config_dir().join("secure_settings.toml"),
            log_level: "info".to_string(),
            settings_command: None,
            observer: ObserverConfig::default(),
        }
    }
}

impl Config {
    /// Load from the default location, writing defaults on first run
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Self::default();
            if let Err(e) = config.save_to(&config_path) {
                tracing::warn!("Failed to save default config: {}", e);
            }
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config {}: {}", path.display(), e))?;
        Ok(config)
    }

    /// ~/.config/notification-relay/config.toml
    pub fn config_path() -> Result<PathBuf> {
        let base_dirs = directories::BaseDirs::new()
            .ok_or_else(|| anyhow::anyhow!("Failed to determine home directory"))?;
        Ok(base_dirs.home_dir().join(".config/notification-relay/config.toml"))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }
}
