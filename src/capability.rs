//! Notification access checks
//!
//! The platform keeps a list of applications allowed to observe every posted
//! notification. This module reads that list and, when access is missing,
//! sends the user to the place where it can be granted.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

/// Settings key holding the applications allowed to observe notifications
pub const ENABLED_LISTENERS_KEY: &str = "enabled_notification_listeners";

/// Read access to the system-maintained settings store
pub trait SecureSettings: Send + Sync {
    /// Look up a string setting. `None` when the key is absent.
    fn get_string(&self, key: &str) -> Option<String>;
}

/// Entry point into the platform's notification-access settings surface
pub trait SettingsNavigator: Send + Sync {
    /// Ask the platform to show the settings surface. Fire-and-forget.
    fn open_listener_settings(&self);
}

/// Decides whether this application may observe notifications
pub struct CapabilityChecker {
    settings: Arc<dyn SecureSettings>,
    app_id: String,
}

impl CapabilityChecker {
    pub fn new(settings: Arc<dyn SecureSettings>, app_id: impl Into<String>) -> Self {
        Self {
            settings,
            app_id: app_id.into(),
        }
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Query the settings store. The answer is recomputed on every call.
    pub fn is_granted(&self) -> bool {
        let Some(value) = self.settings.get_string(ENABLED_LISTENERS_KEY) else {
            debug!("{} is not set; treating access as not granted", ENABLED_LISTENERS_KEY);
            return false;
        };

        listener_set_contains(&value, &self.app_id)
    }
}

/// Check membership in a colon-separated listener list
///
/// Entries are either a bare application id or `app_id/ListenerComponent`.
/// Only the application id part is compared, and it must match exactly.
fn listener_set_contains(value: &str, app_id: &str) -> bool {
    value
        .split(':')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .any(|entry| entry.split('/').next() == Some(app_id))
}

/// Settings store backed by a TOML file of string values
///
/// The file is read on every lookup so external edits are seen immediately.
pub struct FileSecureSettings {
    path: PathBuf,
}

impl FileSecureSettings {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SecureSettings for FileSecureSettings {
    fn get_string(&self, key: &str) -> Option<String> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Settings file not found: {}", self.path.display());
                return None;
            }
            Err(e) => {
                warn!("Failed to read settings file {}: {}", self.path.display(), e);
                return None;
            }
        };

        let table: toml::Table = match toml::from_str(&content) {
            Ok(table) => table,
            Err(e) => {
                warn!("Failed to parse settings file {}: {}", self.path.display(), e);
                return None;
            }
        };

        table.get(key).and_then(|v| v.as_str()).map(str::to_string)
    }
}

/// Opens the settings surface by running a user-supplied shell command
pub struct CommandNavigator {
    command: Option<String>,
}

impl CommandNavigator {
    pub fn new(command: Option<String>) -> Self {
        Self { command }
    }
}

impl SettingsNavigator for CommandNavigator {
    fn open_listener_settings(&self) {
        let Some(command) = &self.command else {
            warn!(
                "Notification access is not granted; add this application to `{}`",
                ENABLED_LISTENERS_KEY
            );
            return;
        };

        info!("Opening notification access settings: {}", command);
        let spawned = std::process::Command::new("sh")
            .args(["-c", command])
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn();

        match spawned {
            // Reaped off-thread so the caller never waits on the settings UI.
            Ok(mut child) => {
                std::thread::spawn(move || match child.wait() {
                    Ok(status) => debug!("Settings command finished with {}", status),
                    Err(e) => warn!("Failed to wait for settings command: {}", e),
                });
            }
            Err(e) => warn!("Failed to open notification access settings: {}", e),
        }
    }
}
