pub mod config;
pub mod listen;

pub use config::{Config, ObserverConfig};

use std::sync::Arc;

use crate::bridge::StreamController;
use crate::capability::{CapabilityChecker, CommandNavigator, FileSecureSettings};
use crate::notify::LocalBroadcastBus;
use crate::observer::{ExternalObserver, ObserverService, ProcessObserver};

/// Wire a stream controller from configuration
pub fn build_controller(config: &Config, bus: Arc<LocalBroadcastBus>) -> StreamController {
    let settings = Arc::new(FileSecureSettings::new(&config.settings_path));
    let capability = CapabilityChecker::new(settings, config.app_id.clone());
    let navigator = Arc::new(CommandNavigator::new(config.settings_command.clone()));

    let observer: Arc<dyn ObserverService> =
        match ProcessObserver::from_command(&config.observer.command) {
            Some(observer) => Arc::new(observer),
            None => Arc::new(ExternalObserver),
        };

    StreamController::new(capability, navigator, bus, observer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{ChannelSink, StreamEvent};
    use crate::notify::{Broadcast, NOTIFICATION_ACTION};
    use tempfile::tempdir;

    #[test]
    fn test_build_controller_from_config() {
        let dir = tempdir().unwrap();
        let config = Config {
            app_id: "com.example.lyrics".to_string(),
            settings_path: dir.path().join("secure_settings.toml"),
            ..Config::default()
        };
        std::fs::write(
            &config.settings_path,
            "enabled_notification_listeners = \"com.example.lyrics/Observer\"\n",
        )
        .unwrap();

        let bus = Arc::new(LocalBroadcastBus::new());
        let mut controller = build_controller(&config, bus.clone());
        let (sink, mut rx) = ChannelSink::new();
        controller.on_start(Arc::new(sink)).unwrap();

        bus.send(&Broadcast::new(NOTIFICATION_ACTION).with_extra("package", "com.music.app"));
        assert!(matches!(rx.try_recv(), Ok(StreamEvent::Data { .. })));
    }
}
