use std::sync::Arc;
use tracing::{debug, info};

use super::receiver::RelayReceiver;
use super::sink::EventSink;
use crate::capability::{CapabilityChecker, SettingsNavigator};
use crate::error::{BridgeError, Result};
use crate::notify::{BroadcastBus, Registration, NOTIFICATION_ACTION};
use crate::observer::ObserverService;

/// One active subscription: a sink paired with its receiver registration
///
/// Dropping the session detaches the sink and releases the registration.
pub struct StreamSession {
    receiver: Arc<RelayReceiver>,
    _registration: Registration,
}

impl StreamSession {
    fn open(bus: &Arc<dyn BroadcastBus>, action: &str, sink: Arc<dyn EventSink>) -> Result<Self> {
        let receiver = Arc::new(RelayReceiver::new(sink));
        let registration = Registration::register(bus, action, receiver.clone())?;
        Ok(Self {
            receiver,
            _registration: registration,
        })
    }

    /// Tear the session down, returning the sink it was bound to
    fn close(self) -> Option<Arc<dyn EventSink>> {
        self.receiver.detach()
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        self.receiver.detach();
    }
}

/// Start/stop contract exposed to the stream consumer
///
/// `on_start` and `on_cancel` are expected from a single caller; broadcast
/// delivery may run concurrently on another thread.
pub struct StreamController {
    capability: CapabilityChecker,
    navigator: Arc<dyn SettingsNavigator>,
    bus: Arc<dyn BroadcastBus>,
    observer: Arc<dyn ObserverService>,
    action: String,
    session: Option<StreamSession>,
}

impl StreamController {
    pub fn new(
        capability: CapabilityChecker,
        navigator: Arc<dyn SettingsNavigator>,
        bus: Arc<dyn BroadcastBus>,
        observer: Arc<dyn ObserverService>,
    ) -> Self {
        Self {
            capability,
            navigator,
            bus,
            observer,
            action: NOTIFICATION_ACTION.to_string(),
            session: None,
        }
    }

    /// Listen for a different broadcast action
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = action.into();
        self
    }

    /// Start streaming notifications into `sink`
    ///
    /// An already active session is replaced; its sink receives end-of-stream.
    /// Registration and observer failures are delivered to `sink` as errors
    /// and returned.
    pub fn on_start(&mut self, sink: Arc<dyn EventSink>) -> Result<()> {
        if !self.capability.is_granted() {
            info!(
                "Notification access not granted for {}; requesting it",
                self.capability.app_id()
            );
            self.navigator.open_listener_settings();
        }

        if let Some(previous) = self.session.take() {
            if let Some(old_sink) = previous.close() {
                if !Arc::ptr_eq(&old_sink, &sink) {
                    old_sink.end_of_stream();
                }
            }
            info!("Replaced active stream session");
        }

        let session = StreamSession::open(&self.bus, &self.action, Arc::clone(&sink))
            .map_err(|e| report(&sink, e))?;
        info!("Relay receiver registered for {}", self.action);

        self.observer.ensure_running().map_err(|e| report(&sink, e))?;

        self.session = Some(session);
        info!("Started the notification stream");
        Ok(())
    }

    /// Stop delivering to the current sink and release its registration
    pub fn on_cancel(&mut self) {
        match self.session.take() {
            Some(session) => {
                session.close();
                info!("Notification stream cancelled");
            }
            None => debug!("Cancel without an active stream"),
        }
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }
}

fn report(sink: &Arc<dyn EventSink>, err: BridgeError) -> BridgeError {
    sink.error(err.code(), &err.to_string(), None);
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::sink::{ChannelSink, StreamEvent};
    use crate::capability::SecureSettings;
    use crate::notify::{Broadcast, BroadcastReceiver, LocalBroadcastBus, RegistrationId};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::mpsc::UnboundedReceiver;

    const APP_ID: &str = "com.example.lyrics";

    struct Settings(AtomicBool);

    impl SecureSettings for Settings {
        fn get_string(&self, _key: &str) -> Option<String> {
            self.0
                .load(Ordering::SeqCst)
                .then(|| format!("{}/{}.Observer", APP_ID, APP_ID))
        }
    }

    #[derive(Default)]
    struct Navigator(AtomicUsize);

    impl SettingsNavigator for Navigator {
        fn open_listener_settings(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct Observer {
        running: AtomicBool,
        launches: AtomicUsize,
        fail: bool,
    }

    impl ObserverService for Observer {
        fn ensure_running(&self) -> Result<()> {
            if self.fail {
                return Err(BridgeError::ObserverStart {
                    program: "observer".to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
                });
            }
            if !self.running.swap(true, Ordering::SeqCst) {
                self.launches.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        }
    }

    struct RejectingBus;

    impl BroadcastBus for RejectingBus {
        fn register(
            &self,
            action: &str,
            _receiver: Arc<dyn BroadcastReceiver>,
        ) -> Result<RegistrationId> {
            Err(BridgeError::RegistrationRejected {
                action: action.to_string(),
                reason: "denied".to_string(),
            })
        }

        fn unregister(&self, _id: RegistrationId) -> bool {
            false
        }
    }

    struct Harness {
        bus: Arc<LocalBroadcastBus>,
        navigator: Arc<Navigator>,
        observer: Arc<Observer>,
        controller: StreamController,
    }

    fn harness(granted: bool) -> Harness {
        harness_with(granted, Observer::default())
    }

    fn harness_with(granted: bool, observer: Observer) -> Harness {
        let bus = Arc::new(LocalBroadcastBus::new());
        let navigator = Arc::new(Navigator::default());
        let observer = Arc::new(observer);
        let settings = Arc::new(Settings(AtomicBool::new(granted)));
        let capability = CapabilityChecker::new(settings, APP_ID);
        let controller = StreamController::new(
            capability,
            navigator.clone(),
            bus.clone(),
            observer.clone(),
        );
        Harness {
            bus,
            navigator,
            observer,
            controller,
        }
    }

    fn song(title: &str) -> Broadcast {
        Broadcast::new(NOTIFICATION_ACTION)
            .with_extra("package", "com.music.app")
            .with_extra("title", title)
    }

    fn sink() -> (Arc<dyn EventSink>, UnboundedReceiver<StreamEvent>) {
        let (sink, rx) = ChannelSink::new();
        (Arc::new(sink), rx)
    }

    #[test]
    fn test_delivers_notification_once() {
        let mut h = harness(true);
        let (sink_a, mut rx) = sink();
        h.controller.on_start(sink_a).unwrap();

        h.bus.send(&song("Song X"));

        match rx.try_recv().unwrap() {
            StreamEvent::Data { event } => {
                assert_eq!(event.source_package(), "com.music.app");
                assert_eq!(event.title(), Some("Song X"));
            }
            other => panic!("unexpected delivery: {:?}", other),
        }
        assert!(rx.try_recv().is_err());
        assert_eq!(h.navigator.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_start_twice_keeps_single_receiver_and_observer() {
        let mut h = harness(true);
        let (sink_a, mut rx) = sink();
        h.controller.on_start(sink_a.clone()).unwrap();
        h.controller.on_start(sink_a).unwrap();

        assert_eq!(h.bus.receiver_count(NOTIFICATION_ACTION), 1);
        assert_eq!(h.observer.launches.load(Ordering::SeqCst), 1);

        h.bus.send(&song("Song X"));
        assert!(matches!(rx.try_recv(), Ok(StreamEvent::Data { .. })));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_restart_with_new_sink_replaces_old() {
        let mut h = harness(true);
        let (sink_a, mut rx_a) = sink();
        let (sink_b, mut rx_b) = sink();
        h.controller.on_start(sink_a).unwrap();
        h.controller.on_start(sink_b).unwrap();

        assert_eq!(rx_a.try_recv().unwrap(), StreamEvent::EndOfStream);

        h.bus.send(&song("Song X"));
        assert!(rx_a.try_recv().is_err());
        assert!(matches!(rx_b.try_recv(), Ok(StreamEvent::Data { .. })));
        assert_eq!(h.bus.receiver_count(NOTIFICATION_ACTION), 1);
    }

    #[test]
    fn test_cancel_stops_delivery_and_releases_receiver() {
        let mut h = harness(true);
        let (sink_a, mut rx) = sink();
        h.controller.on_start(sink_a).unwrap();
        h.controller.on_cancel();

        assert!(!h.controller.is_active());
        assert_eq!(h.bus.receiver_count(NOTIFICATION_ACTION), 0);

        h.bus.send(&song("Song Y"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_cancel_without_start() {
        let mut h = harness(true);
        h.controller.on_cancel();
        h.controller.on_cancel();
        assert!(!h.controller.is_active());
    }

    #[test]
    fn test_repeated_cycles_do_not_leak() {
        let mut h = harness(true);
        for _ in 0..10 {
            let (s, _rx) = sink();
            h.controller.on_start(s).unwrap();
            h.controller.on_cancel();
        }
        assert_eq!(h.bus.receiver_count(NOTIFICATION_ACTION), 0);
    }

    #[test]
    fn test_missing_capability_still_registers() {
        let mut h = harness(false);
        let (sink_a, mut rx) = sink();
        h.controller.on_start(sink_a).unwrap();

        assert_eq!(h.navigator.0.load(Ordering::SeqCst), 1);
        assert_eq!(h.bus.receiver_count(NOTIFICATION_ACTION), 1);
        assert!(h.controller.is_active());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_malformed_broadcast_keeps_session() {
        let mut h = harness(true);
        let (sink_a, mut rx) = sink();
        h.controller.on_start(sink_a).unwrap();

        h.bus.send(&Broadcast::new(NOTIFICATION_ACTION).with_extra("title", "orphan"));
        assert!(rx.try_recv().is_err());
        assert!(h.controller.is_active());

        h.bus.send(&song("Song X"));
        assert!(matches!(rx.try_recv(), Ok(StreamEvent::Data { .. })));
    }

    #[test]
    fn test_registration_failure_is_reported() {
        let capability = CapabilityChecker::new(Arc::new(Settings(AtomicBool::new(true))), APP_ID);
        let mut controller = StreamController::new(
            capability,
            Arc::new(Navigator::default()),
            Arc::new(RejectingBus),
            Arc::new(Observer::default()),
        );
        let (sink_a, mut rx) = sink();

        let err = controller.on_start(sink_a).unwrap_err();
        assert_eq!(err.code(), "REGISTRATION_FAILED");
        assert!(!controller.is_active());
        match rx.try_recv().unwrap() {
            StreamEvent::Error { code, .. } => assert_eq!(code, "REGISTRATION_FAILED"),
            other => panic!("unexpected delivery: {:?}", other),
        }
    }

    #[test]
    fn test_observer_failure_releases_registration() {
        let mut h = harness_with(
            true,
            Observer {
                fail: true,
                ..Observer::default()
            },
        );
        let (sink_a, mut rx) = sink();

        let err = h.controller.on_start(sink_a).unwrap_err();
        assert_eq!(err.code(), "OBSERVER_START_FAILED");
        assert!(!h.controller.is_active());
        assert_eq!(h.bus.receiver_count(NOTIFICATION_ACTION), 0);
        assert!(matches!(rx.try_recv(), Ok(StreamEvent::Error { .. })));
    }

    #[test]
    fn test_custom_action() {
        let mut h = harness(true);
        h.controller = h.controller.with_action("custom.ACTION");
        let (sink_a, mut rx) = sink();
        h.controller.on_start(sink_a).unwrap();

        h.bus.send(&song("Song X"));
        assert!(rx.try_recv().is_err());
        assert_eq!(h.bus.receiver_count("custom.ACTION"), 1);
    }

    #[test]
    fn test_drop_releases_session() {
        let h = harness(true);
        let bus = h.bus.clone();
        let mut controller = h.controller;
        let (sink_a, _rx) = sink();
        controller.on_start(sink_a).unwrap();
        drop(controller);
        assert_eq!(bus.receiver_count(NOTIFICATION_ACTION), 0);
    }
}
