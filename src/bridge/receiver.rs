use std::sync::Arc;
use tracing::{trace, warn};

use super::sink::{EventSink, SinkSlot};
use crate::notify::{Broadcast, BroadcastReceiver, NotificationEvent};

/// Forwards observer broadcasts to a single sink
///
/// A receiver is bound to one sink for its whole life. Rebinding means
/// building a new receiver and dropping the old registration.
pub struct RelayReceiver {
    slot: SinkSlot,
}

impl RelayReceiver {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            slot: SinkSlot::new(sink),
        }
    }

    /// Stop delivering. Safe to race with an in-flight `on_receive`.
    pub fn detach(&self) -> Option<Arc<dyn EventSink>> {
        self.slot.detach()
    }

    pub fn is_attached(&self) -> bool {
        self.slot.is_attached()
    }
}

impl BroadcastReceiver for RelayReceiver {
    fn on_receive(&self, broadcast: &Broadcast) {
        if !self.slot.is_attached() {
            trace!("Relay detached; dropping {}", broadcast.action);
            return;
        }

        let event = match NotificationEvent::from_extras(&broadcast.extras) {
            Ok(event) => event,
            Err(e) => {
                warn!("Dropping notification broadcast: {}", e);
                return;
            }
        };

        if !self.slot.deliver(|sink| sink.success(event)) {
            trace!("Relay detached during delivery; dropping {}", broadcast.action);
        }
    }
}
