//! In-process broadcast registry
//!
//! Receivers register for an action and get every broadcast sent under it.
//! Dispatch is synchronous on the sender's thread, so receivers must not block.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, trace};
use uuid::Uuid;

use super::protocol::Broadcast;
use crate::error::Result;

/// Listener for broadcasts of one action
pub trait BroadcastReceiver: Send + Sync {
    fn on_receive(&self, broadcast: &Broadcast);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationId(Uuid);

impl RegistrationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RegistrationId {
    fn default() -> Self {
        Self::new()
    }
}

/// Dynamic receiver registration, as offered by the platform
pub trait BroadcastBus: Send + Sync {
    fn register(
        &self,
        action: &str,
        receiver: Arc<dyn BroadcastReceiver>,
    ) -> Result<RegistrationId>;

    /// Remove a registration. Returns false if it was already gone.
    fn unregister(&self, id: RegistrationId) -> bool;
}

/// Scoped registration: the receiver is unregistered when this is dropped
pub struct Registration {
    id: RegistrationId,
    bus: Arc<dyn BroadcastBus>,
}

impl Registration {
    pub fn register(
        bus: &Arc<dyn BroadcastBus>,
        action: &str,
        receiver: Arc<dyn BroadcastReceiver>,
    ) -> Result<Self> {
        let id = bus.register(action, receiver)?;
        Ok(Self {
            id,
            bus: Arc::clone(bus),
        })
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        if self.bus.unregister(self.id) {
            debug!("Released broadcast registration {:?}", self.id);
        }
    }
}

struct Entry {
    action: String,
    receiver: Arc<dyn BroadcastReceiver>,
}

/// Broadcast bus living inside this process
#[derive(Default)]
pub struct LocalBroadcastBus {
    entries: Mutex<HashMap<RegistrationId, Entry>>,
}

impl LocalBroadcastBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver to every receiver registered for the broadcast's action
    ///
    /// Returns the number of receivers invoked.
    pub fn send(&self, broadcast: &Broadcast) -> usize {
        let receivers: Vec<Arc<dyn BroadcastReceiver>> = {
            let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            entries
                .values()
                .filter(|e| e.action == broadcast.action)
                .map(|e| Arc::clone(&e.receiver))
                .collect()
        };

        trace!(
            "Dispatching {} to {} receiver(s)",
            broadcast.action,
            receivers.len()
        );
        for receiver in &receivers {
            receiver.on_receive(broadcast);
        }
        receivers.len()
    }

    pub fn receiver_count(&self, action: &str) -> usize {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.values().filter(|e| e.action == action).count()
    }
}

impl BroadcastBus for LocalBroadcastBus {
    fn register(
        &self,
        action: &str,
        receiver: Arc<dyn BroadcastReceiver>,
    ) -> Result<RegistrationId> {
        let id = RegistrationId::new();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(
            id,
            Entry {
                action: action.to_string(),
                receiver,
            },
        );
        debug!("Registered receiver {:?} for {}", id, action);
        Ok(id)
    }

    fn unregister(&self, id: RegistrationId) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(&id).is_some()
    }
}
