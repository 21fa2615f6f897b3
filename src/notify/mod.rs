//! Broadcast transport between the notification observer and the bridge
//!
//! The observer writes length-prefixed JSON broadcasts to a Unix domain socket.
//! The relay turns them into in-process broadcasts on a `LocalBroadcastBus`.

pub mod bus;
pub mod client;
pub mod frame;
pub mod protocol;
pub mod server;

pub use bus::{BroadcastBus, BroadcastReceiver, LocalBroadcastBus, Registration, RegistrationId};
pub use client::send_broadcast;
pub use protocol::{Broadcast, Extras, NotificationEvent, NOTIFICATION_ACTION};
pub use server::{bind_listener, serve};

/// Default socket path for the broadcast listener
pub fn socket_path() -> std::path::PathBuf {
    directories::ProjectDirs::from("", "", "notification-relay")
        .map(|d| d.runtime_dir().unwrap_or(d.data_dir()).to_path_buf())
        .unwrap_or_else(|| std::env::temp_dir().join("notification-relay"))
        .join("relay.sock")
}
