//! Bridge from observer broadcasts to a single cancellable event stream

pub mod controller;
pub mod receiver;
pub mod sink;

pub use controller::{StreamController, StreamSession};
pub use receiver::RelayReceiver;
pub use sink::{ChannelSink, EventSink, SinkSlot, StreamEvent};
