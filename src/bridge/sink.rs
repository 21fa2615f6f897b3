//! Downstream sink for the event stream

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::debug;

use crate::notify::NotificationEvent;

/// One delivery on the stream, as seen by the consumer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StreamEvent {
    Data {
        event: NotificationEvent,
    },
    Error {
        code: String,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<Value>,
    },
    EndOfStream,
}

/// Consumer handle receiving stream deliveries
///
/// Called from the broadcast dispatch path: implementations must not block.
pub trait EventSink: Send + Sync {
    fn success(&self, event: NotificationEvent);
    fn error(&self, code: &str, message: &str, details: Option<Value>);
    fn end_of_stream(&self);
}

/// Sink forwarding deliveries into an unbounded channel
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<StreamEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StreamEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn push(&self, event: StreamEvent) {
        if self.tx.send(event).is_err() {
            debug!("Stream consumer is gone; discarding delivery");
        }
    }
}

impl EventSink for ChannelSink {
    fn success(&self, event: NotificationEvent) {
        self.push(StreamEvent::Data { event });
    }

    fn error(&self, code: &str, message: &str, details: Option<Value>) {
        self.push(StreamEvent::Error {
            code: code.to_string(),
            message: message.to_string(),
            details,
        });
    }

    fn end_of_stream(&self) {
        self.push(StreamEvent::EndOfStream);
    }
}

/// Swappable reference to the current sink
///
/// Deliveries run while holding a read borrow of the slot, and `detach` swaps
/// in `None` under the write side. Once `detach` returns, no delivery to the
/// old sink is still running and none can start.
pub struct SinkSlot {
    current: watch::Sender<Option<Arc<dyn EventSink>>>,
}

impl SinkSlot {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        let (current, _) = watch::channel(Some(sink));
        Self { current }
    }

    /// Run `deliver` against the attached sink. Returns false when detached.
    pub fn deliver(&self, deliver: impl FnOnce(&dyn EventSink)) -> bool {
        let current = self.current.borrow();
        match current.as_deref() {
            Some(sink) => {
                deliver(sink);
                true
            }
            None => false,
        }
    }

    /// Clear the slot, returning the sink that was attached
    pub fn detach(&self) -> Option<Arc<dyn EventSink>> {
        self.current.send_replace(None)
    }

    pub fn is_attached(&self) -> bool {
        self.current.borrow().is_some()
    }
}
