//! Protocol definitions for notification broadcasts

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{BridgeError, Result};

/// Action identifier the observer broadcasts every captured notification under
pub const NOTIFICATION_ACTION: &str = "notification_relay.NOTIFICATION_POSTED";

/// Key/value data attached to a broadcast
pub type Extras = serde_json::Map<String, Value>;

/// Extras keys written by the observer
pub mod extra_keys {
    pub const PACKAGE: &str = "package";
    pub const TITLE: &str = "title";
    pub const TEXT: &str = "text";
    pub const TIMESTAMP: &str = "timestamp";
}

/// A fire-and-forget message delivered to every receiver of its action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Broadcast {
    pub action: String,
    #[serde(default)]
    pub extras: Extras,
}

impl Broadcast {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            extras: Extras::new(),
        }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extras.insert(key.into(), value.into());
        self
    }
}

/// One captured notification, relayed to the stream consumer
///
/// Serialized flat: `{"sourcePackage": "...", "title": "...", ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    source_package: String,
    #[serde(flatten)]
    fields: BTreeMap<String, Value>,
}

impl NotificationEvent {
    /// Build an event from broadcast extras
    ///
    /// `package` must be a non-empty string; every other extra is carried
    /// through untouched.
    pub fn from_extras(extras: &Extras) -> Result<Self> {
        let source_package = match extras.get(extra_keys::PACKAGE) {
            Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
            Some(Value::String(_)) => {
                return Err(BridgeError::MalformedPayload("empty `package` extra".to_string()))
            }
            Some(other) => {
                return Err(BridgeError::MalformedPayload(format!(
                    "`package` extra is not a string: {}",
                    other
                )))
            }
            None => {
                return Err(BridgeError::MalformedPayload("missing `package` extra".to_string()))
            }
        };

        let fields = extras
            .iter()
            .filter(|(k, _)| k.as_str() != extra_keys::PACKAGE && k.as_str() != "sourcePackage")
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Ok(Self {
            source_package,
            fields,
        })
    }

    pub fn source_package(&self) -> &str {
        &self.source_package
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn title(&self) -> Option<&str> {
        self.field(extra_keys::TITLE).and_then(Value::as_str)
    }

    pub fn text(&self) -> Option<&str> {
        self.field(extra_keys::TEXT).and_then(Value::as_str)
    }

    pub fn timestamp_millis(&self) -> Option<i64> {
        self.field(extra_keys::TIMESTAMP).and_then(Value::as_i64)
    }
}
