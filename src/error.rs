//! Error types for the notification bridge

use thiserror::Error;

/// Failures the bridge can surface to a stream consumer
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The broadcast bus refused to register a receiver
    #[error("broadcast registration rejected for action `{action}`: {reason}")]
    RegistrationRejected { action: String, reason: String },

    /// The observer process could not be launched
    #[error("failed to start notification observer `{program}`: {source}")]
    ObserverStart {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A broadcast carried extras that do not describe a notification
    #[error("malformed notification payload: {0}")]
    MalformedPayload(String),
}

impl BridgeError {
    /// Stable code reported through the stream's error channel
    pub fn code(&self) -> &'static str {
        match self {
            BridgeError::RegistrationRejected { .. } => "REGISTRATION_FAILED",
            BridgeError::ObserverStart { .. } => "OBSERVER_START_FAILED",
            BridgeError::MalformedPayload(_) => "MALFORMED_PAYLOAD",
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        let err = BridgeError::RegistrationRejected {
            action: "a".to_string(),
            reason: "denied".to_string(),
        };
        assert_eq!(err.code(), "REGISTRATION_FAILED");
        assert!(err.to_string().contains("denied"));

        let err = BridgeError::MalformedPayload("missing package".to_string());
        assert_eq!(err.code(), "MALFORMED_PAYLOAD");
    }
}
