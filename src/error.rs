// Error handling module
// Defines the synchronous error taxonomy and the asynchronous delivery error value

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned synchronously by the producer layer
#[derive(Error, Debug)]
pub enum ProducerError {
    /// Invalid construction-time settings, rejected locally or by the broker client
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The broker client refused a message before accepting it for delivery
    #[error("Submission rejected for topic '{topic}': {reason}")]
    Submission { topic: String, reason: String },
}

impl ProducerError {
    /// Shorthand for a submission rejection
    pub fn submission(topic: impl Into<String>, reason: impl Into<String>) -> Self {
        ProducerError::Submission {
            topic: topic.into(),
            reason: reason.into(),
        }
    }
}

/// Broker-reported failure for a message that was previously accepted.
///
/// This is carried as data inside a completion event, never raised.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("Delivery failed: {message}")]
pub struct DeliveryError {
    pub message: String,
}

impl DeliveryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Result type alias for producer operations
pub type Result<T> = std::result::Result<T, ProducerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ProducerError::Configuration("bootstrap servers must not be empty".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: bootstrap servers must not be empty"
        );

        let err = ProducerError::submission("orders", "Local: Queue full");
        assert_eq!(
            err.to_string(),
            "Submission rejected for topic 'orders': Local: Queue full"
        );
    }

    #[test]
    fn test_delivery_error_message() {
        let err = DeliveryError::new("Broker: Not enough in-sync replicas");
        assert_eq!(
            err.to_string(),
            "Delivery failed: Broker: Not enough in-sync replicas"
        );
    }

    #[test]
    fn test_delivery_error_serializes_as_object() {
        let err = DeliveryError::new("Message timed out");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["message"], "Message timed out");
    }
}
