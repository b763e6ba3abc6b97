//! Completion events reported to the load-test event collector.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::DeliveryError;

/// Opaque per-request key/value data forwarded untouched to the collector
pub type RequestContext = Map<String, Value>;

/// Request type tag attached to every completion event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RequestType {
    #[default]
    #[serde(rename = "ENQUEUE")]
    Enqueue,
}

impl RequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestType::Enqueue => "ENQUEUE",
        }
    }
}

impl std::fmt::Display for RequestType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One finished enqueue, shaped like a request/response record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionEvent {
    pub request_type: RequestType,
    /// Request name, or the topic when no name was given
    pub name: String,
    /// Wall-clock time at submission
    pub start_time: DateTime<Utc>,
    /// Submission to acknowledgment, measured on the monotonic clock
    pub elapsed_ms: f64,
    pub response_length: u64,
    pub context: RequestContext,
    /// Set when the broker reported a delivery failure
    pub error: Option<DeliveryError>,
}

impl CompletionEvent {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event(error: Option<DeliveryError>) -> CompletionEvent {
        let mut context = RequestContext::new();
        context.insert("user_id".to_string(), Value::from(42));

        CompletionEvent {
            request_type: RequestType::Enqueue,
            name: "order-create".to_string(),
            start_time: Utc::now(),
            elapsed_ms: 12.5,
            response_length: 7,
            context,
            error,
        }
    }

    #[test]
    fn test_request_type_tag() {
        assert_eq!(RequestType::Enqueue.to_string(), "ENQUEUE");
        assert_eq!(
            serde_json::to_value(RequestType::Enqueue).unwrap(),
            Value::from("ENQUEUE")
        );
    }

    #[test]
    fn test_event_serialization() {
        let event = sample_event(None);
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["request_type"], "ENQUEUE");
        assert_eq!(json["name"], "order-create");
        assert_eq!(json["response_length"], 7);
        assert_eq!(json["context"]["user_id"], 42);
        assert!(json["error"].is_null());
    }

    #[test]
    fn test_failed_event_is_not_success() {
        let event = sample_event(Some(DeliveryError::new("Message timed out")));
        assert!(!event.is_success());
        assert!(sample_event(None).is_success());

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["error"]["message"], "Message timed out");
    }
}
