//! Per-call send request.

use bytes::Bytes;
use serde_json::Value;

use crate::event::RequestContext;

/// A single message to enqueue, plus how it should be reported
#[derive(Debug, Clone, Default)]
pub struct SendRequest {
    pub topic: String,
    pub payload: Bytes,
    pub key: Option<Bytes>,
    /// Reported instead of the payload length when set
    pub response_length: Option<u64>,
    /// Reported instead of the topic when set
    pub name: Option<String>,
    pub context: RequestContext,
}

impl SendRequest {
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            ..Default::default()
        }
    }

    pub fn key(mut self, key: impl Into<Bytes>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn response_length(mut self, length: u64) -> Self {
        self.response_length = Some(length);
        self
    }

    pub fn context(mut self, context: RequestContext) -> Self {
        self.context = context;
        self
    }

    /// Add a single context entry
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Name the completion event is reported under; an empty name counts as unset
    pub fn identifier(&self) -> &str {
        self.name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.topic)
    }

    /// Length the completion event reports
    pub fn reported_length(&self) -> u64 {
        self.response_length.unwrap_or(self.payload.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_falls_back_to_topic() {
        let request = SendRequest::new("orders", Bytes::from_static(b"payload"));
        assert_eq!(request.identifier(), "orders");

        let request = request.name("order-create");
        assert_eq!(request.identifier(), "order-create");

        let request = request.name("");
        assert_eq!(request.identifier(), "orders");
    }

    #[test]
    fn test_reported_length() {
        let request = SendRequest::new("orders", vec![b'x'; 100]);
        assert_eq!(request.reported_length(), 100);
        assert_eq!(request.clone().response_length(500).reported_length(), 500);
        assert_eq!(request.response_length(0).reported_length(), 0);
    }

    #[test]
    fn test_builder_sets_key_and_context() {
        let request = SendRequest::new("orders", "abc")
            .key("customer-1")
            .with_context("user", "alice");

        assert_eq!(request.key.as_deref(), Some(&b"customer-1"[..]));
        assert_eq!(request.context["user"], "alice");
    }
}
