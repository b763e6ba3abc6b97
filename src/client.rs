//! Timed producer client.

use std::sync::Arc;
use std::time::Duration;

use crate::broker::{BrokerClient, OutboundMessage};
use crate::delivery::{DeliveryCallback, DeliveryGate, PendingSend};
use crate::error::Result;
use crate::request::SendRequest;
use crate::sink::EventSink;

/// Wraps a broker producer so every enqueue is reported as one completion event
pub struct ProducerClient<B: BrokerClient> {
    /// Underlying producer
    broker: B,

    /// Destination for completion events
    sink: Arc<dyn EventSink>,

    /// Shutdown generations shared with outstanding callbacks
    gate: DeliveryGate,
}

impl<B: BrokerClient> ProducerClient<B> {
    /// Wrap an existing broker client
    pub fn new(broker: B, sink: Arc<dyn EventSink>) -> Self {
        Self {
            broker,
            sink,
            gate: DeliveryGate::new(),
        }
    }

    /// Submit a message for asynchronous delivery.
    ///
    /// `Ok` only means the broker client accepted the message. The completion
    /// event is fired later, when the acknowledgment is dispatched. A
    /// synchronous rejection is returned here and produces no event.
    pub fn send(&self, request: SendRequest) -> Result<()> {
        let identifier = request.identifier().to_string();
        let response_length = request.reported_length();
        let SendRequest {
            topic,
            payload,
            key,
            context,
            ..
        } = request;

        let pending = PendingSend::start(identifier, response_length, context);
        let callback = DeliveryCallback::new(pending, self.sink.clone(), self.gate.clone());

        let message = OutboundMessage {
            topic: &topic,
            payload: &payload,
            key: key.as_deref(),
        };

        if let Err(e) = self.broker.produce(message, callback) {
            tracing::warn!(topic = %topic, error = %e, "Message rejected by producer");
            return Err(e);
        }
        tracing::trace!(topic = %topic, bytes = payload.len(), "Message enqueued");

        self.broker.poll();
        Ok(())
    }

    /// Dispatch completion events for deliveries already acknowledged
    pub fn poll(&self) {
        self.broker.poll();
    }

    /// Sends accepted but not yet acknowledged
    pub fn in_flight(&self) -> usize {
        self.broker.in_flight()
    }

    /// Wait up to `timeout` for outstanding deliveries to report.
    ///
    /// Acknowledgments for sends issued before this call that arrive after it
    /// returns are dropped. Returns the number of sends abandoned this way.
    pub fn shutdown(&self, timeout: Duration) -> usize {
        let in_flight = self.broker.in_flight();
        tracing::debug!(
            in_flight = in_flight,
            timeout_ms = timeout.as_millis() as u64,
            "Draining producer"
        );

        let remaining = self.broker.flush(timeout);
        self.gate.close_generation();

        if remaining > 0 {
            tracing::warn!(
                remaining = remaining,
                "Shutdown timed out; dropping completion events for undelivered messages"
            );
        } else {
            tracing::debug!("Producer drained");
        }

        remaining
    }
}

#[cfg(feature = "kafka")]
impl ProducerClient<crate::broker::KafkaBroker> {
    /// Create a Kafka-backed client
    pub fn connect(
        config: &crate::config::ProducerConfig,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self> {
        let broker = crate::broker::KafkaBroker::new(config)?;
        Ok(Self::new(broker, sink))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{SimulatedBroker, SimulatedBrokerConfig};
    use crate::error::ProducerError;
    use crate::sink::RecordingSink;
    use bytes::Bytes;

    fn client(ack_delay: Duration) -> (ProducerClient<SimulatedBroker>, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::new());
        let client = ProducerClient::new(SimulatedBroker::with_ack_delay(ack_delay), sink.clone());
        (client, sink)
    }

    #[test]
    fn test_send_does_not_emit_before_ack() {
        let (client, sink) = client(Duration::from_secs(10));
        client
            .send(SendRequest::new("orders", Bytes::from_static(b"payload")))
            .unwrap();

        assert!(sink.is_empty());
        assert_eq!(client.in_flight(), 1);
    }

    #[test]
    fn test_send_polls_previous_acks() {
        let (client, sink) = client(Duration::ZERO);
        client.send(SendRequest::new("orders", "a")).unwrap();
        client.send(SendRequest::new("orders", "b")).unwrap();

        // Each send polls immediately after enqueueing
        assert_eq!(sink.len(), 2);
        assert_eq!(client.in_flight(), 0);
    }

    #[test]
    fn test_send_uses_name_and_override() {
        let (client, sink) = client(Duration::ZERO);
        client
            .send(
                SendRequest::new("orders", vec![b'x'; 100])
                    .name("bulk")
                    .response_length(500),
            )
            .unwrap();

        let events = sink.events();
        assert_eq!(events[0].name, "bulk");
        assert_eq!(events[0].response_length, 500);
    }

    #[test]
    fn test_rejected_send_emits_nothing() {
        let sink = Arc::new(RecordingSink::new());
        let broker = SimulatedBroker::new(SimulatedBrokerConfig {
            queue_capacity: 0,
            ..Default::default()
        });
        let client = ProducerClient::new(broker, sink.clone());

        let err = client.send(SendRequest::new("orders", "a")).unwrap_err();
        assert!(matches!(err, ProducerError::Submission { .. }));

        client.shutdown(Duration::from_millis(50));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_shutdown_drains_pending() {
        let (client, sink) = client(Duration::from_millis(10));
        for _ in 0..3 {
            client.send(SendRequest::new("orders", "a")).unwrap();
        }

        assert_eq!(client.shutdown(Duration::from_secs(2)), 0);
        assert_eq!(sink.len(), 3);
    }

    #[test]
    fn test_client_usable_after_shutdown() {
        let (client, sink) = client(Duration::ZERO);
        client.shutdown(Duration::from_millis(10));

        client.send(SendRequest::new("orders", "a")).unwrap();
        assert_eq!(sink.len(), 1);
    }
}
