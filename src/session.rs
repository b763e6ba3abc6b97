//! Per-user producer session for load-test hosts.
//!
//! One simulated user owns one session. The host starts it with the user and
//! calls `on_stop` when the user stops, which drains outstanding sends.

use std::sync::Arc;
use std::time::Duration;

use crate::broker::BrokerClient;
use crate::client::ProducerClient;
use crate::error::Result;
use crate::request::SendRequest;
use crate::sink::EventSink;

/// Drain timeout used when a session stops
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

pub struct ProducerSession<B: BrokerClient> {
    client: ProducerClient<B>,
    stop_timeout: Duration,
}

impl<B: BrokerClient> ProducerSession<B> {
    pub fn new(broker: B, sink: Arc<dyn EventSink>) -> Self {
        Self {
            client: ProducerClient::new(broker, sink),
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }

    pub fn with_stop_timeout(mut self, stop_timeout: Duration) -> Self {
        self.stop_timeout = stop_timeout;
        self
    }

    pub fn client(&self) -> &ProducerClient<B> {
        &self.client
    }

    pub fn stop_timeout(&self) -> Duration {
        self.stop_timeout
    }

    pub fn send(&self, request: SendRequest) -> Result<()> {
        self.client.send(request)
    }

    /// Drain the producer, returning the number of abandoned sends
    pub fn on_stop(&self) -> usize {
        self.client.shutdown(self.stop_timeout)
    }
}

#[cfg(feature = "kafka")]
impl ProducerSession<crate::broker::KafkaBroker> {
    /// Start a Kafka-backed session
    pub fn start(
        config: &crate::config::ProducerConfig,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self> {
        let broker = crate::broker::KafkaBroker::new(config)?;
        Ok(Self::new(broker, sink))
    }
}
