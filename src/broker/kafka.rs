//! Kafka producer backed by librdkafka.
//!
//! Each message carries its boxed `DeliveryCallback` as the rdkafka delivery
//! opaque, so correlation needs no lookup table: librdkafka hands the opaque
//! back to `TimingContext::delivery` from inside `poll`/`flush`.

use std::time::Duration;

use rdkafka::config::ClientConfig;
use rdkafka::producer::{BaseProducer, BaseRecord, DeliveryResult, Producer, ProducerContext};
use rdkafka::ClientContext;

use super::{BrokerClient, OutboundMessage};
use crate::config::ProducerConfig;
use crate::delivery::DeliveryCallback;
use crate::error::{DeliveryError, ProducerError, Result};

/// Producer context that routes delivery reports to their callbacks
pub struct TimingContext;

impl ClientContext for TimingContext {}

impl ProducerContext for TimingContext {
    type DeliveryOpaque = Box<DeliveryCallback>;

    fn delivery(&self, delivery_result: &DeliveryResult<'_>, callback: Self::DeliveryOpaque) {
        let outcome = match delivery_result {
            Ok(_) => Ok(()),
            Err((err, _message)) => Err(DeliveryError::new(err.to_string())),
        };
        callback.complete(outcome);
    }
}

/// Kafka implementation of `BrokerClient`
pub struct KafkaBroker {
    producer: BaseProducer<TimingContext>,
}

impl KafkaBroker {
    /// Create the underlying producer from the bootstrap address and passthrough options
    pub fn new(config: &ProducerConfig) -> Result<Self> {
        config.validate()?;

        let mut client_config = ClientConfig::new();
        client_config.set("bootstrap.servers", &config.bootstrap_servers);

        // Passthrough options are applied last and may override the bootstrap address
        for (key, value) in &config.options {
            client_config.set(key, value);
        }

        let producer: BaseProducer<TimingContext> = client_config
            .create_with_context(TimingContext)
            .map_err(|e| {
                ProducerError::Configuration(format!("Failed to create Kafka producer: {}", e))
            })?;

        tracing::info!(
            bootstrap_servers = %config.bootstrap_servers,
            options = config.options.len(),
            "Kafka producer created"
        );

        Ok(Self { producer })
    }
}

impl BrokerClient for KafkaBroker {
    fn produce(&self, message: OutboundMessage<'_>, callback: DeliveryCallback) -> Result<()> {
        let mut record =
            BaseRecord::<[u8], [u8], _>::with_opaque_to(message.topic, Box::new(callback))
                .payload(message.payload);
        if let Some(key) = message.key {
            record = record.key(key);
        }

        // A rejected record is returned to us and dropped here, callback included
        self.producer
            .send(record)
            .map_err(|(err, _record)| ProducerError::submission(message.topic, err.to_string()))
    }

    fn poll(&self) {
        self.producer.poll(Duration::ZERO);
    }

    fn flush(&self, timeout: Duration) -> usize {
        if let Err(e) = self.producer.flush(timeout) {
            tracing::debug!(error = %e, "Kafka flush did not complete");
        }
        self.in_flight()
    }

    fn in_flight(&self) -> usize {
        self.producer.in_flight_count().max(0) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_option_is_configuration_error() {
        let config = ProducerConfig::new("localhost:9092").option("no.such.property", "1");
        let err = KafkaBroker::new(&config).err().unwrap();
        assert!(matches!(err, ProducerError::Configuration(_)));
    }

    #[test]
    fn test_empty_bootstrap_is_configuration_error() {
        let err = KafkaBroker::new(&ProducerConfig::new("")).err().unwrap();
        assert!(matches!(err, ProducerError::Configuration(_)));
    }

    #[test]
    fn test_create_without_connecting() {
        let config = ProducerConfig::new("localhost:9092").option("message.timeout.ms", "1000");
        let broker = KafkaBroker::new(&config).unwrap();
        assert_eq!(broker.in_flight(), 0);
    }
}
