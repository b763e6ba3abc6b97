//! Broker client seam.
//!
//! The timing layer only needs three things from a producer library:
//! - an asynchronous produce that carries a per-message delivery callback
//! - a non-blocking poll that dispatches acknowledged callbacks
//! - a bounded flush that drains outstanding messages

#[cfg(feature = "kafka")]
pub mod kafka;
pub mod simulated;

use std::time::Duration;

use crate::delivery::DeliveryCallback;
use crate::error::Result;

#[cfg(feature = "kafka")]
pub use kafka::KafkaBroker;
pub use simulated::{SimulatedBroker, SimulatedBrokerConfig};

/// Message handed to the broker client
#[derive(Debug, Clone, Copy)]
pub struct OutboundMessage<'a> {
    pub topic: &'a str,
    pub payload: &'a [u8],
    pub key: Option<&'a [u8]>,
}

/// Asynchronous producer backing a `ProducerClient`
pub trait BrokerClient: Send + Sync {
    /// Enqueue a message. On success the broker owns `callback` and must
    /// complete it exactly once; on error it is dropped without completing.
    fn produce(&self, message: OutboundMessage<'_>, callback: DeliveryCallback) -> Result<()>;

    /// Dispatch callbacks for deliveries that have already been acknowledged
    fn poll(&self);

    /// Wait up to `timeout` for outstanding deliveries, returning how many remain
    fn flush(&self, timeout: Duration) -> usize;

    /// Messages accepted but not yet acknowledged
    fn in_flight(&self) -> usize;
}
