//! In-process broker with configurable acknowledgment latency and failures.

use rand::Rng;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::{BrokerClient, OutboundMessage};
use crate::delivery::DeliveryCallback;
use crate::error::{DeliveryError, ProducerError, Result};

/// Behaviour of the simulated broker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatedBrokerConfig {
    /// Delay between submission and acknowledgment
    pub ack_delay: Duration,
    /// Fraction of deliveries reported as failed (0.0 to 1.0)
    pub failure_rate: f64,
    /// Maximum messages in flight before submissions are rejected
    pub queue_capacity: usize,
}

impl Default for SimulatedBrokerConfig {
    fn default() -> Self {
        Self {
            ack_delay: Duration::from_millis(5),
            failure_rate: 0.0,
            queue_capacity: 100_000,
        }
    }
}

/// How often `flush` re-checks entries another thread is dispatching
const DISPATCH_RECHECK: Duration = Duration::from_millis(1);

struct InFlight {
    due: Instant,
    outcome: std::result::Result<(), DeliveryError>,
    callback: DeliveryCallback,
}

/// Broker stand-in that acknowledges messages after a fixed delay.
///
/// Like librdkafka, callbacks only run from `poll` or `flush`, on whichever
/// thread calls them. An entry counts as in flight until its callback has
/// returned, including while another thread is dispatching it.
pub struct SimulatedBroker {
    config: SimulatedBrokerConfig,
    queue: Mutex<VecDeque<InFlight>>,
    dispatching: AtomicUsize,
}

/// Releases one dispatch slot when the callback returns or unwinds
struct DispatchSlot<'a>(&'a AtomicUsize);

impl Drop for DispatchSlot<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl SimulatedBroker {
    pub fn new(config: SimulatedBrokerConfig) -> Self {
        Self {
            config,
            queue: Mutex::new(VecDeque::new()),
            dispatching: AtomicUsize::new(0),
        }
    }

    /// Broker that acknowledges every message after `ack_delay`
    pub fn with_ack_delay(ack_delay: Duration) -> Self {
        Self::new(SimulatedBrokerConfig {
            ack_delay,
            ..Default::default()
        })
    }

    fn lock_queue(&self) -> MutexGuard<'_, VecDeque<InFlight>> {
        self.queue
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn draw_outcome(&self, topic: &str) -> std::result::Result<(), DeliveryError> {
        if self.config.failure_rate > 0.0 {
            let mut rng = rand::thread_rng();
            if rng.gen::<f64>() < self.config.failure_rate {
                return Err(DeliveryError::new(format!(
                    "Simulated delivery failure for topic '{}'",
                    topic
                )));
            }
        }
        Ok(())
    }

    /// Remove every entry whose acknowledgment is due and mark it as dispatching
    fn take_due(&self, now: Instant) -> Vec<InFlight> {
        let mut queue = self.lock_queue();

        let mut due = Vec::new();
        while queue.front().is_some_and(|entry| entry.due <= now) {
            if let Some(entry) = queue.pop_front() {
                due.push(entry);
            }
        }
        // Counted before the queue lock is released so in_flight never dips
        self.dispatching.fetch_add(due.len(), Ordering::AcqRel);
        due
    }

    fn next_due(&self) -> Option<Instant> {
        self.lock_queue().front().map(|entry| entry.due)
    }
}

impl BrokerClient for SimulatedBroker {
    fn produce(&self, message: OutboundMessage<'_>, callback: DeliveryCallback) -> Result<()> {
        let outcome = self.draw_outcome(message.topic);
        let mut queue = self.lock_queue();

        if queue.len() >= self.config.queue_capacity {
            return Err(ProducerError::submission(message.topic, "Local: Queue full"));
        }

        queue.push_back(InFlight {
            due: Instant::now() + self.config.ack_delay,
            outcome,
            callback,
        });
        Ok(())
    }

    fn poll(&self) {
        let due = self.take_due(Instant::now());
        let mut slots: Vec<_> = due.iter().map(|_| DispatchSlot(&self.dispatching)).collect();

        // Callbacks run without holding the queue lock
        for entry in due {
            entry.callback.complete(entry.outcome);
            drop(slots.pop());
        }
    }

    fn flush(&self, timeout: Duration) -> usize {
        let deadline = Instant::now() + timeout;

        loop {
            self.poll();

            if self.in_flight() == 0 {
                return 0;
            }

            let now = Instant::now();
            if now >= deadline {
                return self.in_flight();
            }

            // Entries dispatching elsewhere have no due time; re-check shortly
            let recheck = now + DISPATCH_RECHECK;
            let wake = match self.next_due() {
                Some(next) if self.dispatching.load(Ordering::Acquire) == 0 => next,
                Some(next) => next.min(recheck),
                None => recheck,
            }
            .min(deadline);
            std::thread::sleep(wake.saturating_duration_since(now));
        }
    }

    fn in_flight(&self) -> usize {
        // Read under the queue lock so an entry moving to dispatching is counted once
        let queue = self.lock_queue();
        queue.len() + self.dispatching.load(Ordering::Acquire)
    }
}
