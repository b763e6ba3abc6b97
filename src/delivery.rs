//! Per-send correlation state and the delivery callback that consumes it.
//!
//! A `PendingSend` is captured when a message is submitted and travels with
//! the message through the broker client as part of a `DeliveryCallback`.
//! The callback is consumed when the acknowledgment arrives, so each send can
//! produce at most one completion event.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};

use crate::error::DeliveryError;
use crate::event::{CompletionEvent, RequestContext, RequestType};
use crate::sink::EventSink;

/// State captured at submission time for one send
#[derive(Debug, Clone)]
pub struct PendingSend {
    pub identifier: String,
    pub response_length: u64,
    pub start_time: DateTime<Utc>,
    pub started: Instant,
    pub context: RequestContext,
}

impl PendingSend {
    /// Capture both clocks now
    pub fn start(identifier: String, response_length: u64, context: RequestContext) -> Self {
        let started = Instant::now();
        let start_time = Utc::now();
        Self {
            identifier,
            response_length,
            start_time,
            started,
            context,
        }
    }

    /// Milliseconds on the monotonic clock since submission
    pub fn elapsed_ms(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }

    /// Turn the captured state into its completion event
    pub fn finish(self, outcome: Result<(), DeliveryError>) -> CompletionEvent {
        let elapsed_ms = self.elapsed_ms();
        CompletionEvent {
            request_type: RequestType::Enqueue,
            name: self.identifier,
            start_time: self.start_time,
            elapsed_ms,
            response_length: self.response_length,
            context: self.context,
            error: outcome.err(),
        }
    }
}

/// Shutdown generations.
///
/// Every send records the generation that was current when it was
/// submitted. Closing a generation silences all of its late acknowledgments.
#[derive(Debug, Clone, Default)]
pub struct DeliveryGate {
    generation: Arc<AtomicU64>,
}

impl DeliveryGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Close the current generation and start the next one
    pub fn close_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::AcqRel)
    }

    fn is_open(&self, generation: u64) -> bool {
        self.current() == generation
    }
}

/// Handler for exactly one delivery acknowledgment
pub struct DeliveryCallback {
    pending: PendingSend,
    sink: Arc<dyn EventSink>,
    gate: DeliveryGate,
    generation: u64,
}

impl DeliveryCallback {
    pub fn new(pending: PendingSend, sink: Arc<dyn EventSink>, gate: DeliveryGate) -> Self {
        let generation = gate.current();
        Self {
            pending,
            sink,
            gate,
            generation,
        }
    }

    /// Report the broker's verdict for this send
    pub fn complete(self, outcome: Result<(), DeliveryError>) {
        if !self.gate.is_open(self.generation) {
            tracing::trace!(
                name = %self.pending.identifier,
                generation = self.generation,
                "Discarding acknowledgment that arrived after shutdown"
            );
            return;
        }

        if let Err(err) = &outcome {
            tracing::debug!(
                name = %self.pending.identifier,
                error = %err,
                "Broker reported delivery failure"
            );
        }

        let event = self.pending.finish(outcome);
        self.sink.fire_request(event);
    }
}

impl std::fmt::Debug for DeliveryCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryCallback")
            .field("pending", &self.pending)
            .field("generation", &self.generation)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::RecordingSink;
    use std::time::Duration;

    fn pending(name: &str, length: u64) -> PendingSend {
        PendingSend::start(name.to_string(), length, RequestContext::new())
    }

    #[test]
    fn test_finish_builds_enqueue_event() {
        let mut context = RequestContext::new();
        context.insert("session".to_string(), "s-1".into());
        let pending = PendingSend::start("order-create".to_string(), 7, context);
        let start_time = pending.start_time;

        let event = pending.finish(Ok(()));
        assert_eq!(event.request_type, RequestType::Enqueue);
        assert_eq!(event.name, "order-create");
        assert_eq!(event.start_time, start_time);
        assert_eq!(event.response_length, 7);
        assert_eq!(event.context["session"], "s-1");
        assert!(event.error.is_none());
        assert!(event.elapsed_ms >= 0.0);
    }

    #[test]
    fn test_elapsed_tracks_delay() {
        let pending = pending("orders", 1);
        std::thread::sleep(Duration::from_millis(20));
        let event = pending.finish(Ok(()));

        assert!(event.elapsed_ms >= 20.0, "elapsed {}", event.elapsed_ms);
        assert!(event.elapsed_ms < 200.0, "elapsed {}", event.elapsed_ms);
    }

    #[test]
    fn test_failure_keeps_request_type() {
        let event = pending("orders", 1).finish(Err(DeliveryError::new("Message timed out")));
        assert_eq!(event.request_type, RequestType::Enqueue);
        assert_eq!(event.error, Some(DeliveryError::new("Message timed out")));
    }

    #[test]
    fn test_callback_fires_sink_once() {
        let sink = Arc::new(RecordingSink::new());
        let callback =
            DeliveryCallback::new(pending("orders", 3), sink.clone(), DeliveryGate::new());

        callback.complete(Ok(()));
        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "orders");
    }

    #[test]
    fn test_closed_generation_discards_event() {
        let sink = Arc::new(RecordingSink::new());
        let gate = DeliveryGate::new();
        let early = DeliveryCallback::new(pending("early", 1), sink.clone(), gate.clone());

        assert_eq!(gate.close_generation(), 0);
        let late = DeliveryCallback::new(pending("late", 1), sink.clone(), gate.clone());

        early.complete(Ok(()));
        late.complete(Ok(()));

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "late");
    }

    #[test]
    fn test_callback_runs_on_another_thread() {
        let sink = Arc::new(RecordingSink::new());
        let callback =
            DeliveryCallback::new(pending("orders", 1), sink.clone(), DeliveryGate::new());

        std::thread::spawn(move || callback.complete(Ok(())))
            .join()
            .unwrap();

        assert_eq!(sink.len(), 1);
    }
}
