//! Event sinks that receive completion events.
//!
//! A sink may be called from the broker client's dispatch thread, so every
//! implementation must be safe to call concurrently and must not block.

use std::sync::Mutex;

use tokio::sync::mpsc;

use crate::event::CompletionEvent;

/// Destination for completion events
pub trait EventSink: Send + Sync {
    /// Fire-and-forget delivery of one completion event
    fn fire_request(&self, event: CompletionEvent);
}

impl<F> EventSink for F
where
    F: Fn(CompletionEvent) + Send + Sync,
{
    fn fire_request(&self, event: CompletionEvent) {
        self(event)
    }
}

/// Forwards events into an unbounded tokio channel
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<CompletionEvent>,
}

impl ChannelSink {
    /// Create a sink together with the receiving end of its channel
    pub fn new() -> (Self, mpsc::UnboundedReceiver<CompletionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn fire_request(&self, event: CompletionEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("Event receiver dropped, discarding completion event");
        }
    }
}

/// Emits one structured log line per event
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn fire_request(&self, event: CompletionEvent) {
        match &event.error {
            None => tracing::debug!(
                request_type = %event.request_type,
                name = %event.name,
                elapsed_ms = event.elapsed_ms,
                response_length = event.response_length,
                "Request completed"
            ),
            Some(err) => tracing::warn!(
                request_type = %event.request_type,
                name = %event.name,
                elapsed_ms = event.elapsed_ms,
                response_length = event.response_length,
                error = %err,
                "Request failed"
            ),
        }
    }
}

/// Keeps every event in memory, in arrival order
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<CompletionEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the events received so far
    pub fn events(&self) -> Vec<CompletionEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|events| events.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for RecordingSink {
    fn fire_request(&self, event: CompletionEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
