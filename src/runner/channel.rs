//! Event channel adapter.
//!
//! Sits between the raw JSONL stream and the progress engine: normalizes
//! each line into a typed [`EventEnvelope`] and forwards it — but only
//! while the owning session is still attached. Events arriving after
//! [`detach`](EventChannel::detach) are dropped silently; nothing here
//! ever panics on a late or malformed line.
//!
//! Reconnection is the runner's problem, not this adapter's.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use metrics::counter;
use tokio::sync::mpsc;
use tracing::debug;

use super::event::{EventEnvelope, parse_line};

/// Liveness-gated forwarder from the runner's event stream to the engine.
///
/// Cheap to clone; all clones share one liveness flag, so a single
/// `detach()` silences every producer at once.
#[derive(Debug, Clone)]
pub struct EventChannel {
    alive: Arc<AtomicBool>,
    tx: mpsc::UnboundedSender<EventEnvelope>,
}

impl EventChannel {
    /// Creates an adapter forwarding into the given engine inbox.
    #[must_use]
    pub fn new(tx: mpsc::UnboundedSender<EventEnvelope>) -> Self {
        Self {
            alive: Arc::new(AtomicBool::new(true)),
            tx,
        }
    }

    /// Forwards one typed event to the engine.
    ///
    /// Dropped silently when the channel has been detached or the engine
    /// inbox is gone.
    pub fn dispatch(&self, envelope: EventEnvelope) {
        if !self.alive.load(Ordering::SeqCst) {
            counter!("briefwatch_events_dropped_total", "cause" => "detached").increment(1);
            debug!(event = envelope.event.name(), "event after detach dropped");
            return;
        }
        counter!("briefwatch_events_received_total", "event" => envelope.event.name())
            .increment(1);
        if self.tx.send(envelope).is_err() {
            debug!("engine inbox closed; event dropped");
        }
    }

    /// Normalizes one raw JSONL line and forwards it.
    ///
    /// Malformed lines are logged at debug level and dropped — a noisy
    /// runner must never take the session down.
    pub fn dispatch_line(&self, line: &str) {
        if line.trim().is_empty() {
            return;
        }
        match parse_line(line) {
            Ok(envelope) => self.dispatch(envelope),
            Err(e) => {
                counter!("briefwatch_events_dropped_total", "cause" => "malformed").increment(1);
                debug!(error = %e, "malformed event line dropped");
            }
        }
    }

    /// Detaches the adapter. Safe to call any number of times, from any
    /// clone; all subsequent dispatches are dropped.
    pub fn detach(&self) {
        if !self.alive.swap(false, Ordering::SeqCst) {
            return;
        }
        debug!("event channel detached");
    }

    /// Returns whether the adapter still forwards events.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}
