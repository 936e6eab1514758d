//! External job runner boundary.
//!
//! The runner is an opaque process that does the actual research work and
//! reports progress as a JSONL event stream. This module owns both sides
//! of that boundary:
//!
//! - [`RunnerEvent`] / [`EventEnvelope`] — typed inbound events
//! - [`EventChannel`] — liveness-gated adapter feeding the engine
//! - [`ResearchRunner`] — outbound command trait (cancel / reset / status)
//! - [`ProcessRunner`] — child-process implementation of both

pub mod channel;
pub mod event;
pub mod process;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::RunnerError;

pub use channel::EventChannel;
pub use event::{EventEnvelope, RunnerEvent, parse_line};
pub use process::ProcessRunner;

// ---------------------------------------------------------------------------
// Outbound command surface
// ---------------------------------------------------------------------------

/// Outcome of a cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The runner accepted the request and will wind the run down.
    Requested,
    /// Nothing was running. Treated as success by callers.
    AlreadyIdle,
}

/// The runner's authoritative view of its own state.
///
/// Queried out-of-band for reconciliation after a consumer reattaches —
/// the event stream alone cannot tell a fresh session whether a run is
/// already in flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerStatus {
    /// Whether a run is in flight.
    #[serde(default)]
    pub is_running: bool,
    /// Runner-side phase name.
    #[serde(default)]
    pub current_phase: String,
    /// When the in-flight run started, if any.
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// Whether a cancellation has been requested but not yet honored.
    #[serde(default)]
    pub is_cancelled: bool,
}

/// Commands issued to the external job runner.
///
/// All three are asynchronous and advisory: none of them mutates the local
/// progress record. State only changes when the corresponding event
/// (`cancelled`, `reset`) arrives on the stream.
#[async_trait]
pub trait ResearchRunner: Send + Sync {
    /// Requests cancellation of the in-flight run.
    ///
    /// # Errors
    ///
    /// Returns a `RunnerError` if the command cannot be delivered.
    async fn request_cancel(&self) -> Result<CancelOutcome, RunnerError>;

    /// Requests a hard reset of the runner.
    ///
    /// # Errors
    ///
    /// Returns a `RunnerError` if the command cannot be delivered.
    async fn request_reset(&self) -> Result<(), RunnerError>;

    /// Polls the runner's authoritative status.
    ///
    /// # Errors
    ///
    /// Returns a `RunnerError` if the command cannot be delivered or the
    /// runner does not answer in time.
    async fn query_status(&self) -> Result<RunnerStatus, RunnerError>;
}

// ---------------------------------------------------------------------------
// Detached runner
// ---------------------------------------------------------------------------

/// Runner handle for sessions fed by a pre-recorded or piped event stream.
///
/// Commands have nowhere to go: cancel reports the run as already idle,
/// reset succeeds as a no-op, and status queries fail with
/// [`RunnerError::Detached`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRunner;

#[async_trait]
impl ResearchRunner for NullRunner {
    async fn request_cancel(&self) -> Result<CancelOutcome, RunnerError> {
        debug!("cancel requested with no runner attached");
        Ok(CancelOutcome::AlreadyIdle)
    }

    async fn request_reset(&self) -> Result<(), RunnerError> {
        debug!("reset requested with no runner attached");
        Ok(())
    }

    async fn query_status(&self) -> Result<RunnerStatus, RunnerError> {
        Err(RunnerError::Detached(
            "status queries need a live runner".to_string(),
        ))
    }
}
