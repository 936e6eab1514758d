//! Cancellation and reset controller.
//!
//! Caller-facing operations against the external runner. Cancellation is
//! advisory and asynchronous: none of these calls mutates the progress
//! record — the record only moves when the resulting `cancelled` or
//! `reset` event arrives on the stream (or a watchdog gives up waiting).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::RunnerError;
use crate::runner::{CancelOutcome, ResearchRunner, RunnerStatus};

/// Idempotent cancel/reset front-end over a [`ResearchRunner`].
///
/// A pending-cancellation guard absorbs rapid repeated requests: while it
/// is set, further cancels return `false` without touching the runner.
/// The guard auto-clears after a fixed cool-down regardless of how the
/// request turned out.
#[derive(Clone)]
pub struct CancelController {
    runner: Arc<dyn ResearchRunner>,
    pending: Arc<AtomicBool>,
    cooldown: Duration,
}

impl std::fmt::Debug for CancelController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelController")
            .field("pending", &self.pending.load(Ordering::SeqCst))
            .field("cooldown", &self.cooldown)
            .finish_non_exhaustive()
    }
}

impl CancelController {
    /// Creates a controller over the given runner.
    #[must_use]
    pub fn new(runner: Arc<dyn ResearchRunner>, cooldown: Duration) -> Self {
        Self {
            runner,
            pending: Arc::new(AtomicBool::new(false)),
            cooldown,
        }
    }

    /// Requests cancellation of the in-flight run.
    ///
    /// Returns `false` immediately when a cancellation is already pending;
    /// otherwise issues exactly one request and returns `true`. A runner
    /// answering "nothing is running" counts as success. Request failures
    /// are logged and swallowed — the watchdog remains the backstop for a
    /// runner that will not die.
    pub async fn cancel_research(&self) -> bool {
        if self.pending.swap(true, Ordering::SeqCst) {
            debug!("cancellation already pending; request ignored");
            return false;
        }

        // The guard clears after the cool-down regardless of outcome.
        let pending = Arc::clone(&self.pending);
        let cooldown = self.cooldown;
        tokio::spawn(async move {
            tokio::time::sleep(cooldown).await;
            pending.store(false, Ordering::SeqCst);
        });

        match self.runner.request_cancel().await {
            Ok(CancelOutcome::Requested) => info!("cancellation requested"),
            Ok(CancelOutcome::AlreadyIdle) => {
                debug!("nothing running; cancellation treated as success");
            }
            Err(e) => warn!(error = %e, "cancellation request failed"),
        }
        true
    }

    /// Requests a hard reset of the runner.
    ///
    /// The local record is not touched here — the runner is expected to
    /// answer with a `reset` event on the stream.
    ///
    /// # Errors
    ///
    /// Returns a `RunnerError` if the command cannot be delivered.
    pub async fn reset_research(&self) -> Result<(), RunnerError> {
        info!("reset requested");
        self.runner.request_reset().await
    }

    /// Cancels, then resets, tolerating either failing. Recovery hammer
    /// for a wedged session.
    pub async fn cancel_and_reset(&self) {
        if !self.cancel_research().await {
            debug!("cancel skipped; cancellation already pending");
        }
        if let Err(e) = self.reset_research().await {
            warn!(error = %e, "reset request failed");
        }
    }

    /// Polls the runner's authoritative status, independent of the event
    /// stream. Used to reconcile after a consumer reattaches.
    ///
    /// # Errors
    ///
    /// Returns a `RunnerError` if the query cannot be delivered or times
    /// out.
    pub async fn research_status(&self) -> Result<RunnerStatus, RunnerError> {
        self.runner.query_status().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicU32;

    #[derive(Debug, Default)]
    struct CountingRunner {
        cancels: AtomicU32,
        resets: AtomicU32,
        fail_cancel: bool,
        fail_reset: bool,
    }

    #[async_trait]
    impl ResearchRunner for CountingRunner {
        async fn request_cancel(&self) -> Result<CancelOutcome, RunnerError> {
            self.cancels.fetch_add(1, Ordering::SeqCst);
            if self.fail_cancel {
                Err(RunnerError::ChannelClosed("gone".to_string()))
            } else {
                Ok(CancelOutcome::Requested)
            }
        }

        async fn request_reset(&self) -> Result<(), RunnerError> {
            self.resets.fetch_add(1, Ordering::SeqCst);
            if self.fail_reset {
                Err(RunnerError::ChannelClosed("gone".to_string()))
            } else {
                Ok(())
            }
        }

        async fn query_status(&self) -> Result<RunnerStatus, RunnerError> {
            Ok(RunnerStatus {
                is_running: true,
                current_phase: "researching".to_string(),
                started_at: None,
                is_cancelled: false,
            })
        }
    }

    fn controller(runner: Arc<CountingRunner>) -> CancelController {
        CancelController::new(runner, Duration::from_secs(3))
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_cancels_issue_one_request() {
        let runner = Arc::new(CountingRunner::default());
        let ctl = controller(Arc::clone(&runner));

        assert!(ctl.cancel_research().await);
        assert!(!ctl.cancel_research().await);
        assert!(!ctl.cancel_research().await);

        assert_eq!(runner.cancels.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_guard_clears_after_cooldown() {
        let runner = Arc::new(CountingRunner::default());
        let ctl = controller(Arc::clone(&runner));

        assert!(ctl.cancel_research().await);
        tokio::time::sleep(Duration::from_millis(3100)).await;
        assert!(ctl.cancel_research().await);

        assert_eq!(runner.cancels.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_guard_clears_even_when_request_fails() {
        let runner = Arc::new(CountingRunner {
            fail_cancel: true,
            ..CountingRunner::default()
        });
        let ctl = controller(Arc::clone(&runner));

        // Failure is swallowed; the call still counts as issued.
        assert!(ctl.cancel_research().await);
        tokio::time::sleep(Duration::from_millis(3100)).await;
        assert!(ctl.cancel_research().await);
        assert_eq!(runner.cancels.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_and_reset_tolerates_failures() {
        let runner = Arc::new(CountingRunner {
            fail_cancel: true,
            fail_reset: true,
            ..CountingRunner::default()
        });
        let ctl = controller(Arc::clone(&runner));

        ctl.cancel_and_reset().await;
        assert_eq!(runner.cancels.load(Ordering::SeqCst), 1);
        assert_eq!(runner.resets.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_status_passthrough() {
        let runner = Arc::new(CountingRunner::default());
        let ctl = controller(runner);

        let status = ctl.research_status().await.unwrap();
        assert!(status.is_running);
        assert_eq!(status.current_phase, "researching");
    }
}
