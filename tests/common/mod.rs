//! Shared integration-test harness: a recording fake runner and helpers
//! for driving the progress engine under a paused tokio clock.

#![allow(dead_code)]

use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use briefwatch::error::RunnerError;
use briefwatch::progress::ProgressRecord;
use briefwatch::runner::{CancelOutcome, ResearchRunner, RunnerStatus};

/// Generous ceiling for `wait_for` — under a paused clock the runtime
/// auto-advances to the next armed timer, so this only trips when the
/// awaited condition genuinely never comes true.
pub const WAIT_CEILING: Duration = Duration::from_secs(7200);

/// Recording fake for the external job runner.
#[derive(Debug)]
pub struct FakeRunner {
    cancels: AtomicU32,
    resets: AtomicU32,
    status_queries: AtomicU32,
    status: StdMutex<RunnerStatus>,
}

impl Default for FakeRunner {
    fn default() -> Self {
        Self {
            cancels: AtomicU32::new(0),
            resets: AtomicU32::new(0),
            status_queries: AtomicU32::new(0),
            status: StdMutex::new(RunnerStatus {
                is_running: false,
                current_phase: "idle".to_string(),
                started_at: None,
                is_cancelled: false,
            }),
        }
    }
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel_calls(&self) -> u32 {
        self.cancels.load(Ordering::SeqCst)
    }

    pub fn reset_calls(&self) -> u32 {
        self.resets.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> u32 {
        self.status_queries.load(Ordering::SeqCst)
    }

    pub fn set_status(&self, status: RunnerStatus) {
        *self.status.lock().unwrap() = status;
    }
}

#[async_trait]
impl ResearchRunner for FakeRunner {
    async fn request_cancel(&self) -> Result<CancelOutcome, RunnerError> {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        Ok(CancelOutcome::Requested)
    }

    async fn request_reset(&self) -> Result<(), RunnerError> {
        self.resets.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn query_status(&self) -> Result<RunnerStatus, RunnerError> {
        self.status_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.status.lock().unwrap().clone())
    }
}

/// Waits until the record satisfies `predicate`, returning a clone of it.
///
/// Panics when the ceiling elapses first.
pub async fn wait_for_record(
    rx: &mut watch::Receiver<ProgressRecord>,
    predicate: impl FnMut(&ProgressRecord) -> bool,
) -> ProgressRecord {
    let record = tokio::time::timeout(WAIT_CEILING, rx.wait_for(predicate))
        .await
        .expect("record never reached the expected state")
        .expect("engine dropped the record channel");
    record.clone()
}

/// Lets spawned tasks (the engine loop, best-effort cancel tasks) run to
/// quiescence without advancing the clock.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
