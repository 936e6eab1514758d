//! Progress engine task.
//!
//! One tokio task owns the progress record, the timer set, and the event
//! inbox. Every mutation — inbound events and all three watchdog expiries —
//! is serialized through its `select!` loop, which is what makes the
//! record safe to share with any number of readers through a watch
//! channel without further locking.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::WatchdogConfig;
use crate::observability::metrics;
use crate::observability::runlog::{LogEvent, RunLog};
use crate::progress::record::{Phase, ProgressRecord};
use crate::progress::reducer::{Reduced, ReducerNote, TimerDirective, reduce};
use crate::progress::timers::TimerSet;
use crate::runner::{EventChannel, EventEnvelope, ResearchRunner, RunnerEvent};

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Handle to a running progress engine.
///
/// Owns the session's lifecycle: events flow in through
/// [`channel`](Self::channel), consumers read through
/// [`subscribe`](Self::subscribe), and [`shutdown`](Self::shutdown) tears
/// everything down — synchronously detaching the event channel so late
/// events are dropped, and cancelling the engine task so no timer can
/// fire afterwards.
#[derive(Debug)]
pub struct ProgressHandle {
    channel: EventChannel,
    record_rx: watch::Receiver<ProgressRecord>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ProgressHandle {
    /// Returns the liveness-gated event channel feeding this engine.
    #[must_use]
    pub fn channel(&self) -> EventChannel {
        self.channel.clone()
    }

    /// Returns a new subscription to progress record changes.
    ///
    /// Receivers observe every published record and must never mutate it —
    /// the engine task is the single writer.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ProgressRecord> {
        self.record_rx.clone()
    }

    /// Returns a clone of the current record.
    #[must_use]
    pub fn snapshot(&self) -> ProgressRecord {
        self.record_rx.borrow().clone()
    }

    /// Tears the session down.
    ///
    /// Safe to call more than once. Events already in flight toward the
    /// detached channel are dropped, not errors.
    pub fn shutdown(&self) {
        self.channel.detach();
        self.cancel.cancel();
    }

    /// Waits for the engine task to finish. Call after
    /// [`shutdown`](Self::shutdown).
    pub async fn join(self) {
        let _ = self.task.await;
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// The engine task's owned state.
pub struct ProgressEngine {
    runner: Arc<dyn ResearchRunner>,
    config: WatchdogConfig,
    timers: TimerSet,
    record_tx: watch::Sender<ProgressRecord>,
    events: mpsc::UnboundedReceiver<EventEnvelope>,
    cancel: CancellationToken,
    runlog: Arc<RunLog>,
    run_id: Uuid,
}

impl std::fmt::Debug for ProgressEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressEngine")
            .field("run_id", &self.run_id)
            .field("timers", &self.timers)
            .finish_non_exhaustive()
    }
}

/// What woke the engine loop.
enum Wake {
    Event(EventEnvelope),
    InboxClosed,
    PhaseDeadline,
    RunDeadline,
    InactivityPoll,
    Shutdown,
}

impl ProgressEngine {
    /// Spawns the engine task and returns its handle.
    ///
    /// The record starts at the idle default and is replaced wholesale on
    /// each `started` event; nothing carries over between runs.
    #[must_use]
    pub fn spawn(
        runner: Arc<dyn ResearchRunner>,
        config: WatchdogConfig,
        runlog: Arc<RunLog>,
    ) -> ProgressHandle {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Self::spawn_with_inbox(runner, config, runlog, EventChannel::new(event_tx), event_rx)
    }

    /// Like [`spawn`](Self::spawn), but over a caller-built channel/inbox
    /// pair — for wirings where the event source (e.g. a runner process)
    /// must exist before the engine does.
    #[must_use]
    pub fn spawn_with_inbox(
        runner: Arc<dyn ResearchRunner>,
        config: WatchdogConfig,
        runlog: Arc<RunLog>,
        channel: EventChannel,
        events: mpsc::UnboundedReceiver<EventEnvelope>,
    ) -> ProgressHandle {
        let (record_tx, record_rx) = watch::channel(ProgressRecord::idle());
        let cancel = CancellationToken::new();

        let engine = Self {
            runner,
            config,
            timers: TimerSet::new(Instant::now()),
            record_tx,
            events,
            cancel: cancel.clone(),
            runlog,
            run_id: Uuid::nil(),
        };

        let task = tokio::spawn(engine.run());

        ProgressHandle {
            channel,
            record_rx,
            cancel,
            task,
        }
    }

    /// Main loop: waits on the event inbox and whichever timer slots are
    /// armed, acting on exactly one wake-up at a time.
    async fn run(mut self) {
        let cancel = self.cancel.clone();
        let mut poll = tokio::time::interval(self.config.inactivity_poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let timers = self.timers;
            let wake = tokio::select! {
                () = cancel.cancelled() => Wake::Shutdown,
                maybe = self.events.recv() => maybe.map_or(Wake::InboxClosed, Wake::Event),
                () = deadline_sleep(timers.phase_deadline()),
                    if timers.phase_deadline().is_some() => Wake::PhaseDeadline,
                () = deadline_sleep(timers.run_deadline()),
                    if timers.run_deadline().is_some() => Wake::RunDeadline,
                _ = poll.tick(), if timers.watchdog_armed() => Wake::InactivityPoll,
            };

            match wake {
                Wake::Event(envelope) => self.on_event(&envelope),
                Wake::PhaseDeadline => {
                    let phase = self.record_tx.borrow().current_phase;
                    self.force_terminate(format!("{phase} phase timed out"), "phase");
                }
                Wake::RunDeadline => {
                    self.force_terminate("exceeded maximum run time".to_string(), "run");
                }
                Wake::InactivityPoll => self.check_inactivity(),
                Wake::Shutdown => {
                    debug!("engine shut down");
                    break;
                }
                Wake::InboxClosed => {
                    debug!("event inbox closed; engine stopping");
                    break;
                }
            }
        }

        // No timer may outlive the session.
        self.timers.clear_all();
    }

    /// Applies one inbound event.
    fn on_event(&mut self, envelope: &EventEnvelope) {
        let now = Instant::now();
        // Any event at all proves the runner is alive.
        self.timers.touch(now);

        let current = self.record_tx.borrow().clone();
        let reduced = reduce(&current, &envelope.event);

        if let Some(note) = &reduced.note {
            log_note(note, &envelope.event);
            return;
        }

        match reduced.timers {
            TimerDirective::ArmRun => {
                self.run_id = Uuid::new_v4();
                self.timers.arm_run(now, &self.config);
                self.timers
                    .rearm_phase(now, reduced.record.current_phase, &self.config);
            }
            TimerDirective::RearmPhase => {
                self.timers
                    .rearm_phase(now, reduced.record.current_phase, &self.config);
            }
            TimerDirective::CancelAll => self.timers.clear_all(),
            TimerDirective::Keep => {}
        }

        if reduced.record == current {
            // Heartbeats land here: watermark refreshed, record untouched.
            debug!(event = envelope.event.name(), "no record change");
            return;
        }

        self.publish(&current, reduced, &envelope.event);
    }

    /// Publishes the next record and emits observability for the change.
    fn publish(&mut self, previous: &ProgressRecord, reduced: Reduced, event: &RunnerEvent) {
        let next = reduced.record;

        match event {
            RunnerEvent::Started { total_topics } => {
                info!(total_topics, run_id = %self.run_id, "run started");
                self.runlog.emit(LogEvent::RunStarted {
                    timestamp: Utc::now(),
                    run_id: self.run_id,
                    total_topics: *total_topics,
                });
            }
            RunnerEvent::TopicCompleted {
                topic_name,
                cards_generated,
                ..
            } => {
                info!(topic = %topic_name, cards = cards_generated, "topic completed");
                self.runlog.emit(LogEvent::TopicCompleted {
                    timestamp: Utc::now(),
                    run_id: self.run_id,
                    topic_name: topic_name.clone(),
                    cards_generated: *cards_generated,
                });
            }
            _ => {}
        }

        if next.current_phase != previous.current_phase {
            info!(
                from = %previous.current_phase,
                to = %next.current_phase,
                event = event.name(),
                "phase transition"
            );
            metrics::set_current_phase(next.current_phase);
            self.runlog.emit(LogEvent::PhaseChanged {
                timestamp: Utc::now(),
                run_id: self.run_id,
                phase: next.current_phase,
                cause: event.name().to_string(),
            });
        }

        if event.is_terminal() && previous.is_running {
            let outcome = run_outcome(event);
            metrics::record_run_ended(outcome);
            self.runlog.emit(LogEvent::RunEnded {
                timestamp: Utc::now(),
                run_id: self.run_id,
                success: next.error.is_none(),
                error: next.error.clone(),
                total_cards: next.total_cards,
            });
            info!(outcome, error = ?next.error, "run ended");
        }

        self.record_tx.send_replace(next);
    }

    /// Fires the inactivity watchdog if the runner has gone silent.
    fn check_inactivity(&mut self) {
        let idle = self.timers.idle_for(Instant::now());
        if idle >= self.config.inactivity_threshold {
            let reason = format!(
                "no activity for {}",
                humantime::format_duration(self.config.inactivity_threshold)
            );
            self.force_terminate(reason, "inactivity");
        }
    }

    /// The shared timeout handler: cancels every mechanism, asks the
    /// runner to stop (best effort), and forces the record terminal.
    fn force_terminate(&mut self, reason: String, mechanism: &'static str) {
        // First, so no mechanism can fire twice.
        self.timers.clear_all();

        metrics::record_timeout(mechanism);
        warn!(%reason, mechanism, "watchdog fired; terminating run");
        self.runlog.emit(LogEvent::WatchdogFired {
            timestamp: Utc::now(),
            run_id: self.run_id,
            reason: reason.clone(),
        });

        // Best effort: a runner that refuses to die still gets a terminal
        // record locally. The spawned task only logs, so a session torn
        // down mid-request never acts on the resolution.
        let runner = Arc::clone(&self.runner);
        tokio::spawn(async move {
            match runner.request_cancel().await {
                Ok(outcome) => debug!(?outcome, "watchdog cancel delivered"),
                Err(e) => warn!(error = %e, "watchdog cancel failed"),
            }
        });

        let mut record = self.record_tx.borrow().clone();
        let was_running = record.is_running;
        record.is_running = false;
        record.current_phase = Phase::Complete;
        record.error = Some(reason);

        if was_running {
            metrics::record_run_ended("timeout");
            self.runlog.emit(LogEvent::RunEnded {
                timestamp: Utc::now(),
                run_id: self.run_id,
                success: false,
                error: record.error.clone(),
                total_cards: record.total_cards,
            });
        }
        metrics::set_current_phase(Phase::Complete);
        self.record_tx.send_replace(record);
    }
}

/// Sleeps until `deadline`, or forever when the slot is unarmed.
///
/// Unarmed slots are also disabled by their select preconditions; the
/// pending future is belt-and-braces.
async fn deadline_sleep(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Logs a degenerate event at the level its kind deserves.
fn log_note(note: &ReducerNote, event: &RunnerEvent) {
    match note {
        ReducerNote::DuplicateTopic(topic) => {
            metrics::record_event_dropped("duplicate");
            warn!(topic = %topic, "duplicate topic_completed dropped");
        }
        ReducerNote::TopicOverflow(topic) => {
            metrics::record_event_dropped("overflow");
            warn!(topic = %topic, "topic_completed beyond announced total dropped");
        }
        ReducerNote::Stale => {
            metrics::record_event_dropped("stale");
            debug!(event = event.name(), "event for idle run ignored");
        }
        ReducerNote::LateTerminal => {
            metrics::record_event_dropped("late_terminal");
            debug!(
                event = event.name(),
                "terminal event after run already ended ignored"
            );
        }
    }
}

/// Maps a terminal event to its run-outcome metric label.
const fn run_outcome(event: &RunnerEvent) -> &'static str {
    match event {
        RunnerEvent::Completed { success: true, .. } => "completed",
        RunnerEvent::Completed { success: false, .. } => "failed",
        RunnerEvent::Cancelled { .. } => "cancelled",
        RunnerEvent::Reset { .. } => "reset",
        _ => "mode_error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RunnerError;
    use crate::runner::{CancelOutcome, RunnerStatus};
    use async_trait::async_trait;

    /// Runner stub for engine construction tests.
    #[derive(Debug, Default)]
    struct InertRunner;

    #[async_trait]
    impl ResearchRunner for InertRunner {
        async fn request_cancel(&self) -> Result<CancelOutcome, RunnerError> {
            Ok(CancelOutcome::Requested)
        }

        async fn request_reset(&self) -> Result<(), RunnerError> {
            Ok(())
        }

        async fn query_status(&self) -> Result<RunnerStatus, RunnerError> {
            Err(RunnerError::Detached("stub".to_string()))
        }
    }

    fn spawn_engine() -> ProgressHandle {
        ProgressEngine::spawn(
            Arc::new(InertRunner),
            WatchdogConfig::default(),
            Arc::new(RunLog::noop()),
        )
    }

    #[tokio::test]
    async fn test_initial_snapshot_is_idle() {
        let handle = spawn_engine();
        assert_eq!(handle.snapshot(), ProgressRecord::idle());
        handle.shutdown();
        handle.join().await;
    }

    #[tokio::test]
    async fn test_started_event_flows_to_subscribers() {
        let handle = spawn_engine();
        let mut rx = handle.subscribe();

        handle
            .channel()
            .dispatch(EventEnvelope::now(RunnerEvent::Started { total_topics: 2 }));

        rx.changed().await.unwrap();
        let record = rx.borrow().clone();
        assert!(record.is_running);
        assert_eq!(record.current_phase, Phase::Starting);
        assert_eq!(record.total_topics, 2);

        handle.shutdown();
        handle.join().await;
    }

    #[tokio::test]
    async fn test_shutdown_stops_task_and_detaches_channel() {
        let handle = spawn_engine();
        let channel = handle.channel();

        handle.shutdown();
        // Second shutdown is a no-op, not a panic.
        handle.shutdown();
        assert!(!channel.is_attached());
        handle.join().await;
    }
}
