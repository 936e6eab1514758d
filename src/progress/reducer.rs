//! Pure transition function for the progress state machine.
//!
//! `reduce` maps `(record, event)` to the next record plus a timer
//! directive for the supervisor. It performs no I/O, reads no clock, and
//! is idempotent for known-duplicate event shapes, so every dedup and
//! ordering rule is unit-testable without timers or a runtime.
//!
//! The stream is at-least-once and unordered at the edges: duplicates and
//! stale events come out as [`ReducerNote`]s for the engine to log, never
//! as errors.

use crate::progress::record::{CompletedTopic, Phase, ProgressRecord};
use crate::runner::RunnerEvent;

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

/// What the supervisor should do with its timers after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerDirective {
    /// A new run began: arm the overall deadline, the first phase
    /// deadline, and the inactivity watchdog.
    ArmRun,
    /// The phase changed (or a new topic started): re-arm the per-phase
    /// deadline for the record's current phase.
    RearmPhase,
    /// The run ended: cancel all three mechanisms.
    CancelAll,
    /// Leave every timer exactly as it is.
    Keep,
}

/// Why an event changed nothing (or less than its payload suggests).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReducerNote {
    /// `topic_completed` for a topic already recorded this run.
    DuplicateTopic(String),
    /// `topic_completed` beyond the run's announced topic count.
    TopicOverflow(String),
    /// Non-terminal event for a run that is not in flight.
    Stale,
    /// Terminal event for a run that already reached its terminal state.
    LateTerminal,
}

/// Result of reducing one event.
#[derive(Debug, Clone)]
pub struct Reduced {
    /// The next progress record.
    pub record: ProgressRecord,
    /// Timer directive for the supervisor.
    pub timers: TimerDirective,
    /// Diagnostic note for the engine's log, if the event was degenerate.
    pub note: Option<ReducerNote>,
}

impl Reduced {
    fn changed(record: ProgressRecord, timers: TimerDirective) -> Self {
        Self {
            record,
            timers,
            note: None,
        }
    }

    fn unchanged(current: &ProgressRecord, note: Option<ReducerNote>) -> Self {
        Self {
            record: current.clone(),
            timers: TimerDirective::Keep,
            note,
        }
    }
}

// ---------------------------------------------------------------------------
// Reducer
// ---------------------------------------------------------------------------

/// Computes the next progress record for one inbound event.
///
/// Invariants upheld for every input sequence:
/// - `is_running` implies `current_phase != Complete`
/// - `topics_completed` never exceeds `total_topics` and holds no
///   duplicate names within one run
/// - a `started` event always yields a fresh record
/// - once a run is terminal, late terminal events cannot re-terminate it
#[must_use]
pub fn reduce(current: &ProgressRecord, event: &RunnerEvent) -> Reduced {
    match event {
        RunnerEvent::Started { total_topics } => Reduced::changed(
            ProgressRecord::fresh(*total_topics),
            TimerDirective::ArmRun,
        ),

        RunnerEvent::Reset { .. } => {
            Reduced::changed(ProgressRecord::idle(), TimerDirective::CancelAll)
        }

        RunnerEvent::TopicStarted {
            topic_index,
            topic_name,
        } => {
            if !current.is_running {
                return Reduced::unchanged(current, Some(ReducerNote::Stale));
            }
            let mut next = current.clone();
            next.current_phase = Phase::Researching;
            next.current_topic_index = i32::try_from(*topic_index).unwrap_or(i32::MAX);
            next.current_topic_name.clone_from(topic_name);
            Reduced::changed(next, TimerDirective::RearmPhase)
        }

        RunnerEvent::TopicCompleted {
            topic_name,
            cards_generated,
            tools_used,
        } => {
            if !current.is_running {
                return Reduced::unchanged(current, Some(ReducerNote::Stale));
            }
            if current.has_topic(topic_name) {
                return Reduced::unchanged(
                    current,
                    Some(ReducerNote::DuplicateTopic(topic_name.clone())),
                );
            }
            if current.topics_completed.len() >= current.total_topics as usize {
                return Reduced::unchanged(
                    current,
                    Some(ReducerNote::TopicOverflow(topic_name.clone())),
                );
            }
            let mut next = current.clone();
            next.topics_completed.push(CompletedTopic {
                topic_name: topic_name.clone(),
                cards_generated: *cards_generated,
                tools_used: *tools_used,
            });
            Reduced::changed(next, TimerDirective::Keep)
        }

        RunnerEvent::SynthesisStarted => {
            if !current.is_running {
                return Reduced::unchanged(current, Some(ReducerNote::Stale));
            }
            let mut next = current.clone();
            next.current_phase = Phase::Synthesizing;
            Reduced::changed(next, TimerDirective::RearmPhase)
        }

        RunnerEvent::SynthesisCompleted {
            cards_generated, ..
        } => {
            if !current.is_running {
                return Reduced::unchanged(current, Some(ReducerNote::Stale));
            }
            // Phase stays Synthesizing until saving begins.
            let mut next = current.clone();
            next.total_cards = *cards_generated;
            Reduced::changed(next, TimerDirective::Keep)
        }

        RunnerEvent::Saving { total_cards } => {
            if !current.is_running {
                return Reduced::unchanged(current, Some(ReducerNote::Stale));
            }
            let mut next = current.clone();
            next.current_phase = Phase::Saving;
            next.total_cards = *total_cards;
            Reduced::changed(next, TimerDirective::RearmPhase)
        }

        RunnerEvent::GeneratingImages { total_cards } => {
            if !current.is_running {
                return Reduced::unchanged(current, Some(ReducerNote::Stale));
            }
            let mut next = current.clone();
            next.current_phase = Phase::GeneratingImages;
            next.total_cards = *total_cards;
            Reduced::changed(next, TimerDirective::RearmPhase)
        }

        RunnerEvent::DeepExtraction { .. } => {
            if !current.is_running {
                return Reduced::unchanged(current, Some(ReducerNote::Stale));
            }
            // Informational: the Researching deadline keeps running.
            let mut next = current.clone();
            next.current_phase = Phase::DeepExtraction;
            Reduced::changed(next, TimerDirective::Keep)
        }

        RunnerEvent::Heartbeat { .. } => {
            // Watermark refresh happens in the engine for every event;
            // the record itself does not move.
            let note = (!current.is_running).then_some(ReducerNote::Stale);
            Reduced::unchanged(current, note)
        }

        RunnerEvent::Completed {
            total_cards,
            success,
            error,
            ..
        } => {
            if current.is_terminal() {
                return Reduced::unchanged(current, Some(ReducerNote::LateTerminal));
            }
            let mut next = current.clone();
            next.is_running = false;
            next.current_phase = Phase::Complete;
            next.total_cards = *total_cards;
            next.error = if *success {
                error.clone()
            } else {
                error
                    .clone()
                    .or_else(|| Some("run failed without detail".to_string()))
            };
            Reduced::changed(next, TimerDirective::CancelAll)
        }

        RunnerEvent::Cancelled { reason } => {
            if current.is_terminal() {
                return Reduced::unchanged(current, Some(ReducerNote::LateTerminal));
            }
            let mut next = current.clone();
            next.is_running = false;
            next.current_phase = Phase::Complete;
            next.error = Some(format!("Research cancelled: {reason}"));
            Reduced::changed(next, TimerDirective::CancelAll)
        }

        RunnerEvent::ModeError { mode, error } => {
            if current.is_terminal() {
                return Reduced::unchanged(current, Some(ReducerNote::LateTerminal));
            }
            let mut next = current.clone();
            next.is_running = false;
            next.current_phase = Phase::Complete;
            next.error = if mode.is_empty() {
                Some(error.clone())
            } else {
                Some(format!("{error} (mode: {mode})"))
            };
            Reduced::changed(next, TimerDirective::CancelAll)
        }
    }
}
