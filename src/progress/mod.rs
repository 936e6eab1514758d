//! Progress tracking and watchdog supervision.
//!
//! Implements the session lifecycle for one long-running research run:
//! merge an at-least-once event stream into a single consumer-readable
//! record, keep three independent timeout mechanisms armed against silent
//! stalls, and reconcile caller-initiated cancellation with the terminal
//! events that eventually arrive.
//!
//! # Architecture
//!
//! - [`ProgressRecord`] / [`Phase`] — the one shared artifact, single
//!   writer, many watch-channel readers
//! - [`reducer`] — pure `(record, event) → record` transition function
//! - [`TimerSet`] — three named timer slots, no handles in closures
//! - [`ProgressEngine`] — the task serializing events and expiries
//! - [`CancelController`] — idempotent cancel / reset / status front-end

pub mod controller;
pub mod engine;
pub mod record;
pub mod reducer;
pub mod timers;

pub use controller::CancelController;
pub use engine::{ProgressEngine, ProgressHandle};
pub use record::{CompletedTopic, Phase, ProgressRecord};
pub use reducer::{Reduced, ReducerNote, TimerDirective, reduce};
pub use timers::TimerSet;
