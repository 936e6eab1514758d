//! `briefwatch` — progress tracking and watchdog supervision for
//! long-running research runs.
//!
//! An external runner process performs multi-phase research work and
//! reports progress as an at-least-once JSONL event stream. This crate
//! merges that stream into a single consistent [`ProgressRecord`], keeps
//! three independent timeout mechanisms armed so a run can never appear
//! stuck forever, and reconciles caller-initiated cancellation with the
//! terminal events that eventually arrive.
//!
//! [`ProgressRecord`]: progress::ProgressRecord

pub mod cli;
pub mod config;
pub mod error;
pub mod observability;
pub mod progress;
pub mod runner;
