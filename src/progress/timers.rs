//! Explicit timer slots for the timeout supervisor.
//!
//! Three named mechanisms, mutually independent: a single-shot per-phase
//! deadline, a single-shot whole-run deadline, and the inactivity
//! watchdog's last-event watermark. Keeping them in one value (instead of
//! scattering timer handles across closures) makes "cancel everything"
//! a single call and double-fires structurally impossible: the engine's
//! select loop only sleeps on slots that are `Some`.

use std::time::Duration;

use tokio::time::Instant;

use crate::config::WatchdogConfig;
use crate::progress::record::Phase;

/// The supervisor's three timer slots.
#[derive(Debug, Clone, Copy)]
pub struct TimerSet {
    phase_deadline: Option<Instant>,
    run_deadline: Option<Instant>,
    last_event_at: Instant,
    watchdog_armed: bool,
}

impl TimerSet {
    /// Creates an inert timer set with the watermark at `now`.
    #[must_use]
    pub const fn new(now: Instant) -> Self {
        Self {
            phase_deadline: None,
            run_deadline: None,
            last_event_at: now,
            watchdog_armed: false,
        }
    }

    /// Arms the run for a fresh start: overall deadline from `now`,
    /// inactivity watchdog on, watermark refreshed. The overall deadline
    /// is never re-armed mid-run — only a new `started` lands here.
    pub fn arm_run(&mut self, now: Instant, config: &WatchdogConfig) {
        self.run_deadline = Some(now + config.run_deadline);
        self.watchdog_armed = true;
        self.last_event_at = now;
    }

    /// Re-arms the per-phase deadline for `phase`.
    ///
    /// Phases without a deadline of their own clear the slot.
    pub fn rearm_phase(&mut self, now: Instant, phase: Phase, config: &WatchdogConfig) {
        self.phase_deadline = config.deadline_for(phase).map(|d| now + d);
    }

    /// Cancels all three mechanisms. Idempotent.
    pub const fn clear_all(&mut self) {
        self.phase_deadline = None;
        self.run_deadline = None;
        self.watchdog_armed = false;
    }

    /// Refreshes the inactivity watermark.
    pub const fn touch(&mut self, now: Instant) {
        self.last_event_at = now;
    }

    /// Current per-phase deadline, if armed.
    #[must_use]
    pub const fn phase_deadline(&self) -> Option<Instant> {
        self.phase_deadline
    }

    /// Current overall deadline, if armed.
    #[must_use]
    pub const fn run_deadline(&self) -> Option<Instant> {
        self.run_deadline
    }

    /// Whether the inactivity watchdog is armed.
    #[must_use]
    pub const fn watchdog_armed(&self) -> bool {
        self.watchdog_armed
    }

    /// Gap between `now` and the last observed event.
    #[must_use]
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_event_at)
    }

    /// Whether every mechanism is cancelled.
    #[must_use]
    pub const fn is_inert(&self) -> bool {
        self.phase_deadline.is_none() && self.run_deadline.is_none() && !self.watchdog_armed
    }
}
