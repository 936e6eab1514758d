//! Metrics collection for `briefwatch`.
//!
//! Prometheus-compatible metrics with typed convenience functions for the
//! handful of measurements the tracker produces. Label values are drawn
//! from closed sets (phase names, event names, timeout mechanisms), so no
//! cardinality protection is needed.

use std::sync::atomic::{AtomicBool, Ordering};

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::BriefwatchError;
use crate::progress::Phase;

/// Guard to prevent double-initialization of the metrics recorder.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// All phases, for resetting the current-phase gauge.
const ALL_PHASES: [Phase; 8] = [
    Phase::Idle,
    Phase::Starting,
    Phase::Researching,
    Phase::DeepExtraction,
    Phase::Synthesizing,
    Phase::Saving,
    Phase::GeneratingImages,
    Phase::Complete,
];

/// Initializes the global metrics recorder.
///
/// When `port` is `Some`, a Prometheus HTTP listener is started on
/// `127.0.0.1:<port>`. When `None`, the recorder is installed without an
/// HTTP endpoint.
///
/// # Errors
///
/// Returns `BriefwatchError::Io` if the recorder or HTTP listener cannot
/// be installed (e.g. port already in use).
pub fn init_metrics(port: Option<u16>) -> Result<(), BriefwatchError> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        tracing::debug!("metrics already initialized, skipping");
        return Ok(());
    }
    port.map_or_else(
        || PrometheusBuilder::new().install_recorder().map(|_| ()),
        |p| {
            PrometheusBuilder::new()
                .with_http_listener(([127, 0, 0, 1], p))
                .install()
        },
    )
    .map_err(|e| BriefwatchError::Io(std::io::Error::other(e.to_string())))?;

    describe_metrics();
    Ok(())
}

/// Registers metric descriptions with the global recorder.
fn describe_metrics() {
    describe_counter!(
        "briefwatch_events_received_total",
        "Runner events accepted by the channel adapter"
    );
    describe_counter!(
        "briefwatch_events_dropped_total",
        "Runner events dropped (malformed, detached, duplicate, stale)"
    );
    describe_counter!(
        "briefwatch_timeouts_total",
        "Watchdog mechanisms fired, by mechanism"
    );
    describe_counter!("briefwatch_runs_total", "Runs ended, by outcome");
    describe_gauge!(
        "briefwatch_current_phase",
        "Currently active phase (1 = active)"
    );
}

/// Flips the current-phase gauge to `phase`.
pub fn set_current_phase(phase: Phase) {
    for p in ALL_PHASES {
        gauge!("briefwatch_current_phase", "phase" => p.as_str())
            .set(if p == phase { 1.0 } else { 0.0 });
    }
}

/// Counts a degenerate event the reducer refused.
pub fn record_event_dropped(cause: &'static str) {
    counter!("briefwatch_events_dropped_total", "cause" => cause).increment(1);
}

/// Counts a fired watchdog mechanism.
pub fn record_timeout(mechanism: &'static str) {
    counter!("briefwatch_timeouts_total", "mechanism" => mechanism).increment(1);
}

/// Counts a finished run.
pub fn record_run_ended(outcome: &'static str) {
    counter!("briefwatch_runs_total", "outcome" => outcome).increment(1);
}
