//! Structured run-event log.
//!
//! Discrete, typed events describing how each run unfolded, serialized as
//! newline-delimited JSON with a monotonically increasing sequence number.
//! This is the durable audit trail of the tracker's decisions — distinct
//! from the inbound runner stream, which is ephemeral and best-effort.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::progress::Phase;

// ---------------------------------------------------------------------------
// Event variants
// ---------------------------------------------------------------------------

/// A discrete event in the tracker's own log.
///
/// Each variant is tagged with `"type"` when serialized to JSON so
/// consumers can dispatch on the event kind.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum LogEvent {
    /// A run began.
    RunStarted {
        /// When the run started.
        timestamp: DateTime<Utc>,
        /// Identifier for this run.
        run_id: Uuid,
        /// Number of topics the run will research.
        total_topics: u32,
    },

    /// The record moved to a new phase.
    PhaseChanged {
        /// When the transition occurred.
        timestamp: DateTime<Utc>,
        /// Identifier for this run.
        run_id: Uuid,
        /// Phase entered.
        phase: Phase,
        /// Wire name of the event that caused the transition.
        cause: String,
    },

    /// A topic finished.
    TopicCompleted {
        /// When the topic finished.
        timestamp: DateTime<Utc>,
        /// Identifier for this run.
        run_id: Uuid,
        /// Topic name.
        topic_name: String,
        /// Cards produced for this topic.
        cards_generated: u32,
    },

    /// A watchdog mechanism fired and forced termination.
    WatchdogFired {
        /// When the mechanism fired.
        timestamp: DateTime<Utc>,
        /// Identifier for this run.
        run_id: Uuid,
        /// Synthesized failure reason.
        reason: String,
    },

    /// A run ended, by any route.
    RunEnded {
        /// When the run ended.
        timestamp: DateTime<Utc>,
        /// Identifier for this run.
        run_id: Uuid,
        /// Whether the run ended cleanly.
        success: bool,
        /// Failure description, if any.
        error: Option<String>,
        /// Total cards in the briefing.
        total_cards: u32,
    },
}

// ---------------------------------------------------------------------------
// Envelope (adds sequence number via serde flatten)
// ---------------------------------------------------------------------------

/// Wraps a [`LogEvent`] with a monotonically increasing sequence number.
#[derive(Debug, Serialize)]
struct LogEnvelope {
    /// Zero-based, monotonically increasing sequence counter.
    sequence: u64,
    /// The wrapped event (flattened into the same JSON object).
    #[serde(flatten)]
    event: LogEvent,
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

/// Thread-safe, buffered JSONL log writer.
///
/// Each call to [`emit`](Self::emit) atomically increments the sequence
/// counter, serializes the event as a single JSON line, and flushes the
/// underlying writer. Serialization or I/O failures are silently dropped
/// because the log must never take the tracker down.
pub struct RunLog {
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
    sequence: AtomicU64,
}

// Box<dyn Write> is not Debug — provide a manual impl.
impl std::fmt::Debug for RunLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunLog")
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl RunLog {
    /// Creates a log that writes to the given writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(writer)),
            sequence: AtomicU64::new(0),
        }
    }

    /// Creates a log that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }

    /// Creates a log that silently discards all events.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(Box::new(std::io::sink()))
    }

    /// Creates a log that appends to a file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created or opened.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self::new(Box::new(file)))
    }

    /// Emits an event as a single JSONL line.
    ///
    /// Failures are silently dropped.
    pub fn emit(&self, event: LogEvent) {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let envelope = LogEnvelope {
            sequence: seq,
            event,
        };

        if let Ok(mut w) = self.writer.lock() {
            if let Ok(line) = serde_json::to_string(&envelope) {
                let _ = writeln!(w, "{line}");
                let _ = w.flush();
            }
        }
    }

    /// Returns the number of events emitted so far.
    #[must_use]
    pub fn event_count(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex as StdMutex};

    use super::*;

    /// In-memory writer for capturing log output in tests.
    #[derive(Clone)]
    struct TestWriter(Arc<StdMutex<Vec<u8>>>);

    impl TestWriter {
        fn new() -> Self {
            Self(Arc::new(StdMutex::new(Vec::new())))
        }

        fn contents(&self) -> String {
            let buf = self.0.lock().unwrap();
            String::from_utf8_lossy(&buf).into_owned()
        }
    }

    impl Write for TestWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn sample_event() -> LogEvent {
        LogEvent::RunStarted {
            timestamp: DateTime::parse_from_rfc3339("2025-11-03T09:15:00Z")
                .unwrap()
                .with_timezone(&Utc),
            run_id: Uuid::nil(),
            total_topics: 3,
        }
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let json = serde_json::to_string(&sample_event()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["type"], "RunStarted");
        assert_eq!(parsed["total_topics"], 3);
    }

    #[test]
    fn log_writes_valid_jsonl() {
        let tw = TestWriter::new();
        let log = RunLog::new(Box::new(tw.clone()));
        log.emit(sample_event());

        let output = tw.contents();
        let parsed: serde_json::Value = serde_json::from_str(output.trim()).unwrap();
        assert_eq!(parsed["type"], "RunStarted");
        assert_eq!(parsed["sequence"], 0);
    }

    #[test]
    fn log_increments_sequence() {
        let tw = TestWriter::new();
        let log = RunLog::new(Box::new(tw.clone()));
        log.emit(sample_event());
        log.emit(LogEvent::RunEnded {
            timestamp: Utc::now(),
            run_id: Uuid::nil(),
            success: true,
            error: None,
            total_cards: 5,
        });

        assert_eq!(log.event_count(), 2);

        let lines: Vec<serde_json::Value> = tw
            .contents()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines[0]["sequence"], 0);
        assert_eq!(lines[1]["sequence"], 1);
    }

    #[test]
    fn all_event_variants_serialize_to_valid_json() {
        let now = Utc::now();
        let id = Uuid::new_v4();
        let variants: Vec<LogEvent> = vec![
            LogEvent::RunStarted {
                timestamp: now,
                run_id: id,
                total_topics: 2,
            },
            LogEvent::PhaseChanged {
                timestamp: now,
                run_id: id,
                phase: Phase::Researching,
                cause: "topic_started".to_owned(),
            },
            LogEvent::TopicCompleted {
                timestamp: now,
                run_id: id,
                topic_name: "alpha".to_owned(),
                cards_generated: 3,
            },
            LogEvent::WatchdogFired {
                timestamp: now,
                run_id: id,
                reason: "no activity for 2m".to_owned(),
            },
            LogEvent::RunEnded {
                timestamp: now,
                run_id: id,
                success: false,
                error: Some("cancelled".to_owned()),
                total_cards: 0,
            },
        ];

        for variant in &variants {
            let json = serde_json::to_string(variant).unwrap();
            let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
            assert!(parsed.get("type").is_some(), "missing type tag: {json}");
        }
    }

    #[test]
    fn noop_log_swallows_everything() {
        let log = RunLog::noop();
        log.emit(sample_event());
        assert_eq!(log.event_count(), 1);
    }
}
