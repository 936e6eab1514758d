//! Typed inbound events from the external job runner.
//!
//! The runner reports progress as newline-delimited JSON, one object per
//! line, tagged with `"type"`. Parsing is deliberately lenient: payload
//! fields the runner omits fall back to defaults, and a missing timestamp
//! becomes "now" — the stream is at-least-once and best-effort, so a
//! partially-populated event is still worth consuming.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EventError;

// ---------------------------------------------------------------------------
// Event variants
// ---------------------------------------------------------------------------

/// A progress event reported by the external job runner.
///
/// Tagged with `"type"` when serialized so consumers can dispatch on the
/// event kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunnerEvent {
    /// A new run has begun.
    Started {
        /// Number of topics the run will research.
        #[serde(default)]
        total_topics: u32,
    },

    /// Research on one topic has begun.
    TopicStarted {
        /// Zero-based index of the topic within the run.
        #[serde(default)]
        topic_index: u32,
        /// Topic name.
        #[serde(default)]
        topic_name: String,
    },

    /// Research on one topic has finished.
    TopicCompleted {
        /// Topic name.
        #[serde(default)]
        topic_name: String,
        /// Cards produced for this topic.
        #[serde(default)]
        cards_generated: u32,
        /// Tool invocations used for this topic.
        #[serde(default)]
        tools_used: u32,
    },

    /// Synthesis of the gathered research has begun.
    SynthesisStarted,

    /// Synthesis has finished.
    SynthesisCompleted {
        /// Cards produced by synthesis.
        #[serde(default)]
        cards_generated: u32,
        /// Synthesis duration in milliseconds.
        #[serde(default)]
        duration_ms: u64,
    },

    /// Results are being persisted.
    Saving {
        /// Total cards in the finished briefing.
        #[serde(default)]
        total_cards: u32,
    },

    /// Illustrations are being generated.
    GeneratingImages {
        /// Total cards in the finished briefing.
        #[serde(default)]
        total_cards: u32,
    },

    /// The runner dropped into a deep-extraction side quest for one topic.
    DeepExtraction {
        /// Topic being extracted.
        #[serde(default)]
        topic_name: String,
        /// Tool performing the extraction.
        #[serde(default)]
        tool_name: String,
        /// Target being extracted, if any.
        #[serde(default)]
        target_url: Option<String>,
        /// Free-form status note.
        #[serde(default)]
        status: String,
    },

    /// The run finished.
    Completed {
        /// Total cards in the finished briefing.
        #[serde(default)]
        total_cards: u32,
        /// End-to-end run duration in milliseconds.
        #[serde(default)]
        duration_ms: u64,
        /// Whether the run succeeded.
        #[serde(default)]
        success: bool,
        /// Failure description when `success` is false.
        #[serde(default)]
        error: Option<String>,
    },

    /// The run was cancelled by request.
    Cancelled {
        /// Why the run was cancelled.
        #[serde(default)]
        reason: String,
    },

    /// The runner performed a hard reset.
    Reset {
        /// Why the reset happened.
        #[serde(default)]
        reason: String,
    },

    /// Liveness signal carrying no state change.
    Heartbeat {
        /// Free-form status note.
        #[serde(default)]
        message: String,
    },

    /// The runner failed in a way tied to its operating mode.
    ModeError {
        /// Mode the runner was in when it failed.
        #[serde(default)]
        mode: String,
        /// Failure description.
        #[serde(default)]
        error: String,
    },
}

impl RunnerEvent {
    /// Returns the wire name of this event.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Started { .. } => "started",
            Self::TopicStarted { .. } => "topic_started",
            Self::TopicCompleted { .. } => "topic_completed",
            Self::SynthesisStarted => "synthesis_started",
            Self::SynthesisCompleted { .. } => "synthesis_completed",
            Self::Saving { .. } => "saving",
            Self::GeneratingImages { .. } => "generating_images",
            Self::DeepExtraction { .. } => "deep_extraction",
            Self::Completed { .. } => "completed",
            Self::Cancelled { .. } => "cancelled",
            Self::Reset { .. } => "reset",
            Self::Heartbeat { .. } => "heartbeat",
            Self::ModeError { .. } => "mode_error",
        }
    }

    /// Returns whether this event ends a run.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed { .. } | Self::Cancelled { .. } | Self::Reset { .. } | Self::ModeError { .. }
        )
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Wraps a [`RunnerEvent`] with its wire timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// When the runner emitted the event. Defaults to arrival time when
    /// the runner omits it.
    #[serde(rename = "ts", default = "Utc::now")]
    pub timestamp: DateTime<Utc>,

    /// The wrapped event (flattened into the same JSON object).
    #[serde(flatten)]
    pub event: RunnerEvent,
}

impl EventEnvelope {
    /// Wraps an event with an arrival timestamp of now.
    #[must_use]
    pub fn now(event: RunnerEvent) -> Self {
        Self {
            timestamp: Utc::now(),
            event,
        }
    }
}

/// Parses one JSONL line into an event envelope.
///
/// # Errors
///
/// Returns `EventError::Malformed` if the line is not valid JSON or does
/// not match any known event shape.
pub fn parse_line(line: &str) -> Result<EventEnvelope, EventError> {
    serde_json::from_str(line.trim()).map_err(|e| EventError::Malformed {
        message: e.to_string(),
    })
}
