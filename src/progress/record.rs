//! Progress record and phase enumeration.
//!
//! The [`ProgressRecord`] is the single consumer-visible artifact of the
//! whole crate. Exactly one exists per session: created with an idle
//! default, replaced wholesale when a run starts, mutated in place
//! otherwise, and never destroyed until the session tears down.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// One named stage of a research run.
///
/// The main line is `Idle → Starting → Researching → Synthesizing →
/// Saving → GeneratingImages → Complete`. `DeepExtraction` is a transient
/// sub-state entered from `Researching`; it is recorded for display but
/// does not gate any later transition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// No run in flight.
    #[default]
    Idle,
    /// Run accepted, topics not yet dispatched.
    Starting,
    /// Topic-by-topic research.
    Researching,
    /// Transient drill-down on one topic's source material.
    DeepExtraction,
    /// Combining topic research into the briefing.
    Synthesizing,
    /// Persisting results.
    Saving,
    /// Producing illustrations.
    GeneratingImages,
    /// Terminal state for the run.
    Complete,
}

impl Phase {
    /// Returns the human-readable phase name used in messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Researching => "researching",
            Self::DeepExtraction => "deep extraction",
            Self::Synthesizing => "synthesizing",
            Self::Saving => "saving",
            Self::GeneratingImages => "generating images",
            Self::Complete => "complete",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Completed topics
// ---------------------------------------------------------------------------

/// One finished topic within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedTopic {
    /// Topic name, unique within a run.
    pub topic_name: String,
    /// Cards produced for this topic.
    pub cards_generated: u32,
    /// Tool invocations used for this topic.
    pub tools_used: u32,
}

// ---------------------------------------------------------------------------
// Progress record
// ---------------------------------------------------------------------------

/// The single consumer-readable view of the in-flight (or last) run.
///
/// Consumers receive this through a watch channel and never mutate it;
/// the engine task is the only writer. Errors are data here — the `error`
/// field is the one place a failed, timed-out, or cancelled run reports
/// what happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    /// Whether a run is in flight.
    pub is_running: bool,
    /// Number of topics the run will research.
    pub total_topics: u32,
    /// Zero-based index of the topic in flight, or −1 before any starts.
    pub current_topic_index: i32,
    /// Name of the topic in flight, empty before any starts.
    pub current_topic_name: String,
    /// Current phase.
    pub current_phase: Phase,
    /// Topics finished so far, in completion order, unique by name.
    pub topics_completed: Vec<CompletedTopic>,
    /// Total cards in the briefing, once known.
    pub total_cards: u32,
    /// Terminal failure description, if the run ended badly.
    pub error: Option<String>,
}

impl Default for ProgressRecord {
    fn default() -> Self {
        Self::idle()
    }
}

impl ProgressRecord {
    /// The idle default: no run, nothing started.
    #[must_use]
    pub const fn idle() -> Self {
        Self {
            is_running: false,
            total_topics: 0,
            current_topic_index: -1,
            current_topic_name: String::new(),
            current_phase: Phase::Idle,
            topics_completed: Vec::new(),
            total_cards: 0,
            error: None,
        }
    }

    /// A fresh record for a newly started run. Nothing carries over from
    /// any previous run.
    #[must_use]
    pub const fn fresh(total_topics: u32) -> Self {
        Self {
            is_running: true,
            total_topics,
            current_topic_index: -1,
            current_topic_name: String::new(),
            current_phase: Phase::Starting,
            topics_completed: Vec::new(),
            total_cards: 0,
            error: None,
        }
    }

    /// Returns whether a topic with this name has already completed.
    #[must_use]
    pub fn has_topic(&self, topic_name: &str) -> bool {
        self.topics_completed
            .iter()
            .any(|t| t.topic_name == topic_name)
    }

    /// Returns whether the current run has reached its terminal state.
    ///
    /// Distinct from `Idle`: a reset record is idle, not terminal.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !self.is_running && self.current_phase == Phase::Complete
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_defaults() {
        let record = ProgressRecord::idle();
        assert!(!record.is_running);
        assert_eq!(record.current_topic_index, -1);
        assert_eq!(record.current_phase, Phase::Idle);
        assert!(record.topics_completed.is_empty());
        assert!(record.error.is_none());
        assert!(!record.is_terminal());
    }

    #[test]
    fn test_fresh_starts_running() {
        let record = ProgressRecord::fresh(4);
        assert!(record.is_running);
        assert_eq!(record.total_topics, 4);
        assert_eq!(record.current_topic_index, -1);
        assert_eq!(record.current_phase, Phase::Starting);
        assert!(!record.is_terminal());
    }

    #[test]
    fn test_has_topic() {
        let mut record = ProgressRecord::fresh(2);
        record.topics_completed.push(CompletedTopic {
            topic_name: "kernel io_uring".to_string(),
            cards_generated: 3,
            tools_used: 1,
        });
        assert!(record.has_topic("kernel io_uring"));
        assert!(!record.has_topic("wasm gc"));
    }

    #[test]
    fn test_terminal_requires_complete_phase() {
        let mut record = ProgressRecord::fresh(1);
        record.is_running = false;
        record.current_phase = Phase::Complete;
        assert!(record.is_terminal());

        // A reset record is idle, not terminal
        assert!(!ProgressRecord::idle().is_terminal());
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::Researching.to_string(), "researching");
        assert_eq!(Phase::GeneratingImages.to_string(), "generating images");
        assert_eq!(Phase::DeepExtraction.to_string(), "deep extraction");
    }

    #[test]
    fn test_phase_serializes_snake_case() {
        let json = serde_json::to_string(&Phase::GeneratingImages).unwrap();
        assert_eq!(json, r#""generating_images""#);
    }

    #[test]
    fn test_record_serializes_for_consumers() {
        let record = ProgressRecord::fresh(2);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["is_running"], true);
        assert_eq!(json["current_phase"], "starting");
        assert_eq!(json["current_topic_index"], -1);
    }
}
