//! Configuration schema types
//!
//! Timing magnitudes for the watchdog machinery, deserialized from YAML.
//! None of these values change the structure of the state machine — only
//! how long each mechanism waits before declaring the run stuck.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::duration::serde_duration;
use crate::error::ConfigError;
use crate::progress::Phase;

// ============================================================================
// Top-Level Configuration
// ============================================================================

/// Root configuration for a `briefwatch` session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct Config {
    /// Watchdog timing magnitudes
    #[serde(default)]
    pub watchdog: WatchdogConfig,

    /// External runner settings
    #[serde(default)]
    pub runner: RunnerConfig,

    /// Optional JSONL file receiving the run event log
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events_file: Option<PathBuf>,
}

impl Config {
    /// Validates all magnitudes.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any duration is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.watchdog.validate()?;
        self.runner.validate()
    }
}

// ============================================================================
// Watchdog Timing
// ============================================================================

/// Per-phase deadline table.
///
/// Each entry bounds how long the run may sit in that phase before the
/// supervisor forces termination. `Researching` is re-armed per topic, so
/// its magnitude bounds a single topic, not the whole research stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default, deny_unknown_fields)]
pub struct PhaseDeadlines {
    /// Deadline for the `Starting` phase (default `2m`)
    #[serde(with = "serde_duration")]
    pub starting: Duration,

    /// Deadline for one topic in the `Researching` phase (default `10m`)
    #[serde(with = "serde_duration")]
    pub researching: Duration,

    /// Deadline for the `Synthesizing` phase (default `10m`)
    #[serde(with = "serde_duration")]
    pub synthesizing: Duration,

    /// Deadline for the `Saving` phase (default `2m`)
    #[serde(with = "serde_duration")]
    pub saving: Duration,

    /// Deadline for the `GeneratingImages` phase (default `15m`)
    #[serde(with = "serde_duration")]
    pub generating_images: Duration,
}

impl Default for PhaseDeadlines {
    fn default() -> Self {
        Self {
            starting: Duration::from_secs(120),
            researching: Duration::from_secs(600),
            synthesizing: Duration::from_secs(600),
            saving: Duration::from_secs(120),
            generating_images: Duration::from_secs(900),
        }
    }
}

/// Watchdog timing magnitudes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default, deny_unknown_fields)]
pub struct WatchdogConfig {
    /// Per-phase deadline table
    pub phase_deadlines: PhaseDeadlines,

    /// End-to-end deadline for a whole run, armed once at `started`
    /// (default `30m`)
    #[serde(with = "serde_duration")]
    pub run_deadline: Duration,

    /// Gap since the last event after which the run is declared silent
    /// (default `120s`)
    #[serde(with = "serde_duration")]
    pub inactivity_threshold: Duration,

    /// How often the inactivity watchdog compares now against the
    /// last-event watermark (default `30s`)
    #[serde(with = "serde_duration")]
    pub inactivity_poll_interval: Duration,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            phase_deadlines: PhaseDeadlines::default(),
            run_deadline: Duration::from_secs(1800),
            inactivity_threshold: Duration::from_secs(120),
            inactivity_poll_interval: Duration::from_secs(30),
        }
    }
}

impl WatchdogConfig {
    /// Returns the deadline magnitude for a phase, or `None` for phases
    /// that carry no deadline of their own.
    ///
    /// `DeepExtraction` returns `None`: entering it leaves the already-armed
    /// `Researching` deadline running.
    #[must_use]
    pub const fn deadline_for(&self, phase: Phase) -> Option<Duration> {
        match phase {
            Phase::Starting => Some(self.phase_deadlines.starting),
            Phase::Researching => Some(self.phase_deadlines.researching),
            Phase::Synthesizing => Some(self.phase_deadlines.synthesizing),
            Phase::Saving => Some(self.phase_deadlines.saving),
            Phase::GeneratingImages => Some(self.phase_deadlines.generating_images),
            Phase::Idle | Phase::DeepExtraction | Phase::Complete => None,
        }
    }

    /// Validates all magnitudes.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any duration is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields: [(&str, Duration); 8] = [
            ("phase_deadlines.starting", self.phase_deadlines.starting),
            (
                "phase_deadlines.researching",
                self.phase_deadlines.researching,
            ),
            (
                "phase_deadlines.synthesizing",
                self.phase_deadlines.synthesizing,
            ),
            ("phase_deadlines.saving", self.phase_deadlines.saving),
            (
                "phase_deadlines.generating_images",
                self.phase_deadlines.generating_images,
            ),
            ("run_deadline", self.run_deadline),
            ("inactivity_threshold", self.inactivity_threshold),
            ("inactivity_poll_interval", self.inactivity_poll_interval),
        ];
        for (field, value) in fields {
            if value.is_zero() {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: "0".to_string(),
                    expected: "a positive duration".to_string(),
                });
            }
        }
        Ok(())
    }
}

// ============================================================================
// Runner Settings
// ============================================================================

/// External job runner settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default, deny_unknown_fields)]
pub struct RunnerConfig {
    /// Command line used to spawn the runner process
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    /// How long the cancel guard stays set after a cancel request
    /// (default `3s`)
    #[serde(with = "serde_duration")]
    pub cancel_cooldown: Duration,

    /// How long a status query waits for the runner's reply (default `5s`)
    #[serde(with = "serde_duration")]
    pub status_timeout: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            command: None,
            cancel_cooldown: Duration::from_secs(3),
            status_timeout: Duration::from_secs(5),
        }
    }
}

impl RunnerConfig {
    /// Validates all magnitudes.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any duration is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("runner.cancel_cooldown", self.cancel_cooldown),
            ("runner.status_timeout", self.status_timeout),
        ] {
            if value.is_zero() {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: "0".to_string(),
                    expected: "a positive duration".to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.watchdog.run_deadline, Duration::from_secs(1800));
        assert_eq!(
            config.watchdog.inactivity_threshold,
            Duration::from_secs(120)
        );
        assert_eq!(
            config.watchdog.inactivity_poll_interval,
            Duration::from_secs(30)
        );
        assert_eq!(
            config.watchdog.phase_deadlines.starting,
            Duration::from_secs(120)
        );
        assert!(config.runner.command.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deadline_for_each_phase() {
        let watchdog = WatchdogConfig::default();
        assert_eq!(
            watchdog.deadline_for(Phase::Starting),
            Some(Duration::from_secs(120))
        );
        assert_eq!(
            watchdog.deadline_for(Phase::Researching),
            Some(Duration::from_secs(600))
        );
        assert_eq!(
            watchdog.deadline_for(Phase::GeneratingImages),
            Some(Duration::from_secs(900))
        );
        assert_eq!(watchdog.deadline_for(Phase::Idle), None);
        assert_eq!(watchdog.deadline_for(Phase::DeepExtraction), None);
        assert_eq!(watchdog.deadline_for(Phase::Complete), None);
    }

    #[test]
    fn test_parse_partial_yaml_keeps_defaults() {
        let yaml = r"
watchdog:
  run_deadline: 1h
  phase_deadlines:
    researching: 20m
";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.watchdog.run_deadline, Duration::from_secs(3600));
        assert_eq!(
            config.watchdog.phase_deadlines.researching,
            Duration::from_secs(1200)
        );
        // Untouched fields keep their defaults
        assert_eq!(
            config.watchdog.phase_deadlines.saving,
            Duration::from_secs(120)
        );
        assert_eq!(
            config.watchdog.inactivity_threshold,
            Duration::from_secs(120)
        );
    }

    #[test]
    fn test_zero_duration_rejected() {
        let yaml = r"
watchdog:
  inactivity_poll_interval: 0s
";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("inactivity_poll_interval"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let yaml = r"
watchdog:
  overall_timeout: 5m
";
        assert!(serde_yaml::from_str::<Config>(yaml).is_err());
    }

    #[test]
    fn test_runner_section() {
        let yaml = r#"
runner:
  command: "python3 agent.py --stream"
  cancel_cooldown: 1s
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            config.runner.command.as_deref(),
            Some("python3 agent.py --stream")
        );
        assert_eq!(config.runner.cancel_cooldown, Duration::from_secs(1));
        assert_eq!(config.runner.status_timeout, Duration::from_secs(5));
    }
}
