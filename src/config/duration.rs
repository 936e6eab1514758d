//! Duration string parsing for configuration values.
//!
//! Timeout magnitudes are written as suffixed strings (`"30s"`, `"5m"`,
//! `"100ms"`, `"1h"`) in YAML and on the command line.

use std::time::Duration;

use crate::error::ConfigError;

/// Parses a duration string like "30s", "5m", "100ms", "1h".
///
/// # Errors
///
/// Returns `ConfigError::InvalidDuration` if the format is invalid.
pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
    let s = s.trim();

    let invalid = || ConfigError::InvalidDuration {
        value: s.to_string(),
    };

    if let Some(ms) = s.strip_suffix("ms") {
        let n: u64 = ms.trim().parse().map_err(|_| invalid())?;
        return Ok(Duration::from_millis(n));
    }

    if let Some(hours) = s.strip_suffix('h') {
        let n: u64 = hours.trim().parse().map_err(|_| invalid())?;
        return Ok(Duration::from_secs(n * 3600));
    }

    if let Some(mins) = s.strip_suffix('m') {
        let n: u64 = mins.trim().parse().map_err(|_| invalid())?;
        return Ok(Duration::from_secs(n * 60));
    }

    if let Some(secs) = s.strip_suffix('s') {
        let n: u64 = secs.trim().parse().map_err(|_| invalid())?;
        return Ok(Duration::from_secs(n));
    }

    Err(invalid())
}

/// Serde adapter for [`Duration`] fields stored as suffixed strings.
///
/// Serialization uses `humantime` formatting, so `Duration::from_secs(120)`
/// round-trips as `"2m"`.
pub mod serde_duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    use super::parse_duration;

    /// Deserializes a suffixed duration string.
    ///
    /// # Errors
    ///
    /// Returns a deserialization error if the string is not a valid duration.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(D::Error::custom)
    }

    /// Serializes a duration back to its human-readable form.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_seconds() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
    }

    #[test]
    fn test_parse_duration_milliseconds() {
        assert_eq!(parse_duration("100ms").unwrap(), Duration::from_millis(100));
    }

    #[test]
    fn test_parse_duration_minutes() {
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
    }

    #[test]
    fn test_parse_duration_hours() {
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
    }

    #[test]
    fn test_parse_duration_trims_whitespace() {
        assert_eq!(parse_duration("  2m ").unwrap(), Duration::from_secs(120));
    }

    #[test]
    fn test_parse_duration_rejects_bare_number() {
        assert!(parse_duration("30").is_err());
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert!(parse_duration("soon").is_err());
        assert!(parse_duration("").is_err());
        assert!(parse_duration("-5s").is_err());
    }

    #[test]
    fn test_serde_round_trip() {
        #[derive(serde::Serialize, serde::Deserialize)]
        struct Wrapper {
            #[serde(with = "serde_duration")]
            d: Duration,
        }

        let w: Wrapper = serde_yaml::from_str("d: 2m").unwrap();
        assert_eq!(w.d, Duration::from_secs(120));

        let out = serde_yaml::to_string(&w).unwrap();
        assert!(out.contains("2m"), "unexpected serialization: {out}");
    }
}
