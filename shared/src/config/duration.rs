//! Duration parsing for configuration values.
//!
//! Query offsets are written relative to the scrape instant, e.g. `-24h` for
//! "24 hours ago" or `0s` for "now". Request timeouts use the same notation
//! without a sign.

use chrono::Duration;
use serde::{Deserialize, Deserializer};
use thiserror::Error;

/// Errors that can occur while parsing a duration string.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DurationParseError {
    /// The duration string is empty.
    #[error("Duration cannot be empty")]
    Empty,

    /// The duration string could not be parsed.
    #[error("Invalid duration '{input}': {reason}")]
    Invalid {
        /// The offending input.
        input: String,
        /// Why parsing failed.
        reason: String,
    },

    /// The duration does not fit the supported range.
    #[error("Duration '{0}' is out of range")]
    OutOfRange(String),

    /// A negative value was given where only positive durations are allowed.
    #[error("Duration '{0}' must not be negative")]
    Negative(String),
}

/// A signed offset relative to the scrape instant.
///
/// # Example
///
/// ```
/// use shared::config::RelativeOffset;
///
/// let offset: RelativeOffset = "-24h".parse().unwrap();
/// assert_eq!(offset.as_duration().num_hours(), -24);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelativeOffset(Duration);

impl RelativeOffset {
    /// Creates an offset from a signed duration.
    #[must_use]
    pub fn new(duration: Duration) -> Self {
        Self(duration)
    }

    /// Offset pointing at the scrape instant itself.
    #[must_use]
    pub fn zero() -> Self {
        Self(Duration::zero())
    }

    /// Returns the signed duration of this offset.
    #[must_use]
    pub fn as_duration(&self) -> Duration {
        self.0
    }
}

impl std::str::FromStr for RelativeOffset {
    type Err = DurationParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_signed_duration(s).map(Self)
    }
}

impl<'de> Deserialize<'de> for RelativeOffset {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Parses a Go-style signed duration such as `-24h`, `+1h30m` or `0s`.
///
/// # Errors
///
/// Returns an error if the input is empty, is not a valid duration, or does
/// not fit into a [`chrono::Duration`].
pub fn parse_signed_duration(input: &str) -> Result<Duration, DurationParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(DurationParseError::Empty);
    }

    let (negative, magnitude) = match trimmed.as_bytes()[0] {
        b'-' => (true, &trimmed[1..]),
        b'+' => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let std_duration = parse_unsigned(trimmed, magnitude)?;
    let duration = Duration::from_std(std_duration)
        .map_err(|_| DurationParseError::OutOfRange(trimmed.to_string()))?;

    Ok(if negative { -duration } else { duration })
}

/// Parses a non-negative duration such as `10s` or `1m30s`.
///
/// # Errors
///
/// Returns an error if the input is empty, negative or invalid.
pub fn parse_positive_duration(input: &str) -> Result<std::time::Duration, DurationParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(DurationParseError::Empty);
    }
    if trimmed.starts_with('-') {
        return Err(DurationParseError::Negative(trimmed.to_string()));
    }

    parse_unsigned(trimmed, trimmed.trim_start_matches('+'))
}

fn parse_unsigned(original: &str, magnitude: &str) -> Result<std::time::Duration, DurationParseError> {
    let magnitude = magnitude.trim();
    // Go accepts a bare zero without a unit.
    if magnitude == "0" {
        return Ok(std::time::Duration::ZERO);
    }

    humantime::parse_duration(magnitude).map_err(|e| DurationParseError::Invalid {
        input: original.to_string(),
        reason: e.to_string(),
    })
}

/// Deserializes a positive duration string into a [`std::time::Duration`].
pub(crate) fn deserialize_timeout<'de, D>(deserializer: D) -> Result<std::time::Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_positive_duration(&raw).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_negative_hours() {
        let duration = parse_signed_duration("-24h").unwrap();
        assert_eq!(duration, Duration::hours(-24));
    }

    #[test]
    fn test_parse_zero_seconds() {
        assert_eq!(parse_signed_duration("0s").unwrap(), Duration::zero());
        assert_eq!(parse_signed_duration("0").unwrap(), Duration::zero());
    }

    #[test]
    fn test_parse_compound_duration() {
        let duration = parse_signed_duration("1h30m").unwrap();
        assert_eq!(duration, Duration::minutes(90));

        let duration = parse_signed_duration("-1h30m").unwrap();
        assert_eq!(duration, Duration::minutes(-90));
    }

    #[test]
    fn test_parse_explicit_plus_sign() {
        assert_eq!(parse_signed_duration("+5m").unwrap(), Duration::minutes(5));
    }

    #[test]
    fn test_parse_empty_duration() {
        assert_eq!(parse_signed_duration("  "), Err(DurationParseError::Empty));
    }

    #[test]
    fn test_parse_invalid_duration() {
        let result = parse_signed_duration("yesterday");
        assert!(matches!(result, Err(DurationParseError::Invalid { .. })));
    }

    #[test]
    fn test_relative_offset_from_str() {
        let offset: RelativeOffset = "-6h".parse().unwrap();
        assert_eq!(offset.as_duration(), Duration::hours(-6));
        assert_eq!(RelativeOffset::zero().as_duration(), Duration::zero());
    }

    #[test]
    fn test_positive_duration() {
        assert_eq!(
            parse_positive_duration("10s").unwrap(),
            std::time::Duration::from_secs(10)
        );
        assert!(matches!(
            parse_positive_duration("-10s"),
            Err(DurationParseError::Negative(_))
        ));
    }
}
