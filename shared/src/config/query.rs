//! Query definitions.
//!
//! Each configured query is executed against Loki on every scrape and turns
//! every returned stream into one gauge.

use super::duration::RelativeOffset;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Sort order of the entries returned by a ranged query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Oldest entries first.
    Forward,
    /// Newest entries first.
    Backward,
}

impl Direction {
    /// Returns the wire representation used by the Loki API.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Backward => "backward",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maximum number of entries a query may return.
///
/// A configured limit of zero (or below) means "no cap".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "i64")]
pub enum QueryLimit {
    /// No cap on the number of returned entries.
    #[default]
    Unbounded,
    /// At most this many entries.
    AtMost(u64),
}

impl From<i64> for QueryLimit {
    fn from(value: i64) -> Self {
        u64::try_from(value)
            .ok()
            .filter(|limit| *limit > 0)
            .map_or(Self::Unbounded, Self::AtMost)
    }
}

impl std::fmt::Display for QueryLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unbounded => f.write_str("-1"),
            Self::AtMost(limit) => write!(f, "{limit}"),
        }
    }
}

fn default_start() -> RelativeOffset {
    RelativeOffset::new(Duration::hours(-24))
}

fn default_end() -> RelativeOffset {
    RelativeOffset::zero()
}

/// A configured Loki query.
///
/// # Example
///
/// ```
/// use shared::config::{QueryDefinition, QueryLimit};
///
/// let query: QueryDefinition = serde_yaml::from_str(
///     "name: errors\nquery: '{job=\"api\"} |= \"error\"'\n",
/// )
/// .unwrap();
///
/// assert_eq!(query.limit, QueryLimit::Unbounded);
/// assert_eq!(query.start.as_duration().num_hours(), -24);
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Validate)]
pub struct QueryDefinition {
    /// Name of the query, used for the metric name and the registry keys.
    #[validate(custom(function = "validate_query_name"))]
    pub name: String,

    /// The `LogQL` expression.
    #[validate(length(min = 1, message = "Query expression cannot be empty"))]
    pub query: String,

    /// Maximum number of entries to return.
    #[serde(default)]
    pub limit: QueryLimit,

    /// Start of the window relative to the scrape instant.
    #[serde(default = "default_start")]
    pub start: RelativeOffset,

    /// End of the window relative to the scrape instant.
    #[serde(default = "default_end")]
    pub end: RelativeOffset,

    /// Sort order of the returned entries.
    #[serde(default)]
    pub direction: Option<Direction>,

    /// Optional regular expression filter applied by Loki.
    #[serde(default)]
    pub regexp: Option<String>,
}

impl QueryDefinition {
    /// Creates a query with default limit, window and direction.
    #[must_use]
    pub fn new(name: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            query: query.into(),
            limit: QueryLimit::Unbounded,
            start: default_start(),
            end: default_end(),
            direction: None,
            regexp: None,
        }
    }

    /// Sets the entry limit.
    #[must_use]
    pub fn with_limit(mut self, limit: QueryLimit) -> Self {
        self.limit = limit;
        self
    }

    /// Sets the relative window.
    #[must_use]
    pub fn with_window(mut self, start: RelativeOffset, end: RelativeOffset) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    /// Sets the sort direction.
    #[must_use]
    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    /// Sets the regexp filter.
    #[must_use]
    pub fn with_regexp(mut self, regexp: impl Into<String>) -> Self {
        self.regexp = Some(regexp.into());
        self
    }

    /// Returns the regexp filter, ignoring empty values.
    #[must_use]
    pub fn regexp_filter(&self) -> Option<&str> {
        self.regexp.as_deref().filter(|r| !r.is_empty())
    }
}

/// Query names end up inside metric names, so they are limited to
/// `[a-zA-Z0-9_]` and may not start with a digit.
fn validate_query_name(name: &str) -> Result<(), ValidationError> {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return Err(ValidationError::new("empty_query_name"));
    };

    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(ValidationError::new("invalid_query_name"));
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ValidationError::new("invalid_query_name"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_limit_from_config_value() {
        assert_eq!(QueryLimit::from(0), QueryLimit::Unbounded);
        assert_eq!(QueryLimit::from(-1), QueryLimit::Unbounded);
        assert_eq!(QueryLimit::from(100), QueryLimit::AtMost(100));
    }

    #[test]
    fn test_query_limit_display() {
        assert_eq!(QueryLimit::Unbounded.to_string(), "-1");
        assert_eq!(QueryLimit::AtMost(25).to_string(), "25");
    }

    #[test]
    fn test_query_definition_defaults() {
        let yaml = "name: errors\nquery: '{job=\"api\"}'\n";
        let query: QueryDefinition = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(query.name, "errors");
        assert_eq!(query.limit, QueryLimit::Unbounded);
        assert_eq!(query.start.as_duration(), Duration::hours(-24));
        assert_eq!(query.end.as_duration(), Duration::zero());
        assert_eq!(query.direction, None);
        assert_eq!(query.regexp_filter(), None);
    }

    #[test]
    fn test_query_definition_full() {
        let yaml = r#"
name: api_errors
query: '{job="api"}'
limit: 500
start: -1h
end: -5m
direction: forward
regexp: "timeout|refused"
"#;
        let query: QueryDefinition = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(query.limit, QueryLimit::AtMost(500));
        assert_eq!(query.start.as_duration(), Duration::hours(-1));
        assert_eq!(query.end.as_duration(), Duration::minutes(-5));
        assert_eq!(query.direction, Some(Direction::Forward));
        assert_eq!(query.regexp_filter(), Some("timeout|refused"));
    }

    #[test]
    fn test_query_definition_invalid_offset() {
        let yaml = "name: errors\nquery: '{job=\"api\"}'\nstart: last week\n";
        let result: Result<QueryDefinition, _> = serde_yaml::from_str(yaml);
        assert!(result.is_err());
    }

    #[test]
    fn test_query_definition_validation() {
        assert!(QueryDefinition::new("errors", "{job=\"api\"}").validate().is_ok());
        assert!(QueryDefinition::new("", "{job=\"api\"}").validate().is_err());
        assert!(QueryDefinition::new("9lives", "{job=\"api\"}").validate().is_err());
        assert!(QueryDefinition::new("api-errors", "{job=\"api\"}").validate().is_err());
        assert!(QueryDefinition::new("errors", "").validate().is_err());
    }

    #[test]
    fn test_empty_regexp_is_ignored() {
        let query = QueryDefinition::new("errors", "{job=\"api\"}").with_regexp("");
        assert_eq!(query.regexp_filter(), None);
    }
}
