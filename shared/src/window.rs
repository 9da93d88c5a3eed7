//! Time window resolution.
//!
//! Query windows are configured relative to the scrape instant and resolved
//! into absolute bounds on every scrape, so a "last 24h" query always covers
//! the 24 hours before the current scrape.

use crate::config::{QueryDefinition, RelativeOffset};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur while resolving a time window.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WindowError {
    /// The offset moves the instant outside the representable range.
    #[error("Offset {offset} cannot be applied to {now}")]
    OutOfRange {
        /// The offset that overflowed.
        offset: String,
        /// The scrape instant.
        now: DateTime<Utc>,
    },

    /// The instant cannot be expressed as nanoseconds since the epoch.
    #[error("Instant {0} cannot be expressed in nanoseconds")]
    NotRepresentable(DateTime<Utc>),
}

/// Absolute bounds of one query for the current scrape.
///
/// No ordering between `start` and `end` is enforced; an inverted window is
/// handed to Loki unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    /// Start of the window.
    pub start: DateTime<Utc>,
    /// End of the window.
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Resolves the offsets of a query against `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if an offset moves the instant out of range.
    ///
    /// # Example
    ///
    /// ```
    /// use chrono::{Duration, Utc};
    /// use shared::config::QueryDefinition;
    /// use shared::window::TimeWindow;
    ///
    /// let now = Utc::now();
    /// let query = QueryDefinition::new("errors", "{job=\"api\"}");
    /// let window = TimeWindow::resolve(&query, now).unwrap();
    ///
    /// assert_eq!(window.start, now - Duration::hours(24));
    /// assert_eq!(window.end, now);
    /// ```
    pub fn resolve(query: &QueryDefinition, now: DateTime<Utc>) -> Result<Self, WindowError> {
        Ok(Self {
            start: resolve_offset(query.start, now)?,
            end: resolve_offset(query.end, now)?,
        })
    }

    /// Returns the start as nanoseconds since the epoch.
    ///
    /// # Errors
    ///
    /// Returns an error if the instant does not fit into an `i64`.
    pub fn start_nanos(&self) -> Result<i64, WindowError> {
        to_nanos(self.start)
    }

    /// Returns the end as nanoseconds since the epoch.
    ///
    /// # Errors
    ///
    /// Returns an error if the instant does not fit into an `i64`.
    pub fn end_nanos(&self) -> Result<i64, WindowError> {
        to_nanos(self.end)
    }
}

/// Applies a relative offset to `now`.
///
/// # Errors
///
/// Returns an error if the result is outside the supported range.
pub fn resolve_offset(
    offset: RelativeOffset,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, WindowError> {
    now.checked_add_signed(offset.as_duration())
        .ok_or_else(|| WindowError::OutOfRange {
            offset: offset.as_duration().to_string(),
            now,
        })
}

fn to_nanos(instant: DateTime<Utc>) -> Result<i64, WindowError> {
    instant
        .timestamp_nanos_opt()
        .ok_or(WindowError::NotRepresentable(instant))
}
