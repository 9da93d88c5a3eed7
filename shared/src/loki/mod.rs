//! Loki client abstraction.
//!
//! The `LokiClient` trait is the boundary between the scrape pipeline and
//! Loki, allowing different implementations (HTTP, in-memory fakes for
//! tests, etc.).

pub mod client;
pub mod models;

pub use client::HttpLokiClient;

use crate::config::{Direction, QueryDefinition, QueryLimit};
use crate::labels::StreamLabels;
use crate::window::{TimeWindow, WindowError};
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur while talking to Loki.
#[derive(Debug, Error)]
pub enum LokiError {
    /// The configured Loki address is not a usable base URL.
    #[error("Invalid Loki address: '{0}'")]
    InvalidAddress(String),

    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// The request did not complete within the configured timeout.
    #[error("Request to {url} timed out")]
    Timeout {
        /// The requested URL.
        url: String,
    },

    /// The request failed on the transport level.
    #[error("Request to {url} failed: {source}")]
    Transport {
        /// The requested URL.
        url: String,
        /// The underlying error.
        source: reqwest::Error,
    },

    /// Loki answered with a non-success status code.
    #[error("Invalid response code {status} from {url}")]
    Status {
        /// The requested URL.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The response body could not be decoded.
    #[error("Failed to decode response from {url}: {source}")]
    Decode {
        /// The requested URL.
        url: String,
        /// The underlying error.
        source: serde_json::Error,
    },

    /// Loki reported a non-success status in the response body.
    #[error("Loki reported status '{0}'")]
    Unsuccessful(String),

    /// The query window could not be expressed on the wire.
    #[error(transparent)]
    Window(#[from] WindowError),
}

/// A ranged log query with absolute bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeQuery {
    /// The `LogQL` expression.
    pub query: String,
    /// Maximum number of entries.
    pub limit: QueryLimit,
    /// Absolute bounds.
    pub window: TimeWindow,
    /// Sort order of the entries.
    pub direction: Option<Direction>,
    /// Optional regexp filter.
    pub regexp: Option<String>,
}

impl RangeQuery {
    /// Builds the request for a configured query and its resolved window.
    #[must_use]
    pub fn from_definition(definition: &QueryDefinition, window: TimeWindow) -> Self {
        Self {
            query: definition.query.clone(),
            limit: definition.limit,
            window,
            direction: definition.direction,
            regexp: definition.regexp_filter().map(str::to_string),
        }
    }
}

/// One stream of a query result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryStream {
    /// The labels identifying the stream.
    pub labels: StreamLabels,
    /// Number of entries returned for the stream.
    pub entries: usize,
}

/// Trait for Loki client implementations.
///
/// Implementations must be thread-safe (Send + Sync). Every failure,
/// including timeouts and non-success responses, is reported as a
/// [`LokiError`].
#[async_trait]
pub trait LokiClient: Send + Sync {
    /// Lists all label names.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    async fn label_names(&self) -> Result<Vec<String>, LokiError>;

    /// Lists all values of one label.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    async fn label_values(&self, label: &str) -> Result<Vec<String>, LokiError>;

    /// Runs a ranged query and returns its streams in result order.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    async fn query_range(&self, query: &RangeQuery) -> Result<Vec<QueryStream>, LokiError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_range_query_from_definition() {
        let definition = QueryDefinition::new("errors", "{job=\"api\"}")
            .with_limit(QueryLimit::AtMost(10))
            .with_direction(Direction::Forward)
            .with_regexp("");
        let now = Utc::now();
        let window = TimeWindow {
            start: now,
            end: now,
        };

        let query = RangeQuery::from_definition(&definition, window);

        assert_eq!(query.query, "{job=\"api\"}");
        assert_eq!(query.limit, QueryLimit::AtMost(10));
        assert_eq!(query.direction, Some(Direction::Forward));
        assert_eq!(query.regexp, None);
        assert_eq!(query.window, window);
    }

    struct CannedLoki;

    #[async_trait]
    impl LokiClient for CannedLoki {
        async fn label_names(&self) -> Result<Vec<String>, LokiError> {
            Ok(vec!["job".to_string()])
        }

        async fn label_values(&self, _label: &str) -> Result<Vec<String>, LokiError> {
            Err(LokiError::Unsuccessful("error".to_string()))
        }

        async fn query_range(&self, _query: &RangeQuery) -> Result<Vec<QueryStream>, LokiError> {
            Ok(vec![QueryStream {
                labels: StreamLabels::Serialized("{job=\"api\"}".to_string()),
                entries: 2,
            }])
        }
    }

    #[test]
    fn test_client_as_trait_object() {
        let client: std::sync::Arc<dyn LokiClient> = std::sync::Arc::new(CannedLoki);
        let now = Utc::now();
        let query = RangeQuery::from_definition(
            &QueryDefinition::new("errors", "{job=\"api\"}"),
            TimeWindow { start: now, end: now },
        );

        assert_eq!(tokio_test::block_on(client.label_names()).unwrap(), vec!["job"]);
        assert!(matches!(
            tokio_test::block_on(client.label_values("job")),
            Err(LokiError::Unsuccessful(_))
        ));
        let streams = tokio_test::block_on(client.query_range(&query)).unwrap();
        assert_eq!(streams[0].entries, 2);
    }

    #[test]
    fn test_error_messages() {
        let err = LokiError::Status {
            url: "http://localhost:3100/api/prom/label".to_string(),
            status: 502,
        };
        assert_eq!(
            err.to_string(),
            "Invalid response code 502 from http://localhost:3100/api/prom/label"
        );
    }
}
