//! Response payloads of the Loki HTTP API.
//!
//! Only the parts needed for counting are decoded; log lines and sample
//! values are skipped.

use super::QueryStream;
use crate::labels::StreamLabels;
use serde::de::IgnoredAny;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Response of the legacy label endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct LegacyLabelResponse {
    /// Label names or label values.
    #[serde(default)]
    pub values: Vec<String>,
}

/// Response of the legacy query endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct LegacyQueryResponse {
    /// Result streams.
    #[serde(default)]
    pub streams: Vec<LegacyStream>,
}

/// One stream of a legacy query response.
#[derive(Debug, Deserialize)]
pub struct LegacyStream {
    /// Serialized labels, e.g. `{job="api"}`.
    pub labels: String,
    /// Log entries.
    #[serde(default)]
    pub entries: Vec<IgnoredAny>,
}

impl From<LegacyStream> for QueryStream {
    fn from(stream: LegacyStream) -> Self {
        Self {
            labels: StreamLabels::Serialized(stream.labels),
            entries: stream.entries.len(),
        }
    }
}

/// Envelope of every v1 response.
#[derive(Debug, Deserialize)]
pub struct V1Response<T> {
    /// `success` or `error`.
    pub status: String,
    /// The payload.
    #[serde(default)]
    pub data: T,
}

impl<T> V1Response<T> {
    /// Returns true if Loki reported success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

/// Payload of the v1 `query_range` endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct V1QueryData {
    /// `streams` for log queries, `matrix` for metric queries.
    #[serde(rename = "resultType", default)]
    pub result_type: String,
    /// Result streams or series.
    #[serde(default)]
    pub result: Vec<V1Stream>,
}

/// One stream (or series) of a v1 query response.
#[derive(Debug, Deserialize)]
pub struct V1Stream {
    /// Structured labels of the stream.
    #[serde(alias = "metric", default)]
    pub stream: BTreeMap<String, String>,
    /// `[timestamp, line]` pairs.
    #[serde(default)]
    pub values: Vec<IgnoredAny>,
}

impl From<V1Stream> for QueryStream {
    fn from(stream: V1Stream) -> Self {
        Self {
            labels: StreamLabels::Structured(stream.stream),
            entries: stream.values.len(),
        }
    }
}
