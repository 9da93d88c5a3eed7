//! Helpers shared by the unit tests of this crate.

use crate::scrape::Exporter;
use crate::state::AppState;
use shared::async_trait;
use shared::config::ExporterConfig;
use shared::loki::{LokiClient, LokiError, QueryStream, RangeQuery};
use std::sync::Arc;

/// Loki stand-in answering with fixed label names. Every label has a single
/// value and queries return nothing.
#[derive(Debug, Default)]
pub struct StaticLoki {
    pub labels: Vec<String>,
}

impl StaticLoki {
    pub fn with_labels(labels: &[&str]) -> Self {
        Self {
            labels: labels.iter().map(ToString::to_string).collect(),
        }
    }
}

#[async_trait]
impl LokiClient for StaticLoki {
    async fn label_names(&self) -> Result<Vec<String>, LokiError> {
        Ok(self.labels.clone())
    }

    async fn label_values(&self, label: &str) -> Result<Vec<String>, LokiError> {
        Ok(vec![format!("{label}-value")])
    }

    async fn query_range(&self, _query: &RangeQuery) -> Result<Vec<QueryStream>, LokiError> {
        Ok(vec![])
    }
}

/// Builds an application state around a [`StaticLoki`].
pub fn test_state(labels: &[&str]) -> AppState {
    let exporter = Exporter::new(
        ExporterConfig::default(),
        Arc::new(StaticLoki::with_labels(labels)),
    )
    .unwrap();
    AppState::new(Arc::new(exporter), "/metrics")
}

/// Builds an application state without labels serving metrics on `path`.
pub fn test_state_at(path: &str) -> AppState {
    let exporter = Exporter::new(ExporterConfig::default(), Arc::new(StaticLoki::default())).unwrap();
    AppState::new(Arc::new(exporter), path)
}
