//! Application state module.
//!
//! Defines the shared application state that is passed to route handlers.

use crate::scrape::Exporter;
use std::sync::Arc;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// The exporter driving the scrape cycles.
    exporter: Arc<Exporter>,
    /// The path the metrics endpoint is served on.
    metrics_path: Arc<str>,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(exporter: Arc<Exporter>, metrics_path: impl Into<Arc<str>>) -> Self {
        Self {
            exporter,
            metrics_path: metrics_path.into(),
        }
    }

    /// Returns a reference to the exporter.
    #[must_use]
    pub fn exporter(&self) -> &Exporter {
        self.exporter.as_ref()
    }

    /// Returns the path the metrics endpoint is served on.
    #[must_use]
    pub fn metrics_path(&self) -> &str {
        &self.metrics_path
    }
}
