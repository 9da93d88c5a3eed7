//! Scrape orchestration.
//!
//! One scrape cycle runs for every request to the metrics endpoint:
//!
//! 1. Increment the scrape counter, mark the exporter as down and reset the
//!    metric registry.
//! 2. Label discovery: count the label names known to Loki.
//! 3. Label value discovery: count the values of every discovered label.
//! 4. Query execution: run every configured query and export one gauge per
//!    returned stream.
//! 5. Mark the exporter as up.
//!
//! Each phase can be disabled in the configuration. Failures are logged and
//! contained to the label, query or stream that failed.

use crate::collector::LokiCollector;
use crate::instrument::{HandlerMetrics, BUILD_INFO};
use chrono::Utc;
use prometheus::proto::MetricFamily;
use prometheus::{Encoder, Gauge, IntCounter, Opts, Registry, TextEncoder};
use shared::config::{ExporterConfig, QueryDefinition};
use shared::labels::{LabelParseError, LabelSet};
use shared::loki::{LokiClient, LokiError, RangeQuery};
use shared::registry::{MetricKey, MetricRecord, MetricRegistry, RegistryError};
use shared::window::{TimeWindow, WindowError};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::Mutex;

/// Namespace prepended to every exported metric name.
pub const NAMESPACE: &str = "loki";

/// Errors that can occur while setting up or rendering the exporter.
#[derive(Debug, Error)]
pub enum ExporterError {
    /// A Prometheus metric could not be created, registered or encoded.
    #[error("Prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    /// The encoded exposition is not valid UTF-8.
    #[error("Invalid exposition encoding: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// Errors that abort a single scrape phase.
#[derive(Debug, Error)]
enum PhaseError {
    #[error(transparent)]
    Loki(#[from] LokiError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Window(#[from] WindowError),

    #[error(transparent)]
    Labels(#[from] LabelParseError),
}

/// Drives scrape cycles against Loki and owns the exported metrics.
pub struct Exporter {
    config: ExporterConfig,
    client: Arc<dyn LokiClient>,
    registry: Arc<MetricRegistry>,
    up: Gauge,
    total_scrapes: IntCounter,
    prometheus: Registry,
    handler: HandlerMetrics,
    cycle: Mutex<()>,
}

impl Exporter {
    /// Creates an exporter and registers its collector, the build info and
    /// the handler metrics with a fresh Prometheus registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the housekeeping metrics cannot be created or
    /// registered.
    pub fn new(config: ExporterConfig, client: Arc<dyn LokiClient>) -> Result<Self, ExporterError> {
        let up = Gauge::with_opts(
            Opts::new("up", "Was the last scrape of loki successful.").namespace(NAMESPACE),
        )?;
        let total_scrapes = IntCounter::with_opts(
            Opts::new("exporter_total_scrapes", "Current total loki scrapes.")
                .namespace(NAMESPACE),
        )?;

        let registry = Arc::new(MetricRegistry::new());
        let prometheus = Registry::new();
        prometheus.register(Box::new(LokiCollector::new(
            registry.clone(),
            up.clone(),
            total_scrapes.clone(),
        )))?;
        BUILD_INFO.register(&prometheus)?;
        let handler = HandlerMetrics::register(&prometheus)?;

        Ok(Self {
            config,
            client,
            registry,
            up,
            total_scrapes,
            prometheus,
            handler,
            cycle: Mutex::new(()),
        })
    }

    /// Returns the metrics of the scrape handler.
    #[must_use]
    pub fn handler_metrics(&self) -> &HandlerMetrics {
        &self.handler
    }

    /// Returns true if the last scrape cycle completed. False before the
    /// first cycle and while a cycle is running.
    #[must_use]
    pub fn is_up(&self) -> bool {
        self.up.get() > 0.0
    }

    /// Returns the number of scrape cycles started so far.
    #[must_use]
    pub fn total_scrapes(&self) -> u64 {
        self.total_scrapes.get()
    }

    /// Returns the Prometheus registry, e.g. to register additional
    /// collectors.
    #[must_use]
    pub fn prometheus_registry(&self) -> &Registry {
        &self.prometheus
    }

    /// Returns the registry holding the records of the last cycle.
    #[must_use]
    pub fn metric_registry(&self) -> &MetricRegistry {
        &self.registry
    }

    /// Runs one scrape cycle and gathers all metric families.
    ///
    /// Whole cycles are serialized: a concurrent call waits until the
    /// running cycle has been gathered.
    pub async fn scrape(&self) -> Vec<MetricFamily> {
        let _cycle = self.cycle.lock().await;
        self.run_cycle().await;
        self.prometheus.gather()
    }

    /// Runs one scrape cycle and encodes the result in the Prometheus text
    /// format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metric families cannot be encoded.
    pub async fn render(&self) -> Result<String, ExporterError> {
        let families = self.scrape().await;
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    async fn run_cycle(&self) {
        let started = Instant::now();
        self.total_scrapes.inc();
        self.up.set(0.0);

        if let Err(e) = self.registry.reset() {
            tracing::error!(error = %e, "Failed to reset metric registry, skipping scrape");
            return;
        }

        if self.config.metrics.labels {
            match self.discover_labels().await {
                Ok(labels) if self.config.metrics.label_values => {
                    if let Err(e) = self.discover_label_values(&labels).await {
                        tracing::error!(error = %e, "Label value discovery failed");
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(error = %e, "Label discovery failed");
                }
            }
        }

        if self.config.metrics.queries {
            self.execute_queries().await;
        }

        self.up.set(1.0);

        tracing::debug!(
            records = self.registry.len().unwrap_or_default(),
            duration_ms = started.elapsed().as_millis(),
            "Scrape cycle completed"
        );
    }

    async fn discover_labels(&self) -> Result<Vec<String>, PhaseError> {
        let labels = self.client.label_names().await?;

        self.registry.set(
            MetricKey::labels_total(),
            MetricRecord::gauge(
                metric_name("labels_total"),
                "total number of label",
                count(labels.len()),
            ),
        )?;

        tracing::debug!(labels = labels.len(), "Label names discovered");
        Ok(labels)
    }

    /// Stops at the first failing label. Records of earlier labels stay.
    async fn discover_label_values(&self, labels: &[String]) -> Result<(), PhaseError> {
        for label in labels {
            let values = self.client.label_values(label).await?;

            self.registry.set(
                MetricKey::label_values(label),
                MetricRecord::gauge(
                    metric_name("label_values_total"),
                    "total number of label values",
                    count(values.len()),
                )
                .with_dimensions(LabelSet::single("label", label)?),
            )?;
        }

        Ok(())
    }

    async fn execute_queries(&self) {
        for definition in &self.config.queries {
            match self.execute_query(definition).await {
                Ok(exported) => {
                    tracing::debug!(query = %definition.name, streams = exported, "Query executed");
                }
                Err(e) => {
                    tracing::error!(query = %definition.name, error = %e, "Query failed");
                }
            }
        }
    }

    async fn execute_query(&self, definition: &QueryDefinition) -> Result<usize, PhaseError> {
        let window = TimeWindow::resolve(definition, Utc::now())?;
        let request = RangeQuery::from_definition(definition, window);
        let streams = self.client.query_range(&request).await?;

        let name = metric_name(&format!("query_{}_total", definition.name));
        let mut exported = 0;

        for (index, stream) in streams.into_iter().enumerate() {
            let labels = match stream.labels.into_label_set() {
                Ok(labels) => labels,
                Err(e) => {
                    tracing::warn!(
                        query = %definition.name,
                        index,
                        error = %e,
                        "Skipping stream with malformed labels"
                    );
                    continue;
                }
            };

            self.registry.set(
                MetricKey::query_stream(&definition.name, index),
                MetricRecord::gauge(name.clone(), "number of entries", count(stream.entries))
                    .with_dimensions(labels),
            )?;
            exported += 1;
        }

        Ok(exported)
    }
}

fn metric_name(name: &str) -> String {
    format!("{NAMESPACE}_{name}")
}

#[allow(clippy::cast_precision_loss)]
fn count(n: usize) -> f64 {
    n as f64
}
