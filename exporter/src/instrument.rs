//! Self-instrumentation of the exporter.
//!
//! Provides the constant build info series and the counters of the metrics
//! handler. Names follow the Go client library.

use prometheus::{IntCounterVec, IntGauge, Opts, Registry};

/// Build metadata reported on the landing page and as `loki_exporter_build_info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildInfo {
    /// Crate version.
    pub version: &'static str,
    /// VCS revision, taken from `LOKI_EXPORTER_REVISION` at build time.
    pub revision: &'static str,
    /// VCS branch, taken from `LOKI_EXPORTER_BRANCH` at build time.
    pub branch: &'static str,
}

/// Build metadata of this binary.
pub const BUILD_INFO: BuildInfo = BuildInfo {
    version: env!("CARGO_PKG_VERSION"),
    revision: or_unknown(option_env!("LOKI_EXPORTER_REVISION")),
    branch: or_unknown(option_env!("LOKI_EXPORTER_BRANCH")),
};

const fn or_unknown(value: Option<&'static str>) -> &'static str {
    match value {
        Some(value) => value,
        None => "unknown",
    }
}

impl BuildInfo {
    /// Creates the constant `loki_exporter_build_info` gauge, set to 1 and
    /// registered with `registry`.
    ///
    /// # Errors
    ///
    /// Returns an error if the gauge cannot be created or registered.
    pub fn register(&self, registry: &Registry) -> Result<IntGauge, prometheus::Error> {
        let gauge = IntGauge::with_opts(
            Opts::new(
                "loki_exporter_build_info",
                "A metric with a constant '1' value labeled by version, revision and branch from which loki_exporter was built.",
            )
            .const_label("version", self.version)
            .const_label("revision", self.revision)
            .const_label("branch", self.branch),
        )?;
        gauge.set(1);
        registry.register(Box::new(gauge.clone()))?;
        Ok(gauge)
    }
}

/// Counters of the metrics handler itself.
#[derive(Debug, Clone)]
pub struct HandlerMetrics {
    requests: IntCounterVec,
    in_flight: IntGauge,
}

impl HandlerMetrics {
    /// Creates the handler metrics and registers them with `registry`.
    ///
    /// # Errors
    ///
    /// Returns an error if a metric cannot be created or registered.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let requests = IntCounterVec::new(
            Opts::new(
                "promhttp_metric_handler_requests_total",
                "Total number of scrapes by HTTP status code.",
            ),
            &["code"],
        )?;
        let in_flight = IntGauge::with_opts(Opts::new(
            "promhttp_metric_handler_requests_in_flight",
            "Current number of scrapes being served.",
        ))?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(in_flight.clone()))?;

        Ok(Self {
            requests,
            in_flight,
        })
    }

    /// Marks a scrape as started. The returned guard marks it as finished
    /// when dropped.
    #[must_use]
    pub fn start(&self) -> InFlight<'_> {
        self.in_flight.inc();
        InFlight { metrics: self }
    }

    /// Counts a served scrape by its status code.
    pub fn observe(&self, code: u16) {
        self.requests
            .with_label_values(&[code.to_string().as_str()])
            .inc();
    }
}

/// Guard decrementing the in-flight gauge on drop.
#[derive(Debug)]
pub struct InFlight<'a> {
    metrics: &'a HandlerMetrics,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.metrics.in_flight.dec();
    }
}
