//! Prometheus exposition of the metric registry.
//!
//! [`LokiCollector`] is registered once with the Prometheus registry. On every
//! gather it emits the two housekeeping series and translates the records of
//! the dynamic [`MetricRegistry`] into metric families, grouping records that
//! share a metric name into one family.

use prometheus::core::{Collector, Desc};
use prometheus::proto::{Gauge as GaugeProto, LabelPair, Metric, MetricFamily, MetricType};
use prometheus::{Gauge, IntCounter};
use shared::registry::{MetricKey, MetricRecord, MetricRegistry, MetricSink};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Collector bridging the dynamic registry and the Prometheus registry.
pub struct LokiCollector {
    registry: Arc<MetricRegistry>,
    up: Gauge,
    total_scrapes: IntCounter,
}

impl LokiCollector {
    /// Creates a collector for the given registry and housekeeping series.
    #[must_use]
    pub fn new(registry: Arc<MetricRegistry>, up: Gauge, total_scrapes: IntCounter) -> Self {
        Self {
            registry,
            up,
            total_scrapes,
        }
    }
}

impl Collector for LokiCollector {
    fn desc(&self) -> Vec<&Desc> {
        // Dynamic series are not described up front; their names are only
        // known once Loki has answered.
        self.up
            .desc()
            .into_iter()
            .chain(self.total_scrapes.desc())
            .collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let mut families = self.up.collect();
        families.extend(self.total_scrapes.collect());

        let mut sink = FamilySink::default();
        match self.registry.drain(&mut sink) {
            Ok(()) => families.extend(sink.into_families()),
            Err(e) => tracing::error!(error = %e, "Failed to drain metric registry"),
        }

        families
    }
}

/// Groups drained records into metric families by name.
#[derive(Debug, Default)]
pub struct FamilySink {
    families: BTreeMap<String, MetricFamily>,
}

impl FamilySink {
    /// Returns the collected families, ordered by name.
    #[must_use]
    pub fn into_families(self) -> Vec<MetricFamily> {
        self.families.into_values().collect()
    }
}

impl MetricSink for FamilySink {
    fn emit(&mut self, _key: &MetricKey, record: &MetricRecord) {
        let family = self
            .families
            .entry(record.name.clone())
            .or_insert_with(|| {
                let mut family = MetricFamily::default();
                family.set_name(record.name.clone());
                family.set_help(record.help.clone());
                family.set_field_type(MetricType::GAUGE);
                family
            });

        family.mut_metric().push(to_metric(record));
    }
}

fn to_metric(record: &MetricRecord) -> Metric {
    let mut metric = Metric::default();
    for (name, value) in record.dimensions.iter() {
        let mut pair = LabelPair::default();
        pair.set_name(name.to_string());
        pair.set_value(value.to_string());
        metric.mut_label().push(pair);
    }

    let mut gauge = GaugeProto::default();
    gauge.set_value(record.value);
    metric.set_gauge(gauge);
    metric
}
