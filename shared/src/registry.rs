//! Dynamic metric registry.
//!
//! The set of exported series is only known after Loki has been queried, so
//! the registry maps an opaque [`MetricKey`] to a uniform [`MetricRecord`]
//! (name, help, dimensions, value) instead of declaring metric objects up
//! front. The exposition side translates records into the wire format.

use crate::labels::LabelSet;
use std::collections::BTreeMap;
use std::sync::RwLock;
use thiserror::Error;

/// Errors that can occur during registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Failed to acquire lock on the registry.
    #[error("Failed to acquire lock on metric registry")]
    LockError,
}

/// Identifies one exported metric instance within a scrape cycle.
///
/// Setting a key twice in the same cycle replaces the first record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MetricKey(String);

impl MetricKey {
    /// Key of the label discovery gauge.
    #[must_use]
    pub fn labels_total() -> Self {
        Self("labels_total".to_string())
    }

    /// Key of the value count gauge of one label.
    #[must_use]
    pub fn label_values(label: &str) -> Self {
        Self(format!("label_values_{label}_total"))
    }

    /// Key of one query result stream, by its position in the result set.
    #[must_use]
    pub fn query_stream(query: &str, index: usize) -> Self {
        Self(format!("{query}{index}"))
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MetricKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl std::fmt::Display for MetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One gauge sample with its dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRecord {
    /// Fully qualified metric name.
    pub name: String,
    /// Help text.
    pub help: String,
    /// Dimension names and values.
    pub dimensions: LabelSet,
    /// The gauge value.
    pub value: f64,
}

impl MetricRecord {
    /// Creates a record without dimensions.
    #[must_use]
    pub fn gauge(name: impl Into<String>, help: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            dimensions: LabelSet::new(),
            value,
        }
    }

    /// Attaches dimensions to the record.
    #[must_use]
    pub fn with_dimensions(mut self, dimensions: LabelSet) -> Self {
        self.dimensions = dimensions;
        self
    }
}

/// Receives records drained from the registry.
pub trait MetricSink {
    /// Accepts one record.
    fn emit(&mut self, key: &MetricKey, record: &MetricRecord);
}

impl MetricSink for Vec<MetricRecord> {
    fn emit(&mut self, _key: &MetricKey, record: &MetricRecord) {
        self.push(record.clone());
    }
}

impl MetricSink for BTreeMap<MetricKey, MetricRecord> {
    fn emit(&mut self, key: &MetricKey, record: &MetricRecord) {
        self.insert(key.clone(), record.clone());
    }
}

/// Process-wide store of the records produced by the current scrape cycle.
///
/// The registry itself only guards single operations. Callers serialize
/// whole cycles (reset, repopulate, drain) on their own.
#[derive(Debug, Default)]
pub struct MetricRegistry {
    records: RwLock<BTreeMap<MetricKey, MetricRecord>>,
}

impl MetricRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Discards every record.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock cannot be acquired.
    pub fn reset(&self) -> Result<(), RegistryError> {
        let mut records = self.records.write().map_err(|_| RegistryError::LockError)?;
        records.clear();
        Ok(())
    }

    /// Creates or replaces the record at `key`.
    ///
    /// Returns the record that was replaced, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock cannot be acquired.
    pub fn set(
        &self,
        key: MetricKey,
        record: MetricRecord,
    ) -> Result<Option<MetricRecord>, RegistryError> {
        let mut records = self.records.write().map_err(|_| RegistryError::LockError)?;
        Ok(records.insert(key, record))
    }

    /// Emits every record, in key order, into `sink`.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock cannot be acquired.
    pub fn drain<S: MetricSink + ?Sized>(&self, sink: &mut S) -> Result<(), RegistryError> {
        let records = self.records.read().map_err(|_| RegistryError::LockError)?;
        for (key, record) in records.iter() {
            sink.emit(key, record);
        }
        Ok(())
    }

    /// Returns the record stored at `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock cannot be acquired.
    pub fn get(&self, key: &MetricKey) -> Result<Option<MetricRecord>, RegistryError> {
        let records = self.records.read().map_err(|_| RegistryError::LockError)?;
        Ok(records.get(key).cloned())
    }

    /// Returns the number of records.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock cannot be acquired.
    pub fn len(&self) -> Result<usize, RegistryError> {
        let records = self.records.read().map_err(|_| RegistryError::LockError)?;
        Ok(records.len())
    }

    /// Returns true if the registry holds no records.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock cannot be acquired.
    pub fn is_empty(&self) -> Result<bool, RegistryError> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, value: f64) -> MetricRecord {
        MetricRecord::gauge(name, "test metric", value)
    }

    #[test]
    fn test_metric_keys() {
        assert_eq!(MetricKey::labels_total().as_str(), "labels_total");
        assert_eq!(MetricKey::label_values("job").as_str(), "label_values_job_total");
        assert_eq!(MetricKey::query_stream("errors", 0).as_str(), "errors0");
        assert_eq!(MetricKey::query_stream("errors", 12).to_string(), "errors12");
    }

    #[test]
    fn test_set_and_get() {
        let registry = MetricRegistry::new();
        registry
            .set(MetricKey::labels_total(), record("loki_labels_total", 5.0))
            .unwrap();

        let stored = registry.get(&MetricKey::labels_total()).unwrap().unwrap();
        assert_eq!(stored.value, 5.0);
        assert!(stored.dimensions.is_empty());
        assert_eq!(registry.len().unwrap(), 1);
    }

    #[test]
    fn test_set_overwrites_existing_key() {
        let registry = MetricRegistry::new();
        let key = MetricKey::from("errors10");

        assert!(registry.set(key.clone(), record("a", 1.0)).unwrap().is_none());
        let replaced = registry.set(key.clone(), record("b", 2.0)).unwrap();

        assert_eq!(replaced.map(|r| r.name), Some("a".to_string()));
        assert_eq!(registry.get(&key).unwrap().unwrap().name, "b");
        assert_eq!(registry.len().unwrap(), 1);
    }

    #[test]
    fn test_reset_clears_everything() {
        let registry = MetricRegistry::new();
        registry.set(MetricKey::from("a"), record("a", 1.0)).unwrap();
        registry.set(MetricKey::from("b"), record("b", 2.0)).unwrap();

        registry.reset().unwrap();

        assert!(registry.is_empty().unwrap());
        let mut drained: Vec<MetricRecord> = Vec::new();
        registry.drain(&mut drained).unwrap();
        assert!(drained.is_empty());
    }

    #[test]
    fn test_drain_in_key_order_without_mutation() {
        let registry = MetricRegistry::new();
        registry.set(MetricKey::from("b"), record("second", 2.0)).unwrap();
        registry.set(MetricKey::from("a"), record("first", 1.0)).unwrap();

        let mut drained: Vec<MetricRecord> = Vec::new();
        registry.drain(&mut drained).unwrap();

        let names: Vec<_> = drained.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
        assert_eq!(registry.len().unwrap(), 2);
    }

    #[test]
    fn test_drain_into_map_keeps_keys() {
        let registry = MetricRegistry::new();
        let dims = LabelSet::single("label", "job").unwrap();
        registry
            .set(
                MetricKey::label_values("job"),
                record("loki_label_values_total", 3.0).with_dimensions(dims.clone()),
            )
            .unwrap();

        let mut drained = BTreeMap::new();
        registry.drain(&mut drained).unwrap();

        let stored = &drained[&MetricKey::label_values("job")];
        assert_eq!(stored.dimensions, dims);
        assert_eq!(stored.value, 3.0);
    }
}
