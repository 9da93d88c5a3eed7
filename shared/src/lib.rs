//! Loki Exporter Shared Library
//!
//! This crate contains the scrape-independent building blocks of the Loki
//! exporter: configuration, label parsing, time window resolution, the Loki
//! client and the dynamic metric registry.
//!
//! # Modules
//!
//! - [`config`] - YAML configuration and query definitions
//! - [`labels`] - Label sets and the label string parser
//! - [`window`] - Resolution of relative query windows
//! - [`loki`] - Client trait and HTTP implementation for the Loki API
//! - [`registry`] - Registry of the metrics produced by a scrape cycle
//!
//! # Example
//!
//! ```
//! use shared::labels::parse_label_set;
//! use shared::registry::{MetricKey, MetricRecord, MetricRegistry};
//!
//! let labels = parse_label_set(r#"{job="api", level="error"}"#).unwrap();
//! let registry = MetricRegistry::new();
//! registry
//!     .set(
//!         MetricKey::query_stream("errors", 0),
//!         MetricRecord::gauge("loki_query_errors_total", "number of entries", 3.0)
//!             .with_dimensions(labels),
//!     )
//!     .unwrap();
//!
//! assert_eq!(registry.len().unwrap(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod labels;
pub mod loki;
pub mod registry;
pub mod window;

/// Re-export common dependencies for convenience.
pub use async_trait::async_trait;
pub use chrono;
