//! Metric collection and exposition.
//!
//! Append-only, per-series records with bounded retention, plus the
//! pull-based text rendering of current values.

pub mod exposition;
pub mod store;
pub mod types;

pub use exposition::{render, EXPOSITION_CONTENT_TYPE};
pub use store::{MetricStore, DEFAULT_RETENTION};
pub use types::{Labels, MetricKind, MetricRecord, MetricSummary};
