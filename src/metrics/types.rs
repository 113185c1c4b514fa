//! Metric record types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Label set attached to a metric record. Sorted so exposition output is
/// deterministic.
pub type Labels = BTreeMap<String, String>;

/// Kind of a recorded metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Monotonically increasing count.
    Counter,
    /// Point-in-time value.
    Gauge,
    /// Individual observation of a distribution.
    Histogram,
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricKind::Counter => write!(f, "counter"),
            MetricKind::Gauge => write!(f, "gauge"),
            MetricKind::Histogram => write!(f, "histogram"),
        }
    }
}

/// A single recorded observation. Each write produces a new record; the
/// name is a series key, not a unique identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricRecord {
    /// Series name.
    pub name: String,

    /// Observed value.
    pub value: f64,

    /// Metric kind.
    pub kind: MetricKind,

    /// When the observation was made.
    pub timestamp: DateTime<Utc>,

    /// Label set.
    pub labels: Labels,

    /// Optional help text for exposition.
    pub help: Option<String>,
}

/// Windowed aggregate over one series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSummary {
    /// Number of records inside the window.
    pub count: usize,

    /// Minimum value inside the window.
    pub min: f64,

    /// Maximum value inside the window.
    pub max: f64,

    /// Mean value inside the window.
    pub avg: f64,

    /// Most recent value inside the window.
    pub latest: f64,

    /// Kind of the most recent record.
    pub kind: MetricKind,
}
