//! Append-only metric store with bounded retention.
//!
//! Records are kept per series in timestamp order. Retention pruning runs
//! inline on each write and only walks the series being written. All
//! mutation and all latest-value reads go through the same lock, so a
//! counter increment is an atomic read-modify-write and readers never see a
//! torn series.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use super::types::{Labels, MetricKind, MetricRecord, MetricSummary};

/// Default retention window for metric records.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

/// Thread-safe, process-local metric store.
pub struct MetricStore {
    series: RwLock<HashMap<String, VecDeque<MetricRecord>>>,
    retention: chrono::Duration,
}

impl MetricStore {
    /// Create a store with the given retention window.
    pub fn new(retention: Duration) -> Self {
        Self {
            series: RwLock::new(HashMap::new()),
            retention: chrono::Duration::from_std(retention)
                .unwrap_or_else(|_| chrono::Duration::hours(24)),
        }
    }

    /// Record an observation.
    pub fn record(&self, name: &str, value: f64, kind: MetricKind, labels: Labels) {
        self.push(name, value, kind, labels, None, Utc::now());
    }

    /// Record an observation with help text attached.
    pub fn record_with_help(
        &self,
        name: &str,
        value: f64,
        kind: MetricKind,
        labels: Labels,
        help: &str,
    ) {
        self.push(name, value, kind, labels, Some(help.to_string()), Utc::now());
    }

    /// Increment a counter series by one.
    ///
    /// The read of the current value and the write of the incremented one
    /// happen under a single write-lock acquisition, so concurrent
    /// increments never lose counts.
    pub fn increment_counter(&self, name: &str) {
        let now = Utc::now();
        let mut series = self.series.write();
        let records = series.entry(name.to_string()).or_default();
        Self::prune(records, now, self.retention);
        let current = records.back().map(|r| r.value).unwrap_or(0.0);
        records.push_back(MetricRecord {
            name: name.to_string(),
            value: current + 1.0,
            kind: MetricKind::Counter,
            timestamp: now,
            labels: Labels::new(),
            help: None,
        });
    }

    /// Set a gauge series to a value.
    pub fn set_gauge(&self, name: &str, value: f64) {
        self.record(name, value, MetricKind::Gauge, Labels::new());
    }

    /// Record a histogram observation.
    pub fn record_histogram(&self, name: &str, value: f64) {
        self.record(name, value, MetricKind::Histogram, Labels::new());
    }

    /// Latest value for a series, or `None` if the series is unknown or
    /// fully pruned. Unknown names are not an error.
    pub fn latest(&self, name: &str) -> Option<f64> {
        self.series
            .read()
            .get(name)
            .and_then(|records| records.back())
            .map(|r| r.value)
    }

    /// Latest full record for a series.
    pub fn latest_record(&self, name: &str) -> Option<MetricRecord> {
        self.series
            .read()
            .get(name)
            .and_then(|records| records.back())
            .cloned()
    }

    /// Names of all currently tracked series.
    pub fn tracked_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.series.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Windowed aggregates per series. Series with no records inside the
    /// window are omitted.
    pub fn summary(&self, window: Duration) -> HashMap<String, MetricSummary> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(window).unwrap_or_else(|_| chrono::Duration::hours(24));
        let series = self.series.read();

        let mut out = HashMap::with_capacity(series.len());
        for (name, records) in series.iter() {
            let windowed: Vec<&MetricRecord> =
                records.iter().filter(|r| r.timestamp >= cutoff).collect();
            let Some(last) = windowed.last() else {
                continue;
            };

            let mut min = f64::INFINITY;
            let mut max = f64::NEG_INFINITY;
            let mut sum = 0.0;
            for r in &windowed {
                min = min.min(r.value);
                max = max.max(r.value);
                sum += r.value;
            }

            out.insert(
                name.clone(),
                MetricSummary {
                    count: windowed.len(),
                    min,
                    max,
                    avg: sum / windowed.len() as f64,
                    latest: last.value,
                    kind: last.kind,
                },
            );
        }
        out
    }

    fn push(
        &self,
        name: &str,
        value: f64,
        kind: MetricKind,
        labels: Labels,
        help: Option<String>,
        timestamp: DateTime<Utc>,
    ) {
        let mut series = self.series.write();
        let records = series.entry(name.to_string()).or_default();
        records.push_back(MetricRecord {
            name: name.to_string(),
            value,
            kind,
            timestamp,
            labels,
            help,
        });
        Self::prune(records, timestamp, self.retention);
    }

    fn prune(records: &mut VecDeque<MetricRecord>, now: DateTime<Utc>, retention: chrono::Duration) {
        let cutoff = now - retention;
        while records.front().is_some_and(|r| r.timestamp < cutoff) {
            records.pop_front();
        }
    }

    #[cfg(test)]
    fn record_at(&self, name: &str, value: f64, kind: MetricKind, timestamp: DateTime<Utc>) {
        self.push(name, value, kind, Labels::new(), None, timestamp);
    }
}

impl Default for MetricStore {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION)
    }
}
