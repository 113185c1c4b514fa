//! Text exposition of the metric store for pull-based scraping.
//!
//! Renders each series' latest record in the Prometheus text format:
//! `# HELP` when present, `# TYPE`, then `name{labels} value`. The raw
//! record store replaces a registry here, so the lines are written
//! directly rather than going through an encoder.

use std::fmt::Write;

use super::store::MetricStore;
use super::types::MetricRecord;

/// Content type of the rendered exposition text.
pub const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Render the latest value of every tracked series.
pub fn render(store: &MetricStore) -> String {
    let mut out = String::new();
    for name in store.tracked_names() {
        if let Some(record) = store.latest_record(&name) {
            write_record(&mut out, &record);
        }
    }
    out
}

fn write_record(out: &mut String, record: &MetricRecord) {
    if let Some(help) = &record.help {
        let _ = writeln!(out, "# HELP {} {}", record.name, help);
    }
    let _ = writeln!(out, "# TYPE {} {}", record.name, record.kind);
    if record.labels.is_empty() {
        let _ = writeln!(out, "{} {}", record.name, record.value);
    } else {
        let labels: Vec<String> = record
            .labels
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", k, escape_label_value(v)))
            .collect();
        let _ = writeln!(out, "{}{{{}}} {}", record.name, labels.join(","), record.value);
    }
}

fn escape_label_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
