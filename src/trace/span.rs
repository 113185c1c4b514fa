//! Span types.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A timed record of one logical operation inside a trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Span {
    /// Unique span identifier.
    pub span_id: Uuid,

    /// Trace this span belongs to.
    pub trace_id: Uuid,

    /// Parent span, absent for the root span of a trace.
    pub parent_span_id: Option<Uuid>,

    /// Operation name.
    pub operation: String,

    /// Start time.
    pub start_time: DateTime<Utc>,

    /// End time, set once when the span finishes.
    pub end_time: Option<DateTime<Utc>>,

    /// Span tags.
    pub tags: HashMap<String, SpanValue>,

    /// Ordered log entries recorded during the span.
    pub logs: Vec<SpanLog>,

    /// Span status.
    pub status: SpanStatus,
}

impl Span {
    pub(crate) fn new(operation: &str, trace_id: Uuid, parent_span_id: Option<Uuid>) -> Self {
        Self {
            span_id: Uuid::new_v4(),
            trace_id,
            parent_span_id,
            operation: operation.to_string(),
            start_time: Utc::now(),
            end_time: None,
            tags: HashMap::new(),
            logs: Vec::new(),
            status: SpanStatus::Ok,
        }
    }

    /// Duration, once the span has finished.
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.end_time.map(|end| end - self.start_time)
    }

    /// Whether the span has finished.
    pub fn is_finished(&self) -> bool {
        self.end_time.is_some()
    }

    /// Attach a tag to the in-flight span.
    pub fn set_tag(&mut self, key: impl Into<String>, value: impl Into<SpanValue>) {
        self.tags.insert(key.into(), value.into());
    }

    /// Append a log entry to the in-flight span.
    pub fn log(&mut self, message: impl Into<String>) {
        self.logs.push(SpanLog {
            timestamp: Utc::now(),
            message: message.into(),
        });
    }

    /// Mark the span as failed.
    pub fn set_error(&mut self, message: impl Into<String>) {
        self.status = SpanStatus::Error {
            message: message.into(),
        };
    }

    /// Stamp the end time if not already set. Finished spans stay immutable.
    pub(crate) fn finish(&mut self) {
        if self.end_time.is_none() {
            self.end_time = Some(Utc::now());
        }
    }
}

/// Span status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanStatus {
    /// Operation succeeded.
    Ok,
    /// Operation failed.
    Error { message: String },
}

/// Span tag value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SpanValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl From<String> for SpanValue {
    fn from(v: String) -> Self {
        SpanValue::String(v)
    }
}

impl From<&str> for SpanValue {
    fn from(v: &str) -> Self {
        SpanValue::String(v.to_string())
    }
}

impl From<i64> for SpanValue {
    fn from(v: i64) -> Self {
        SpanValue::Int(v)
    }
}

impl From<i32> for SpanValue {
    fn from(v: i32) -> Self {
        SpanValue::Int(v as i64)
    }
}

impl From<f64> for SpanValue {
    fn from(v: f64) -> Self {
        SpanValue::Float(v)
    }
}

impl From<bool> for SpanValue {
    fn from(v: bool) -> Self {
        SpanValue::Bool(v)
    }
}

/// A timestamped log entry inside a span.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpanLog {
    /// When the entry was recorded.
    pub timestamp: DateTime<Utc>,
    /// Log message.
    pub message: String,
}
