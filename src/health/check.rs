//! Health check capability interface and result types.
//!
//! Blocking and suspending check functions are both wrapped behind the one
//! [`HealthCheck`] trait so the registry invokes them uniformly.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Boxed error type returned by check functions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Classified status of a health check or of the system overall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
    /// No check has ever run. Only used for aggregate status.
    Unknown,
}

impl HealthStatus {
    /// Ranking used for worst-of aggregation.
    pub fn severity(&self) -> u8 {
        match self {
            HealthStatus::Healthy => 0,
            HealthStatus::Unknown => 1,
            HealthStatus::Degraded => 2,
            HealthStatus::Unhealthy => 3,
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
            HealthStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// What a check function reports back.
///
/// A bare boolean maps to healthy/unhealthy; a structured outcome carries
/// its status verbatim plus optional details.
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub status: HealthStatus,
    pub details: HashMap<String, serde_json::Value>,
}

impl CheckOutcome {
    pub fn healthy() -> Self {
        Self {
            status: HealthStatus::Healthy,
            details: HashMap::new(),
        }
    }

    pub fn degraded() -> Self {
        Self {
            status: HealthStatus::Degraded,
            details: HashMap::new(),
        }
    }

    pub fn unhealthy() -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            details: HashMap::new(),
        }
    }

    /// Attach a detail entry.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.details.insert(key.into(), v);
        }
        self
    }
}

impl From<bool> for CheckOutcome {
    fn from(ok: bool) -> Self {
        if ok {
            Self::healthy()
        } else {
            Self::unhealthy()
        }
    }
}

/// A named, periodically executed probe.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// Execute the check.
    async fn run(&self) -> Result<CheckOutcome, BoxError>;
}

/// Adapter for synchronous check functions.
pub(crate) struct SyncCheck<F>(pub F);

#[async_trait]
impl<F> HealthCheck for SyncCheck<F>
where
    F: Fn() -> Result<CheckOutcome, BoxError> + Send + Sync,
{
    async fn run(&self) -> Result<CheckOutcome, BoxError> {
        (self.0)()
    }
}

pub(crate) type BoxedCheckFuture =
    Pin<Box<dyn Future<Output = Result<CheckOutcome, BoxError>> + Send>>;

/// Adapter for asynchronous check functions.
pub(crate) struct AsyncCheck<F>(pub F);

#[async_trait]
impl<F> HealthCheck for AsyncCheck<F>
where
    F: Fn() -> BoxedCheckFuture + Send + Sync,
{
    async fn run(&self) -> Result<CheckOutcome, BoxError> {
        (self.0)().await
    }
}

/// Latest result of one registered check. Overwritten each run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    /// Check name.
    pub name: String,

    /// Classified status.
    pub status: HealthStatus,

    /// When the check ran.
    pub timestamp: DateTime<Utc>,

    /// Execution latency in milliseconds.
    pub latency_ms: u64,

    /// Structured details reported by the check.
    pub details: HashMap<String, serde_json::Value>,

    /// Error text when the check failed or timed out.
    pub error: Option<String>,
}

impl HealthCheckResult {
    pub(crate) fn from_outcome(name: &str, outcome: CheckOutcome, latency_ms: u64) -> Self {
        Self {
            name: name.to_string(),
            status: outcome.status,
            timestamp: Utc::now(),
            latency_ms,
            details: outcome.details,
            error: None,
        }
    }

    pub(crate) fn failure(name: &str, error: String, latency_ms: u64) -> Self {
        let mut details = HashMap::new();
        details.insert("error".to_string(), serde_json::Value::String(error.clone()));
        Self {
            name: name.to_string(),
            status: HealthStatus::Unhealthy,
            timestamp: Utc::now(),
            latency_ms,
            details,
            error: Some(error),
        }
    }

    pub(crate) fn timeout(name: &str, timeout_ms: u64) -> Self {
        Self::failure(
            name,
            format!("check timed out after {timeout_ms}ms"),
            timeout_ms,
        )
    }
}

impl std::fmt::Display for HealthCheckResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {} ({}ms)", self.status, self.name, self.latency_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_maps_to_status() {
        assert_eq!(CheckOutcome::from(true).status, HealthStatus::Healthy);
        assert_eq!(CheckOutcome::from(false).status, HealthStatus::Unhealthy);
    }

    #[test]
    fn severity_orders_worst_last() {
        assert!(HealthStatus::Unhealthy.severity() > HealthStatus::Degraded.severity());
        assert!(HealthStatus::Degraded.severity() > HealthStatus::Unknown.severity());
        assert!(HealthStatus::Unknown.severity() > HealthStatus::Healthy.severity());
    }

    #[test]
    fn failure_result_captures_error_in_details() {
        let result = HealthCheckResult::failure("db", "connection refused".to_string(), 12);
        assert_eq!(result.status, HealthStatus::Unhealthy);
        assert_eq!(result.error.as_deref(), Some("connection refused"));
        assert!(result.details.contains_key("error"));
    }

    #[test]
    fn outcome_details_round_trip() {
        let outcome = CheckOutcome::degraded().with_detail("queue_depth", 42);
        assert_eq!(outcome.status, HealthStatus::Degraded);
        assert_eq!(outcome.details["queue_depth"], serde_json::json!(42));
    }
}
