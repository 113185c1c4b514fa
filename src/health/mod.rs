//! Health check registry with interval-based scheduling.
//!
//! Each registered check carries its own run interval; on every
//! orchestrator tick [`HealthRegistry::run_due`] executes only the checks
//! whose interval has elapsed, bounded by a per-check timeout so one
//! hanging check cannot stall the tick. Every run writes status and
//! latency gauges into the metric store and overwrites the stored latest
//! result.

pub mod check;

pub use check::{BoxError, CheckOutcome, HealthCheck, HealthCheckResult, HealthStatus};

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use futures::future::join_all;
use tracing::debug;

use crate::metrics::MetricStore;
use check::{AsyncCheck, SyncCheck};

/// Default execution budget per check.
pub const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

struct CheckEntry {
    check: Arc<dyn HealthCheck>,
    interval: Duration,
    timeout: Duration,
    last_run: Option<Instant>,
}

/// Named health checks with their latest results.
pub struct HealthRegistry {
    checks: DashMap<String, CheckEntry>,
    results: DashMap<String, HealthCheckResult>,
    metrics: Arc<MetricStore>,
    default_timeout: Duration,
}

impl HealthRegistry {
    pub fn new(metrics: Arc<MetricStore>) -> Self {
        Self::with_default_timeout(metrics, DEFAULT_CHECK_TIMEOUT)
    }

    pub fn with_default_timeout(metrics: Arc<MetricStore>, default_timeout: Duration) -> Self {
        Self {
            checks: DashMap::new(),
            results: DashMap::new(),
            metrics,
            default_timeout,
        }
    }

    /// Register a check. Re-registering a name replaces the previous check.
    pub fn register(&self, name: &str, interval: Duration, check: Arc<dyn HealthCheck>) {
        self.register_with_timeout(name, interval, self.default_timeout, check);
    }

    /// Register a check with its own execution budget.
    pub fn register_with_timeout(
        &self,
        name: &str,
        interval: Duration,
        timeout: Duration,
        check: Arc<dyn HealthCheck>,
    ) {
        debug!(check = name, interval_secs = interval.as_secs(), "registering health check");
        self.checks.insert(
            name.to_string(),
            CheckEntry {
                check,
                interval,
                timeout,
                last_run: None,
            },
        );
    }

    /// Register a synchronous check function.
    pub fn register_fn<F>(&self, name: &str, interval: Duration, f: F)
    where
        F: Fn() -> Result<CheckOutcome, BoxError> + Send + Sync + 'static,
    {
        self.register(name, interval, Arc::new(SyncCheck(f)));
    }

    /// Register an asynchronous check function.
    pub fn register_async_fn<F, Fut>(&self, name: &str, interval: Duration, f: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<CheckOutcome, BoxError>> + Send + 'static,
    {
        self.register(
            name,
            interval,
            Arc::new(AsyncCheck(move || {
                let fut: check::BoxedCheckFuture = Box::pin(f());
                fut
            })),
        );
    }

    /// Execute every check whose interval has elapsed.
    ///
    /// Due checks run concurrently, each bounded by its timeout. Returns
    /// the results produced this invocation.
    pub async fn run_due(&self) -> Vec<HealthCheckResult> {
        let now = Instant::now();
        let mut due: Vec<(String, Arc<dyn HealthCheck>, Duration)> = Vec::new();

        for mut entry in self.checks.iter_mut() {
            let is_due = entry
                .last_run
                .map(|last| now.duration_since(last) >= entry.interval)
                .unwrap_or(true);
            if is_due {
                entry.last_run = Some(now);
                due.push((entry.key().clone(), entry.check.clone(), entry.timeout));
            }
        }

        if due.is_empty() {
            return Vec::new();
        }

        let results = join_all(
            due.into_iter()
                .map(|(name, check, timeout)| Self::execute(name, check, timeout)),
        )
        .await;

        for result in &results {
            self.record(result);
        }
        results
    }

    /// Run one registered check immediately, regardless of its interval.
    pub async fn run_check(&self, name: &str) -> Option<HealthCheckResult> {
        let (check, timeout) = {
            let mut entry = self.checks.get_mut(name)?;
            entry.last_run = Some(Instant::now());
            (entry.check.clone(), entry.timeout)
        };
        let result = Self::execute(name.to_string(), check, timeout).await;
        self.record(&result);
        Some(result)
    }

    async fn execute(
        name: String,
        check: Arc<dyn HealthCheck>,
        timeout: Duration,
    ) -> HealthCheckResult {
        let start = Instant::now();
        match tokio::time::timeout(timeout, check.run()).await {
            Ok(Ok(outcome)) => {
                HealthCheckResult::from_outcome(&name, outcome, start.elapsed().as_millis() as u64)
            }
            Ok(Err(e)) => {
                HealthCheckResult::failure(&name, e.to_string(), start.elapsed().as_millis() as u64)
            }
            Err(_) => HealthCheckResult::timeout(&name, timeout.as_millis() as u64),
        }
    }

    fn record(&self, result: &HealthCheckResult) {
        let status_value = if result.status.is_healthy() { 1.0 } else { 0.0 };
        self.metrics
            .set_gauge(&format!("health_check_{}_status", result.name), status_value);
        self.metrics.set_gauge(
            &format!("health_check_{}_latency_seconds", result.name),
            result.latency_ms as f64 / 1000.0,
        );
        self.results.insert(result.name.clone(), result.clone());
    }

    /// Latest result per check, sorted by name.
    pub fn latest_results(&self) -> Vec<HealthCheckResult> {
        let mut results: Vec<HealthCheckResult> =
            self.results.iter().map(|r| r.value().clone()).collect();
        results.sort_by(|a, b| a.name.cmp(&b.name));
        results
    }

    /// Worst status across all latest results; `Unknown` before any check
    /// has run.
    pub fn overall_health(&self) -> HealthStatus {
        self.results
            .iter()
            .map(|r| r.value().status)
            .max_by_key(|s| s.severity())
            .unwrap_or(HealthStatus::Unknown)
    }

    /// Names of registered checks.
    pub fn check_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.checks.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::DEFAULT_RETENTION;

    fn registry() -> HealthRegistry {
        HealthRegistry::new(Arc::new(MetricStore::new(DEFAULT_RETENTION)))
    }

    #[tokio::test]
    async fn boolean_check_classifies_healthy() {
        let registry = registry();
        registry.register_fn("database", Duration::from_secs(1), || Ok(true.into()));

        let results = registry.run_due().await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, HealthStatus::Healthy);
        assert_eq!(
            registry.metrics.latest("health_check_database_status"),
            Some(1.0)
        );
    }

    #[tokio::test]
    async fn erroring_check_becomes_unhealthy_with_error_captured() {
        let registry = registry();
        registry.register_fn("storage", Duration::from_secs(1), || {
            Err("bucket unreachable".into())
        });

        let results = registry.run_due().await;
        assert_eq!(results[0].status, HealthStatus::Unhealthy);
        assert_eq!(results[0].error.as_deref(), Some("bucket unreachable"));
        assert!(results[0].details.contains_key("error"));
        assert_eq!(
            registry.metrics.latest("health_check_storage_status"),
            Some(0.0)
        );
    }

    #[tokio::test]
    async fn structured_status_is_used_verbatim() {
        let registry = registry();
        registry.register_fn("queue", Duration::from_secs(1), || {
            Ok(CheckOutcome::degraded().with_detail("backlog", 1500))
        });

        let results = registry.run_due().await;
        assert_eq!(results[0].status, HealthStatus::Degraded);
        assert_eq!(results[0].details["backlog"], serde_json::json!(1500));
    }

    #[tokio::test]
    async fn async_check_runs_through_same_interface() {
        let registry = registry();
        registry.register_async_fn("api", Duration::from_secs(1), || async {
            Ok(CheckOutcome::healthy())
        });

        let results = registry.run_due().await;
        assert_eq!(results[0].status, HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn hanging_check_is_bounded_by_timeout() {
        let registry = registry();
        registry.register_with_timeout(
            "slow",
            Duration::from_secs(1),
            Duration::from_millis(20),
            Arc::new(AsyncCheck(|| {
                let fut: check::BoxedCheckFuture = Box::pin(async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(CheckOutcome::healthy())
                });
                fut
            })),
        );

        let results = registry.run_due().await;
        assert_eq!(results[0].status, HealthStatus::Unhealthy);
        assert!(results[0].error.as_deref().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn checks_only_run_when_interval_elapsed() {
        let registry = registry();
        registry.register_fn("infrequent", Duration::from_secs(3600), || Ok(true.into()));

        assert_eq!(registry.run_due().await.len(), 1);
        assert!(registry.run_due().await.is_empty());
    }

    #[tokio::test]
    async fn overall_health_is_worst_of_latest_results() {
        let registry = registry();
        assert_eq!(registry.overall_health(), HealthStatus::Unknown);

        registry.register_fn("good", Duration::from_secs(1), || Ok(true.into()));
        registry.register_fn("shaky", Duration::from_secs(1), || {
            Ok(CheckOutcome::degraded())
        });
        registry.run_due().await;
        assert_eq!(registry.overall_health(), HealthStatus::Degraded);

        registry.register_fn("broken", Duration::from_secs(1), || Ok(false.into()));
        registry.run_due().await;
        assert_eq!(registry.overall_health(), HealthStatus::Unhealthy);
    }
}
