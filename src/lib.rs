//! Veritas Observability
//!
//! Process-local telemetry core for the Veritas audit platform.
//!
//! ## Features
//!
//! - **Metrics**: append-only, per-series records with bounded retention,
//!   windowed summaries, and pull-based text exposition
//! - **Alerts**: threshold rules with a raise/resolve state machine and
//!   pluggable email/webhook/chat notification sinks
//! - **Health**: named checks on their own intervals, bounded by per-check
//!   timeouts, aggregated into an overall status
//! - **Tracing**: spans with ambient, call-chain-scoped trace propagation
//!   and a bounded recent-trace buffer
//! - **Sampling**: OS CPU/memory/disk/network/load gauges
//!
//! The [`Observability`] core is constructed once at application startup
//! and handed to whatever needs to record metrics or read snapshots;
//! `start`/`stop` are its only lifecycle controls. Everything it does is
//! best-effort relative to the business logic it observes: internal
//! faults are logged and contained, never propagated into the
//! request-serving path.

pub mod alerts;
pub mod error;
pub mod health;
#[cfg(feature = "http")]
pub mod http;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod sampler;
pub mod snapshot;
pub mod trace;

pub use alerts::{
    Alert, AlertComparator, AlertEngine, AlertRule, AlertSeverity, NotificationSink, SinkConfig,
};
pub use error::{ObservabilityError, Result};
pub use health::{CheckOutcome, HealthCheck, HealthCheckResult, HealthRegistry, HealthStatus};
pub use logging::LoggingConfig;
pub use metrics::{Labels, MetricKind, MetricStore, MetricSummary};
pub use orchestrator::OrchestratorConfig;
pub use sampler::ResourceSampler;
pub use snapshot::{DashboardSnapshot, SystemInfo, SystemStatus};
pub use trace::{Span, SpanStatus, SpanTracer, Trace};

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::debug;

use orchestrator::Orchestrator;

/// How many completed traces the dashboard snapshot includes.
const SNAPSHOT_TRACE_LIMIT: usize = 20;

/// Configuration for the observability core.
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Metric record retention window.
    pub retention: Duration,

    /// Background loop tick interval.
    pub tick_interval: Duration,

    /// Pause after a failed tick.
    pub error_backoff: Duration,

    /// Bound on retained completed traces.
    pub trace_capacity: usize,

    /// Default execution budget per health check.
    pub check_timeout: Duration,

    /// Whether OS resource sampling starts enabled.
    pub resource_sampling: bool,

    /// Bound on retained resolved alerts.
    pub alert_history: usize,

    /// Window used for the dashboard metrics summary.
    pub summary_window: Duration,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            retention: metrics::DEFAULT_RETENTION,
            tick_interval: Duration::from_secs(30),
            error_backoff: Duration::from_secs(5),
            trace_capacity: trace::DEFAULT_TRACE_CAPACITY,
            check_timeout: health::DEFAULT_CHECK_TIMEOUT,
            resource_sampling: true,
            alert_history: alerts::DEFAULT_ALERT_HISTORY,
            summary_window: Duration::from_secs(3600),
        }
    }
}

/// The observability core.
///
/// Owns the metric store, span tracer, health registry, alert engine, and
/// resource sampler, plus the one background loop that drives them.
pub struct Observability {
    store: Arc<MetricStore>,
    engine: Arc<AlertEngine>,
    health: Arc<HealthRegistry>,
    sampler: Arc<ResourceSampler>,
    tracer: Arc<SpanTracer>,
    system_info: SystemInfo,
    orchestrator: Orchestrator,
    summary_window: Duration,
}

impl Observability {
    /// Construct the core. Call once at application startup.
    pub fn new(config: ObservabilityConfig) -> Self {
        let store = Arc::new(MetricStore::new(config.retention));
        let engine = Arc::new(AlertEngine::with_history_capacity(config.alert_history));
        let health = Arc::new(HealthRegistry::with_default_timeout(
            store.clone(),
            config.check_timeout,
        ));
        let sampler = Arc::new(ResourceSampler::new(store.clone()));
        sampler.set_enabled(config.resource_sampling);
        let tracer = Arc::new(SpanTracer::new(config.trace_capacity));

        let orchestrator = Orchestrator::new(
            OrchestratorConfig {
                tick_interval: config.tick_interval,
                error_backoff: config.error_backoff,
            },
            store.clone(),
            engine.clone(),
            health.clone(),
            sampler.clone(),
        );

        Self {
            store,
            engine,
            health,
            sampler,
            tracer,
            system_info: SystemInfo::collect(),
            orchestrator,
            summary_window: config.summary_window,
        }
    }

    /// Start the background loop.
    pub fn start(&self) {
        self.orchestrator.start();
    }

    /// Stop the background loop, waiting until it has fully exited.
    pub async fn stop(&self) {
        self.orchestrator.stop().await;
    }

    /// Whether the background loop is running.
    pub fn is_running(&self) -> bool {
        self.orchestrator.is_running()
    }

    /// The metric store.
    pub fn metrics(&self) -> &Arc<MetricStore> {
        &self.store
    }

    /// The alert engine.
    pub fn alerts(&self) -> &Arc<AlertEngine> {
        &self.engine
    }

    /// The health registry.
    pub fn health(&self) -> &Arc<HealthRegistry> {
        &self.health
    }

    /// The resource sampler.
    pub fn sampler(&self) -> &Arc<ResourceSampler> {
        &self.sampler
    }

    /// The span tracer.
    pub fn tracer(&self) -> &Arc<SpanTracer> {
        &self.tracer
    }

    /// Host facts resolved at construction.
    pub fn system_info(&self) -> &SystemInfo {
        &self.system_info
    }

    /// Record one served HTTP request.
    pub fn record_http_request(
        &self,
        method: &str,
        endpoint: &str,
        status_code: u16,
        duration_seconds: f64,
    ) {
        let mut labels = Labels::new();
        labels.insert("method".to_string(), method.to_string());
        labels.insert("endpoint".to_string(), endpoint.to_string());
        labels.insert("status".to_string(), status_code.to_string());

        self.store.increment_counter("http_requests_total");
        self.store.record_with_help(
            "http_request_duration_seconds",
            duration_seconds,
            MetricKind::Histogram,
            labels,
            "HTTP request latency in seconds",
        );
    }

    /// Record a business event (e.g. `audit_completed`), translated into
    /// counter increments. The payload is kept as structured log fields.
    pub fn record_business_event(&self, event_type: &str, payload: serde_json::Value) {
        debug!(event_type, payload = %payload, "business event");
        self.store.increment_counter("business_events_total");
        self.store
            .increment_counter(&format!("business_event_{event_type}_total"));
    }

    /// Render the pull-based exposition text, re-sampling resource gauges
    /// first so scrapes see fresh values.
    pub fn render_exposition(&self) -> String {
        self.sampler.sample();
        metrics::render(&self.store)
    }

    /// Assemble the dashboard snapshot from every subsystem.
    pub fn dashboard_snapshot(&self) -> DashboardSnapshot {
        let active_alerts = self.engine.active_alerts();
        let overall_health = self.health.overall_health();

        DashboardSnapshot {
            generated_at: Utc::now(),
            system_status: snapshot::derive_system_status(overall_health, &active_alerts),
            system_info: self.system_info.clone(),
            metrics_summary: self.store.summary(self.summary_window),
            active_alerts,
            overall_health,
            health_results: self.health.latest_results(),
            recent_traces: self.tracer.recent_traces(SNAPSHOT_TRACE_LIMIT),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet_core() -> Observability {
        let core = Observability::new(ObservabilityConfig::default());
        core.sampler().set_enabled(false);
        core
    }

    #[test]
    fn http_requests_feed_counter_and_histogram() {
        let core = quiet_core();
        core.record_http_request("GET", "/audits", 200, 0.042);
        core.record_http_request("POST", "/audits", 201, 0.130);

        assert_eq!(core.metrics().latest("http_requests_total"), Some(2.0));
        assert_eq!(
            core.metrics().latest("http_request_duration_seconds"),
            Some(0.130)
        );
    }

    #[test]
    fn business_events_become_counters() {
        let core = quiet_core();
        core.record_business_event("audit_completed", serde_json::json!({"audit_id": 7}));
        core.record_business_event("audit_completed", serde_json::json!({"audit_id": 8}));
        core.record_business_event("report_generated", serde_json::json!({}));

        assert_eq!(core.metrics().latest("business_events_total"), Some(3.0));
        assert_eq!(
            core.metrics().latest("business_event_audit_completed_total"),
            Some(2.0)
        );
        assert_eq!(
            core.metrics().latest("business_event_report_generated_total"),
            Some(1.0)
        );
    }

    #[test]
    fn snapshot_reflects_quiet_system() {
        let core = quiet_core();
        core.metrics().set_gauge("queue_depth", 3.0);

        let snapshot = core.dashboard_snapshot();
        assert_eq!(snapshot.system_status, SystemStatus::Healthy);
        assert_eq!(snapshot.overall_health, HealthStatus::Unknown);
        assert!(snapshot.active_alerts.is_empty());
        assert!(snapshot.metrics_summary.contains_key("queue_depth"));
    }

    #[test]
    fn exposition_includes_recorded_series() {
        let core = quiet_core();
        core.metrics().set_gauge("audit_backlog", 12.0);

        let text = core.render_exposition();
        assert!(text.contains("# TYPE audit_backlog gauge"));
        assert!(text.contains("audit_backlog 12"));
    }

    #[tokio::test]
    async fn lifecycle_start_stop() {
        let core = quiet_core();
        assert!(!core.is_running());
        core.start();
        assert!(core.is_running());
        core.stop().await;
        assert!(!core.is_running());
    }
}
