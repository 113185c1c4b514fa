//! Dashboard snapshot assembly and system status derivation.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sysinfo::System;

use crate::alerts::{Alert, AlertSeverity};
use crate::health::{HealthCheckResult, HealthStatus};
use crate::metrics::MetricSummary;
use crate::trace::Trace;

/// Aggregate status shown at the top of the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemStatus {
    Healthy,
    Degraded,
    Unhealthy,
    Critical,
}

impl std::fmt::Display for SystemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SystemStatus::Healthy => write!(f, "healthy"),
            SystemStatus::Degraded => write!(f, "degraded"),
            SystemStatus::Unhealthy => write!(f, "unhealthy"),
            SystemStatus::Critical => write!(f, "critical"),
        }
    }
}

/// Static facts about the host, resolved once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    pub hostname: Option<String>,
    pub os: Option<String>,
    pub os_version: Option<String>,
    pub kernel_version: Option<String>,
    pub arch: String,
    pub cpu_count: usize,
    pub total_memory_bytes: u64,
    pub started_at: DateTime<Utc>,
}

impl SystemInfo {
    /// Collect host facts. Called once when the core is constructed.
    pub fn collect() -> Self {
        let mut system = System::new();
        system.refresh_memory();

        Self {
            hostname: System::host_name(),
            os: System::name(),
            os_version: System::os_version(),
            kernel_version: System::kernel_version(),
            arch: std::env::consts::ARCH.to_string(),
            cpu_count: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            total_memory_bytes: system.total_memory(),
            started_at: Utc::now(),
        }
    }

    /// Seconds since the core was constructed.
    pub fn uptime_seconds(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}

/// Full dashboard view assembled from every subsystem.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub generated_at: DateTime<Utc>,
    pub system_status: SystemStatus,
    pub system_info: SystemInfo,
    pub metrics_summary: HashMap<String, MetricSummary>,
    pub active_alerts: Vec<Alert>,
    pub overall_health: HealthStatus,
    pub health_results: Vec<HealthCheckResult>,
    pub recent_traces: Vec<Trace>,
}

/// Derive the aggregate status.
///
/// Critical beats everything; an unhealthy check beats degradation; a
/// high-severity alert alone degrades the system.
pub fn derive_system_status(overall_health: HealthStatus, active_alerts: &[Alert]) -> SystemStatus {
    let has_critical = active_alerts
        .iter()
        .any(|a| a.severity == AlertSeverity::Critical);
    if has_critical {
        return SystemStatus::Critical;
    }

    if overall_health == HealthStatus::Unhealthy {
        return SystemStatus::Unhealthy;
    }

    let has_high = active_alerts
        .iter()
        .any(|a| a.severity == AlertSeverity::High);
    if overall_health == HealthStatus::Degraded || has_high {
        return SystemStatus::Degraded;
    }

    SystemStatus::Healthy
}
