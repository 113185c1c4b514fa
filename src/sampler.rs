//! OS resource sampling into the metric store.
//!
//! Each metric family (CPU, memory, disk, network, load average) is sampled
//! by its own helper; a family that is unavailable on the host is skipped
//! without aborting the others. Whether load averages exist at all is
//! resolved once at construction rather than probed per call.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use sysinfo::{Disks, Networks, System};
use tracing::debug;

use crate::metrics::{Labels, MetricKind, MetricStore};

/// Periodically invoked sampler writing OS gauges.
pub struct ResourceSampler {
    metrics: Arc<MetricStore>,
    system: Mutex<System>,
    enabled: AtomicBool,
    has_load_average: bool,
}

impl ResourceSampler {
    pub fn new(metrics: Arc<MetricStore>) -> Self {
        Self {
            metrics,
            system: Mutex::new(System::new()),
            enabled: AtomicBool::new(true),
            // Load averages do not exist on Windows hosts.
            has_load_average: cfg!(not(target_os = "windows")),
        }
    }

    /// Enable or disable sampling at runtime.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
        debug!(enabled, "resource sampler toggled");
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Sample every available metric family.
    pub fn sample(&self) {
        if !self.is_enabled() {
            return;
        }
        self.sample_cpu();
        self.sample_memory();
        self.sample_disks();
        self.sample_network();
        self.sample_load_average();
    }

    fn gauge(&self, name: &str, value: f64, help: &str) {
        self.metrics
            .record_with_help(name, value, MetricKind::Gauge, Labels::new(), help);
    }

    fn sample_cpu(&self) {
        let cpu = {
            let mut system = self.system.lock();
            system.refresh_cpu_usage();
            system.global_cpu_usage() as f64
        };
        self.gauge("system_cpu_percent", cpu, "Global CPU utilization percent");
    }

    fn sample_memory(&self) {
        let (total, used, available) = {
            let mut system = self.system.lock();
            system.refresh_memory();
            (
                system.total_memory(),
                system.used_memory(),
                system.available_memory(),
            )
        };

        if let Some(percent) = percent_of(used as f64, total as f64) {
            self.gauge(
                "system_memory_percent",
                percent,
                "Memory utilization percent",
            );
        }
        self.gauge(
            "system_memory_used_bytes",
            used as f64,
            "Memory in use, bytes",
        );
        self.gauge(
            "system_memory_available_bytes",
            available as f64,
            "Memory available, bytes",
        );
    }

    fn sample_disks(&self) {
        let disks = Disks::new_with_refreshed_list();
        if disks.list().is_empty() {
            debug!("no disks visible, skipping disk family");
            return;
        }

        let mut total: u64 = 0;
        let mut available: u64 = 0;
        for disk in disks.list() {
            total += disk.total_space();
            available += disk.available_space();
        }
        let used = total.saturating_sub(available);

        if let Some(percent) = percent_of(used as f64, total as f64) {
            self.gauge("system_disk_percent", percent, "Disk utilization percent");
        }
        self.gauge("system_disk_used_bytes", used as f64, "Disk in use, bytes");
        self.gauge(
            "system_disk_free_bytes",
            available as f64,
            "Disk available, bytes",
        );
    }

    fn sample_network(&self) {
        let networks = Networks::new_with_refreshed_list();
        let mut received: u64 = 0;
        let mut transmitted: u64 = 0;
        let mut seen = false;
        for (_name, data) in &networks {
            seen = true;
            received += data.total_received();
            transmitted += data.total_transmitted();
        }
        if !seen {
            debug!("no network interfaces visible, skipping network family");
            return;
        }

        self.gauge(
            "system_network_received_bytes",
            received as f64,
            "Total bytes received across interfaces",
        );
        self.gauge(
            "system_network_transmitted_bytes",
            transmitted as f64,
            "Total bytes transmitted across interfaces",
        );
    }

    fn sample_load_average(&self) {
        if !self.has_load_average {
            return;
        }
        let load = System::load_average();
        self.gauge("system_load_average_1m", load.one, "1-minute load average");
        self.gauge(
            "system_load_average_5m",
            load.five,
            "5-minute load average",
        );
        self.gauge(
            "system_load_average_15m",
            load.fifteen,
            "15-minute load average",
        );
    }
}

fn percent_of(used: f64, total: f64) -> Option<f64> {
    if total <= 0.0 {
        return None;
    }
    Some(used / total * 100.0)
}
