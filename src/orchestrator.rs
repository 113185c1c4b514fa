//! The single background loop tying sampler, alert engine, and health
//! registry together.
//!
//! One tokio task runs a fixed tick: sample resources, re-evaluate every
//! tracked metric against the alert rules, run due health checks. A failed
//! tick is logged and followed by a short backoff; the loop never
//! terminates on its own. `stop` signals shutdown and waits for the task
//! to exit, so no further writes happen once it returns.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::alerts::AlertEngine;
use crate::error::Result;
use crate::health::HealthRegistry;
use crate::metrics::MetricStore;
use crate::sampler::ResourceSampler;

/// Loop timing configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Interval between ticks.
    pub tick_interval: Duration,

    /// Pause after a failed tick before resuming.
    pub error_backoff: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(30),
            error_backoff: Duration::from_secs(5),
        }
    }
}

pub(crate) struct Orchestrator {
    config: OrchestratorConfig,
    store: Arc<MetricStore>,
    engine: Arc<AlertEngine>,
    health: Arc<HealthRegistry>,
    sampler: Arc<ResourceSampler>,
    shutdown: Mutex<Option<watch::Sender<bool>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Orchestrator {
    pub(crate) fn new(
        config: OrchestratorConfig,
        store: Arc<MetricStore>,
        engine: Arc<AlertEngine>,
        health: Arc<HealthRegistry>,
        sampler: Arc<ResourceSampler>,
    ) -> Self {
        Self {
            config,
            store,
            engine,
            health,
            sampler,
            shutdown: Mutex::new(None),
            handle: Mutex::new(None),
        }
    }

    /// Spawn the background loop. Idempotent.
    pub(crate) fn start(&self) {
        let mut handle_slot = self.handle.lock();
        if handle_slot.is_some() {
            warn!("telemetry loop already running");
            return;
        }

        let (tx, mut rx) = watch::channel(false);
        *self.shutdown.lock() = Some(tx);

        let config = self.config.clone();
        let store = self.store.clone();
        let engine = self.engine.clone();
        let health = self.health.clone();
        let sampler = self.sampler.clone();

        *handle_slot = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(config.tick_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = Self::tick(&store, &engine, &health, &sampler).await {
                            error!(error = %e, "telemetry tick failed");
                            tokio::time::sleep(config.error_backoff).await;
                        }
                    }
                    changed = rx.changed() => {
                        if changed.is_err() || *rx.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("telemetry loop exited");
        }));

        info!(
            tick_secs = self.config.tick_interval.as_secs(),
            "telemetry loop started"
        );
    }

    /// Signal shutdown and wait for the loop task to exit.
    pub(crate) async fn stop(&self) {
        if let Some(tx) = self.shutdown.lock().take() {
            let _ = tx.send(true);
        }

        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(error = %e, "telemetry loop join failed");
            }
            info!("telemetry loop stopped");
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.handle.lock().is_some()
    }

    async fn tick(
        store: &MetricStore,
        engine: &AlertEngine,
        health: &HealthRegistry,
        sampler: &ResourceSampler,
    ) -> Result<()> {
        sampler.sample();

        for name in store.tracked_names() {
            if let Some(value) = store.latest(&name) {
                engine.check_metric(&name, value);
            }
        }

        let results = health.run_due().await;
        debug!(checks_run = results.len(), "telemetry tick complete");
        Ok(())
    }
}
