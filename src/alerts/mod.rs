//! Alert rules, the raise/resolve state machine, and notification dispatch.
//!
//! Per (metric, rule) pair at most one unresolved alert exists. A breach
//! raises an alert only when none is active; re-checking while still
//! breaching is deduplicated; a later evaluation that no longer breaches
//! resolves the alert. Notification sinks are invoked on a spawned task
//! after the in-memory transition has committed, so a slow or failing sink
//! never blocks recording.

pub mod rule;
pub mod sinks;

pub use rule::{Alert, AlertComparator, AlertRule, AlertSeverity};
pub use sinks::{
    build_sink, ChatConfig, ChatSink, EmailConfig, EmailMessage, EmailSink, LogMailTransport,
    MailTransport, NotificationSink, SinkConfig, WebhookConfig, WebhookSink,
};

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{ObservabilityError, Result};

/// Default bound on retained resolved alerts.
pub const DEFAULT_ALERT_HISTORY: usize = 256;

/// Evaluates threshold rules and manages alert lifecycle.
pub struct AlertEngine {
    rules: RwLock<Vec<AlertRule>>,
    /// Unresolved alert per rule id.
    active: RwLock<HashMap<Uuid, Alert>>,
    /// Recently resolved alerts, oldest first.
    history: RwLock<VecDeque<Alert>>,
    sinks: RwLock<Vec<Arc<dyn NotificationSink>>>,
    history_capacity: usize,
}

impl AlertEngine {
    pub fn new() -> Self {
        Self::with_history_capacity(DEFAULT_ALERT_HISTORY)
    }

    pub fn with_history_capacity(history_capacity: usize) -> Self {
        Self {
            rules: RwLock::new(Vec::new()),
            active: RwLock::new(HashMap::new()),
            history: RwLock::new(VecDeque::new()),
            sinks: RwLock::new(Vec::new()),
            history_capacity: history_capacity.max(1),
        }
    }

    /// Add a rule. Rules are immutable once added.
    pub fn add_rule(&self, rule: AlertRule) -> Uuid {
        let id = rule.id;
        info!(
            metric = %rule.metric,
            threshold = rule.threshold,
            comparator = %rule.comparator,
            severity = %rule.severity,
            "alert rule added"
        );
        self.rules.write().push(rule);
        id
    }

    /// Add a notification sink from structured configuration.
    pub fn add_notification_sink(&self, config: SinkConfig) {
        self.add_sink(build_sink(config));
    }

    /// Add a pre-built notification sink.
    pub fn add_sink(&self, sink: Arc<dyn NotificationSink>) {
        self.sinks.write().push(sink);
    }

    /// Evaluate every rule for `metric` against `value`.
    ///
    /// Returns the alerts newly raised by this evaluation. Notification
    /// dispatch for those alerts is spawned after the transition commits.
    pub fn check_metric(&self, metric: &str, value: f64) -> Vec<Alert> {
        let mut raised = Vec::new();

        {
            let rules = self.rules.read();
            let mut active = self.active.write();

            for rule in rules.iter().filter(|r| r.metric == metric) {
                let breaching = rule.comparator.breaches(value, rule.threshold);
                let has_active = active.contains_key(&rule.id);

                if breaching && !has_active {
                    let alert = Alert::raise(rule, value);
                    info!(
                        metric,
                        value,
                        threshold = rule.threshold,
                        severity = %rule.severity,
                        alert_id = %alert.id,
                        "alert raised"
                    );
                    active.insert(rule.id, alert.clone());
                    raised.push(alert);
                } else if !breaching && has_active {
                    if let Some(mut alert) = active.remove(&rule.id) {
                        alert.resolve();
                        info!(metric, value, alert_id = %alert.id, "alert resolved");
                        self.archive(alert);
                    }
                }
            }
        }

        if !raised.is_empty() {
            self.dispatch(raised.clone());
        }
        raised
    }

    /// Resolve an active alert by id.
    pub fn resolve_alert(&self, id: Uuid) -> Result<Alert> {
        let mut active = self.active.write();
        let rule_id = active
            .iter()
            .find(|(_, alert)| alert.id == id)
            .map(|(rule_id, _)| *rule_id)
            .ok_or(ObservabilityError::AlertNotFound(id))?;

        let mut alert = active
            .remove(&rule_id)
            .ok_or(ObservabilityError::AlertNotFound(id))?;
        alert.resolve();
        info!(alert_id = %alert.id, metric = %alert.metric, "alert manually resolved");
        drop(active);

        self.archive(alert.clone());
        Ok(alert)
    }

    /// Currently unresolved alerts, most severe first.
    pub fn active_alerts(&self) -> Vec<Alert> {
        let mut alerts: Vec<Alert> = self.active.read().values().cloned().collect();
        alerts.sort_by(|a, b| b.severity.cmp(&a.severity).then(a.raised_at.cmp(&b.raised_at)));
        alerts
    }

    /// Recently resolved alerts, newest first.
    pub fn resolved_alerts(&self, limit: usize) -> Vec<Alert> {
        self.history.read().iter().rev().take(limit).cloned().collect()
    }

    /// Registered rules.
    pub fn rules(&self) -> Vec<AlertRule> {
        self.rules.read().clone()
    }

    fn archive(&self, alert: Alert) {
        let mut history = self.history.write();
        history.push_back(alert);
        while history.len() > self.history_capacity {
            history.pop_front();
        }
    }

    /// Fan notifications out to every sink, one spawned task per raise.
    ///
    /// Sink failures are logged and never affect other sinks or the alert
    /// record itself.
    fn dispatch(&self, alerts: Vec<Alert>) {
        let sinks: Vec<Arc<dyn NotificationSink>> = self.sinks.read().clone();
        if sinks.is_empty() {
            return;
        }

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("no async runtime available, alert notifications skipped");
            return;
        };

        handle.spawn(async move {
            for alert in &alerts {
                for sink in &sinks {
                    if let Err(e) = sink.notify(alert).await {
                        warn!(
                            sink = sink.name(),
                            alert_id = %alert.id,
                            error = %e,
                            "notification sink failed"
                        );
                    }
                }
            }
        });
    }
}

impl Default for AlertEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;

    fn cpu_rule() -> AlertRule {
        AlertRule::new(
            "cpu",
            80.0,
            AlertComparator::GreaterThan,
            AlertSeverity::High,
            "High CPU",
            "cpu at {value}",
        )
    }

    #[test]
    fn breach_raises_exactly_one_alert() {
        let engine = AlertEngine::new();
        engine.add_rule(cpu_rule());

        let raised = engine.check_metric("cpu", 85.0);
        assert_eq!(raised.len(), 1);
        assert_eq!(raised[0].severity, AlertSeverity::High);
        assert_eq!(engine.active_alerts().len(), 1);
    }

    #[test]
    fn rebreach_while_active_is_deduplicated() {
        let engine = AlertEngine::new();
        engine.add_rule(cpu_rule());

        engine.check_metric("cpu", 85.0);
        let second = engine.check_metric("cpu", 95.0);
        assert!(second.is_empty());
        assert_eq!(engine.active_alerts().len(), 1);
    }

    #[test]
    fn clearing_value_resolves_and_stamps() {
        let engine = AlertEngine::new();
        engine.add_rule(cpu_rule());

        engine.check_metric("cpu", 85.0);
        engine.check_metric("cpu", 70.0);

        assert!(engine.active_alerts().is_empty());
        let resolved = engine.resolved_alerts(10);
        assert_eq!(resolved.len(), 1);
        assert!(resolved[0].resolved);
        assert!(resolved[0].resolved_at.is_some());
    }

    #[test]
    fn breach_after_resolution_raises_a_fresh_alert() {
        let engine = AlertEngine::new();
        engine.add_rule(cpu_rule());

        let first = engine.check_metric("cpu", 85.0);
        engine.check_metric("cpu", 70.0);
        let second = engine.check_metric("cpu", 90.0);

        assert_eq!(second.len(), 1);
        assert_ne!(first[0].id, second[0].id);
    }

    #[test]
    fn manual_resolution_by_id() {
        let engine = AlertEngine::new();
        engine.add_rule(cpu_rule());

        let raised = engine.check_metric("cpu", 85.0);
        let alert = engine.resolve_alert(raised[0].id).unwrap();
        assert!(alert.resolved);
        assert!(engine.active_alerts().is_empty());

        let err = engine.resolve_alert(raised[0].id).unwrap_err();
        assert!(matches!(err, ObservabilityError::AlertNotFound(_)));
    }

    #[test]
    fn independent_rules_on_one_metric_track_separately() {
        let engine = AlertEngine::new();
        engine.add_rule(cpu_rule());
        engine.add_rule(AlertRule::new(
            "cpu",
            95.0,
            AlertComparator::GreaterThan,
            AlertSeverity::Critical,
            "Critical CPU",
            "cpu at {value}",
        ));

        engine.check_metric("cpu", 90.0);
        assert_eq!(engine.active_alerts().len(), 1);

        engine.check_metric("cpu", 97.0);
        let active = engine.active_alerts();
        assert_eq!(active.len(), 2);
        // Most severe first.
        assert_eq!(active[0].severity, AlertSeverity::Critical);
    }

    #[test]
    fn unrelated_metrics_do_not_trip_rules() {
        let engine = AlertEngine::new();
        engine.add_rule(cpu_rule());
        assert!(engine.check_metric("memory", 99.0).is_empty());
    }

    #[tokio::test]
    async fn sink_failure_does_not_block_other_sinks() {
        struct Failing;

        #[async_trait]
        impl NotificationSink for Failing {
            fn name(&self) -> &str {
                "failing"
            }
            async fn notify(&self, _alert: &Alert) -> crate::error::Result<()> {
                Err(ObservabilityError::SinkDelivery {
                    sink: "failing".to_string(),
                    reason: "boom".to_string(),
                })
            }
        }

        struct Recording(tokio::sync::mpsc::UnboundedSender<Uuid>);

        #[async_trait]
        impl NotificationSink for Recording {
            fn name(&self) -> &str {
                "recording"
            }
            async fn notify(&self, alert: &Alert) -> crate::error::Result<()> {
                let _ = self.0.send(alert.id);
                Ok(())
            }
        }

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let engine = AlertEngine::new();
        engine.add_rule(cpu_rule());
        engine.add_sink(Arc::new(Failing));
        engine.add_sink(Arc::new(Recording(tx)));

        let raised = engine.check_metric("cpu", 99.0);
        assert_eq!(raised.len(), 1);

        let notified = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("notification should arrive")
            .expect("channel open");
        assert_eq!(notified, raised[0].id);
    }

    #[test]
    fn history_is_bounded() {
        let engine = AlertEngine::with_history_capacity(2);
        engine.add_rule(cpu_rule());

        for _ in 0..4 {
            engine.check_metric("cpu", 85.0);
            engine.check_metric("cpu", 10.0);
        }
        assert_eq!(engine.resolved_alerts(10).len(), 2);
    }
}
