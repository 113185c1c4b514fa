//! Alert rules and alert records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Comparison applied between a metric's latest value and the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertComparator {
    GreaterThan,
    LessThan,
    Equal,
}

impl AlertComparator {
    /// Whether `value` breaches `threshold` under this comparator.
    pub fn breaches(&self, value: f64, threshold: f64) -> bool {
        match self {
            AlertComparator::GreaterThan => value > threshold,
            AlertComparator::LessThan => value < threshold,
            AlertComparator::Equal => (value - threshold).abs() < f64::EPSILON,
        }
    }
}

impl std::fmt::Display for AlertComparator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertComparator::GreaterThan => write!(f, ">"),
            AlertComparator::LessThan => write!(f, "<"),
            AlertComparator::Equal => write!(f, "=="),
        }
    }
}

/// Alert severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertSeverity::Low => write!(f, "low"),
            AlertSeverity::Medium => write!(f, "medium"),
            AlertSeverity::High => write!(f, "high"),
            AlertSeverity::Critical => write!(f, "critical"),
        }
    }
}

/// A threshold rule against one metric series. Immutable once added.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRule {
    /// Rule identifier. Generated when the rule comes from config.
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,

    /// Metric series the rule watches.
    pub metric: String,

    /// Threshold value.
    pub threshold: f64,

    /// Comparator applied to the latest value.
    pub comparator: AlertComparator,

    /// Severity of alerts raised by this rule.
    pub severity: AlertSeverity,

    /// Title template; `{metric}`, `{value}` and `{threshold}` expand at
    /// raise time.
    pub title: String,

    /// Description template, same placeholders.
    pub description: String,
}

impl AlertRule {
    pub fn new(
        metric: impl Into<String>,
        threshold: f64,
        comparator: AlertComparator,
        severity: AlertSeverity,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            metric: metric.into(),
            threshold,
            comparator,
            severity,
            title: title.into(),
            description: description.into(),
        }
    }
}

/// A detected, possibly ongoing breach of a rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    /// Alert identifier.
    pub id: Uuid,

    /// Rule that raised it.
    pub rule_id: Uuid,

    /// Metric series that breached.
    pub metric: String,

    /// Severity snapshot from the rule.
    pub severity: AlertSeverity,

    /// Rendered title.
    pub title: String,

    /// Rendered description.
    pub description: String,

    /// Value observed at raise time.
    pub value: f64,

    /// Threshold snapshot from the rule.
    pub threshold: f64,

    /// Comparator snapshot from the rule.
    pub comparator: AlertComparator,

    /// When the alert was raised.
    pub raised_at: DateTime<Utc>,

    /// When the alert was resolved, if it has been.
    pub resolved_at: Option<DateTime<Utc>>,

    /// Whether the alert is resolved.
    pub resolved: bool,
}

impl Alert {
    pub(crate) fn raise(rule: &AlertRule, value: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            rule_id: rule.id,
            metric: rule.metric.clone(),
            severity: rule.severity,
            title: render_template(&rule.title, &rule.metric, value, rule.threshold),
            description: render_template(&rule.description, &rule.metric, value, rule.threshold),
            value,
            threshold: rule.threshold,
            comparator: rule.comparator,
            raised_at: Utc::now(),
            resolved_at: None,
            resolved: false,
        }
    }

    pub(crate) fn resolve(&mut self) {
        if !self.resolved {
            self.resolved = true;
            self.resolved_at = Some(Utc::now());
        }
    }
}

fn render_template(template: &str, metric: &str, value: f64, threshold: f64) -> String {
    template
        .replace("{metric}", metric)
        .replace("{value}", &value.to_string())
        .replace("{threshold}", &threshold.to_string())
}
