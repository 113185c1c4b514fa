//! Notification sinks invoked when an alert is raised.
//!
//! Sinks are configured with structured objects; unrecognized keys are
//! ignored rather than erroring. Delivery runs off the hot path and every
//! failure is caught and logged per sink.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{ObservabilityError, Result};

use super::rule::Alert;

/// Delivery target for raised alerts.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Sink name for logging.
    fn name(&self) -> &str;

    /// Deliver one alert notification.
    async fn notify(&self, alert: &Alert) -> Result<()>;
}

/// Structured sink configuration, tagged by kind.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SinkConfig {
    Email(EmailConfig),
    Webhook(WebhookConfig),
    Chat(ChatConfig),
}

/// SMTP-like email sink configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub from: String,
    pub to: Vec<String>,
    #[serde(default)]
    pub subject_prefix: Option<String>,
}

fn default_smtp_port() -> u16 {
    587
}

/// Webhook sink configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    pub url: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

/// Chat channel sink configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    pub webhook_url: String,
    #[serde(default)]
    pub channel: Option<String>,
}

/// Build a sink from its configuration.
pub fn build_sink(config: SinkConfig) -> Arc<dyn NotificationSink> {
    match config {
        SinkConfig::Email(cfg) => Arc::new(EmailSink::new(cfg)),
        SinkConfig::Webhook(cfg) => Arc::new(WebhookSink::new(cfg)),
        SinkConfig::Chat(cfg) => Arc::new(ChatSink::new(cfg)),
    }
}

/// JSON payload posted by the webhook sink.
pub(crate) fn alert_payload(alert: &Alert) -> serde_json::Value {
    serde_json::json!({
        "id": alert.id,
        "title": alert.title,
        "description": alert.description,
        "metric": alert.metric,
        "value": alert.value,
        "threshold": alert.threshold,
        "comparator": alert.comparator.to_string(),
        "severity": alert.severity.to_string(),
        "raised_at": alert.raised_at,
    })
}

/// Formatted single-line message for chat channels.
pub(crate) fn chat_text(alert: &Alert) -> String {
    format!(
        ":rotating_light: [{}] {}: {} is {} (threshold {} {})",
        alert.severity, alert.title, alert.metric, alert.value, alert.comparator, alert.threshold,
    )
}

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

const RETRY_DELAYS_SECS: [u64; 3] = [1, 2, 4];

async fn post_json_with_retries(
    client: &reqwest::Client,
    sink: &str,
    url: &str,
    headers: &HashMap<String, String>,
    payload: &serde_json::Value,
) -> Result<()> {
    let mut last_error = String::new();

    for (attempt, &delay_secs) in RETRY_DELAYS_SECS.iter().enumerate() {
        let mut request = client.post(url).json(payload);
        for (key, value) in headers {
            request = request.header(key, value);
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => {
                debug!(sink, attempt = attempt + 1, "notification delivered");
                return Ok(());
            }
            Ok(response) => {
                last_error = format!("HTTP {}", response.status());
            }
            Err(e) => {
                last_error = e.to_string();
            }
        }

        warn!(
            sink,
            attempt = attempt + 1,
            delay_secs,
            error = %last_error,
            "notification delivery failed, retrying"
        );
        tokio::time::sleep(Duration::from_secs(delay_secs)).await;
    }

    Err(ObservabilityError::SinkDelivery {
        sink: sink.to_string(),
        reason: last_error,
    })
}

/// POSTs the alert payload to a configured URL.
pub struct WebhookSink {
    config: WebhookConfig,
    client: reqwest::Client,
}

impl WebhookSink {
    pub fn new(config: WebhookConfig) -> Self {
        Self {
            config,
            client: http_client(),
        }
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn notify(&self, alert: &Alert) -> Result<()> {
        let payload = alert_payload(alert);
        post_json_with_retries(
            &self.client,
            self.name(),
            &self.config.url,
            &self.config.headers,
            &payload,
        )
        .await
    }
}

/// Posts a formatted message to a chat channel webhook.
pub struct ChatSink {
    config: ChatConfig,
    client: reqwest::Client,
}

impl ChatSink {
    pub fn new(config: ChatConfig) -> Self {
        Self {
            config,
            client: http_client(),
        }
    }
}

#[async_trait]
impl NotificationSink for ChatSink {
    fn name(&self) -> &str {
        "chat"
    }

    async fn notify(&self, alert: &Alert) -> Result<()> {
        let mut payload = serde_json::json!({ "text": chat_text(alert) });
        if let Some(channel) = &self.config.channel {
            payload["channel"] = serde_json::Value::String(channel.clone());
        }
        post_json_with_retries(
            &self.client,
            self.name(),
            &self.config.webhook_url,
            &HashMap::new(),
            &payload,
        )
        .await
    }
}

/// A rendered email notification.
#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

/// Transport seam for email delivery.
///
/// The embedding application injects a real SMTP transport; the default
/// only logs the rendered message.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Default transport: logs the message instead of sending it.
pub struct LogMailTransport;

#[async_trait]
impl MailTransport for LogMailTransport {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            to = ?message.to,
            subject = %message.subject,
            "email notification (no transport configured)"
        );
        Ok(())
    }
}

/// Sends alert emails through a [`MailTransport`].
pub struct EmailSink {
    config: EmailConfig,
    transport: Arc<dyn MailTransport>,
}

impl EmailSink {
    pub fn new(config: EmailConfig) -> Self {
        Self::with_transport(config, Arc::new(LogMailTransport))
    }

    pub fn with_transport(config: EmailConfig, transport: Arc<dyn MailTransport>) -> Self {
        Self { config, transport }
    }

    fn render(&self, alert: &Alert) -> EmailMessage {
        let prefix = self.config.subject_prefix.as_deref().unwrap_or("[alert]");
        EmailMessage {
            from: self.config.from.clone(),
            to: self.config.to.clone(),
            subject: format!("{} {} ({})", prefix, alert.title, alert.severity),
            body: format!(
                "{}\n\nmetric: {}\nvalue: {}\nthreshold: {} {}\nraised at: {}\n",
                alert.description,
                alert.metric,
                alert.value,
                alert.comparator,
                alert.threshold,
                alert.raised_at.to_rfc3339(),
            ),
        }
    }
}

#[async_trait]
impl NotificationSink for EmailSink {
    fn name(&self) -> &str {
        "email"
    }

    async fn notify(&self, alert: &Alert) -> Result<()> {
        let message = self.render(alert);
        self.transport.send(&message).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::rule::{AlertComparator, AlertRule, AlertSeverity};

    fn sample_alert() -> Alert {
        let rule = AlertRule::new(
            "cpu_percent",
            80.0,
            AlertComparator::GreaterThan,
            AlertSeverity::High,
            "High CPU",
            "CPU at {value}%",
        );
        Alert::raise(&rule, 91.0)
    }

    #[test]
    fn sink_config_parses_tagged_kinds() {
        let config: SinkConfig = serde_json::from_value(serde_json::json!({
            "kind": "webhook",
            "url": "https://ops.example.com/hooks/alerts",
            "headers": {"authorization": "Bearer token"}
        }))
        .unwrap();
        assert!(matches!(config, SinkConfig::Webhook(_)));
    }

    #[test]
    fn unrecognized_config_keys_are_ignored() {
        let config: SinkConfig = serde_json::from_value(serde_json::json!({
            "kind": "chat",
            "webhook_url": "https://chat.example.com/hooks/x",
            "channel": "#ops",
            "emoji": ":fire:",
            "retries": 9
        }))
        .unwrap();
        let SinkConfig::Chat(chat) = config else {
            panic!("expected chat config");
        };
        assert_eq!(chat.channel.as_deref(), Some("#ops"));
    }

    #[test]
    fn email_port_defaults_when_absent() {
        let config: SinkConfig = serde_json::from_value(serde_json::json!({
            "kind": "email",
            "smtp_host": "mail.example.com",
            "from": "alerts@example.com",
            "to": ["ops@example.com"]
        }))
        .unwrap();
        let SinkConfig::Email(email) = config else {
            panic!("expected email config");
        };
        assert_eq!(email.smtp_port, 587);
    }

    #[test]
    fn webhook_payload_carries_alert_fields() {
        let alert = sample_alert();
        let payload = alert_payload(&alert);
        assert_eq!(payload["metric"], "cpu_percent");
        assert_eq!(payload["value"], 91.0);
        assert_eq!(payload["severity"], "high");
        assert_eq!(payload["comparator"], ">");
    }

    #[test]
    fn chat_text_mentions_metric_and_threshold() {
        let text = chat_text(&sample_alert());
        assert!(text.contains("cpu_percent"));
        assert!(text.contains("80"));
        assert!(text.contains("high"));
    }

    #[tokio::test]
    async fn email_sink_renders_and_sends_through_transport() {
        struct Capture(parking_lot::Mutex<Vec<EmailMessage>>);

        #[async_trait]
        impl MailTransport for Capture {
            async fn send(&self, message: &EmailMessage) -> Result<()> {
                self.0.lock().push(message.clone());
                Ok(())
            }
        }

        let transport = Arc::new(Capture(parking_lot::Mutex::new(Vec::new())));
        let sink = EmailSink::with_transport(
            EmailConfig {
                smtp_host: "mail.example.com".to_string(),
                smtp_port: 587,
                from: "alerts@example.com".to_string(),
                to: vec!["ops@example.com".to_string()],
                subject_prefix: None,
            },
            transport.clone(),
        );

        sink.notify(&sample_alert()).await.unwrap();

        let sent = transport.0.lock();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].subject.contains("High CPU"));
        assert!(sent[0].body.contains("cpu_percent"));
    }
}
