use anyhow::{Result, anyhow};
use std::time::Duration;
use tracing::{info, warn};

use super::Alert;

/// Delivery backend for rendered alerts
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, alert: &Alert) -> Result<()>;
}

/// Writes alerts to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, alert: &Alert) -> Result<()> {
        match alert.kind.category() {
            super::AlertCategory::GroupOutage => {
                warn!(request_id = %alert.request_id, "{}: {}", alert.title, alert.body)
            }
            super::AlertCategory::ServiceDown => {
                info!(request_id = %alert.request_id, "{}: {}", alert.title, alert.body)
            }
        }
        Ok(())
    }
}

/// Posts alerts as JSON to a webhook
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url: url.into() })
    }
}

#[async_trait::async_trait]
impl Notifier for WebhookNotifier {
    async fn deliver(&self, alert: &Alert) -> Result<()> {
        let payload = serde_json::json!({
            "username": "isitup",
            "request_id": alert.request_id,
            "category": alert.category,
            "actions": alert.category.actions(),
            "title": alert.title,
            "body": alert.body,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| anyhow!("Webhook request failed: {}", e))?;

        response
            .error_for_status()
            .map_err(|e| anyhow!("Webhook rejected alert: {}", e))?;
        Ok(())
    }
}
