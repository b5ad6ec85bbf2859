//! Alerting module for webhook notifications
//!
//! This module provides asynchronous alert dispatching to Slack and
//! generic webhooks when a source IP crosses an abuse threshold.

use crate::config::{AlertConfig, SlackConfig, WebhookConfig};
use crate::models::AbuseAlert;
use reqwest::Client;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors that can occur during alert dispatch
#[derive(Error, Debug)]
pub enum AlertError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Alert channel closed")]
    ChannelClosed,
}

/// Async alert dispatcher
///
/// Runs as a tokio task, receiving abuse alerts from a channel and
/// posting them to the configured notification channels.
pub struct AlertDispatcher {
    config: AlertConfig,
    client: Client,
}

impl AlertDispatcher {
    /// Create a new alert dispatcher with the given configuration
    pub fn new(config: AlertConfig) -> Self {
        AlertDispatcher {
            config,
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
        }
    }

    /// Create the channel alerts are queued on
    pub fn create_channel() -> (mpsc::Sender<AbuseAlert>, mpsc::Receiver<AbuseAlert>) {
        mpsc::channel(100)
    }

    /// Run the alert dispatch loop
    ///
    /// Receives alerts from the channel and dispatches each to all
    /// configured channels until the sending side is dropped.
    pub async fn run(self, mut rx: mpsc::Receiver<AbuseAlert>) {
        log::info!("Alert dispatcher started");

        while let Some(alert) = rx.recv().await {
            if !self.config.enabled {
                continue;
            }

            if alert.severity < self.config.min_severity {
                log::debug!(
                    "Skipping alert for {} (severity {} < min {})",
                    alert.source_ip,
                    alert.severity,
                    self.config.min_severity
                );
                continue;
            }

            log::info!(
                "Dispatching alert: {} for {} (severity {})",
                alert.rule_name,
                alert.source_ip,
                alert.severity
            );

            if let Err(e) = self.dispatch_alert(&alert).await {
                log::error!("Failed to dispatch alert: {}", e);
            }
        }

        log::info!("Alert dispatcher stopped");
    }

    /// Dispatch an alert to all configured channels
    async fn dispatch_alert(&self, alert: &AbuseAlert) -> Result<(), AlertError> {
        let mut errors = Vec::new();

        if let Some(ref slack) = self.config.slack {
            if let Err(e) = self.send_slack_alert(slack, alert).await {
                log::error!("Slack alert failed: {}", e);
                errors.push(e);
            }
        }

        for webhook in &self.config.webhooks {
            if let Err(e) = self.send_generic_webhook(webhook, alert).await {
                log::error!("Webhook {} failed: {}", webhook.name, e);
                errors.push(e);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            // Return the first error (could be improved to aggregate)
            Err(errors.remove(0))
        }
    }

    /// Send an alert to Slack
    async fn send_slack_alert(
        &self,
        config: &SlackConfig,
        alert: &AbuseAlert,
    ) -> Result<(), AlertError> {
        let severity_emoji = match alert.severity {
            10 => ":rotating_light:",
            9 => ":warning:",
            8 => ":exclamation:",
            _ => ":information_source:",
        };

        let color = match alert.severity {
            10 | 9 => "danger",
            8 | 7 => "warning",
            _ => "good",
        };

        let payload = serde_json::json!({
            "channel": config.channel,
            "username": config.username.as_deref().unwrap_or("Heimdall"),
            "icon_emoji": ":shield:",
            "attachments": [{
                "color": color,
                "title": format!("{} {}", severity_emoji, alert.rule_name),
                "fields": [
                    { "title": "Source IP", "value": &alert.source_ip, "short": true },
                    { "title": "Severity", "value": alert.severity.to_string(), "short": true },
                    { "title": "Count", "value": alert.observed_count.to_string(), "short": true },
                    { "title": "Threshold", "value": alert.threshold.to_string(), "short": true },
                ],
                "text": &alert.description,
                "ts": alert.latest.timestamp(),
            }]
        });

        let response = self
            .client
            .post(&config.webhook_url)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            log::warn!("Slack returned non-success status: {}", response.status());
        }

        Ok(())
    }

    /// Send an alert to a generic webhook
    async fn send_generic_webhook(
        &self,
        config: &WebhookConfig,
        alert: &AbuseAlert,
    ) -> Result<(), AlertError> {
        let method = config.method.as_deref().unwrap_or("POST");

        let mut request = match method.to_uppercase().as_str() {
            "PUT" => self.client.put(&config.url),
            _ => self.client.post(&config.url),
        };

        if let Some(ref headers) = config.headers {
            for (key, value) in headers {
                request = request.header(key, value);
            }
        }

        let response = request.json(alert).send().await?;

        if !response.status().is_success() {
            log::warn!(
                "Webhook {} returned non-success status: {}",
                config.name,
                response.status()
            );
        }

        Ok(())
    }
}

/// Synchronous alert queue for use in sync code
///
/// This wrapper provides a sync-friendly interface to queue alerts
/// that will be dispatched by the async AlertDispatcher.
#[derive(Clone)]
pub struct AlertQueue {
    tx: mpsc::Sender<AbuseAlert>,
}

impl AlertQueue {
    /// Create a new alert queue with the given sender
    pub fn new(tx: mpsc::Sender<AbuseAlert>) -> Self {
        AlertQueue { tx }
    }

    /// Queue an alert for dispatch (non-blocking)
    ///
    /// Uses try_send to avoid blocking. If the queue is full, the alert
    /// is dropped and a warning logged.
    pub fn queue_alert(&self, alert: AbuseAlert) {
        if let Err(e) = self.tx.try_send(alert) {
            match e {
                mpsc::error::TrySendError::Full(_) => {
                    log::warn!("Alert queue full, dropping alert");
                }
                mpsc::error::TrySendError::Closed(_) => {
                    log::warn!("Alert queue closed");
                }
            }
        }
    }

    /// Queue an alert (async version)
    pub async fn queue_alert_async(&self, alert: AbuseAlert) -> Result<(), AlertError> {
        self.tx
            .send(alert)
            .await
            .map_err(|_| AlertError::ChannelClosed)
    }

    /// Check if the queue is closed
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
