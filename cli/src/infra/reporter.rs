//! Infrastructure implementations of the `StatusReporter` port.
//!
//! Delivery is best-effort: failures are logged at `warn` and swallowed so a
//! lifecycle operation never fails because the system of record is down.

use std::time::Duration;

use anyhow::{Context, Result};
use berth_common::{OfflineAlert, StatusEvent};
use serde::Serialize;

use crate::application::ports::StatusReporter;
use crate::domain::config::ReporterConfig;

/// Body POSTed to the webhook, tagged with `"type"`.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WebhookPayload<'a> {
    Status(&'a StatusEvent),
    Alert(&'a OfflineAlert),
}

// ── Webhook ───────────────────────────────────────────────────────────────────

/// POSTs JSON to the system of record, with an optional bearer token.
pub struct WebhookReporter {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl WebhookReporter {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(url: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client for status webhook")?;
        Ok(Self {
            client,
            url: url.to_string(),
            token,
        })
    }

    async fn post(&self, payload: &WebhookPayload<'_>) {
        let mut request = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(payload);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        match request.send().await {
            Ok(response) if response.status().is_success() => {
                tracing::debug!(url = %self.url, "status delivered");
            }
            Ok(response) => {
                tracing::warn!(url = %self.url, status = %response.status(), "status webhook rejected event");
            }
            Err(err) => {
                tracing::warn!(url = %self.url, error = %err, "status webhook unreachable");
            }
        }
    }
}

impl StatusReporter for WebhookReporter {
    async fn notify(&self, event: StatusEvent) {
        self.post(&WebhookPayload::Status(&event)).await;
    }

    async fn alert(&self, alert: OfflineAlert) {
        self.post(&WebhookPayload::Alert(&alert)).await;
    }
}

// ── Log only ──────────────────────────────────────────────────────────────────

/// Used when no webhook is configured: transitions only go to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl StatusReporter for TracingReporter {
    async fn notify(&self, event: StatusEvent) {
        tracing::info!(
            agent_id = %event.agent_id,
            state = %event.state,
            address = event.address.as_deref().unwrap_or(""),
            "status transition"
        );
    }

    async fn alert(&self, alert: OfflineAlert) {
        tracing::error!(
            agent_id = %alert.agent_id,
            host = %alert.host_address,
            failures = alert.consecutive_failures,
            reason = %alert.reason,
            "agent offline after automatic restart failed"
        );
    }
}

// ── Backend selection ─────────────────────────────────────────────────────────

pub enum ReporterBackend {
    Webhook(WebhookReporter),
    Log(TracingReporter),
}

impl ReporterBackend {
    /// Webhook if `webhook_url` is set, log-only otherwise. The bearer token
    /// is read from the environment variable named by `token_env`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &ReporterConfig) -> Result<Self> {
        match config.webhook_url.as_deref().filter(|u| !u.is_empty()) {
            Some(url) => {
                let token = std::env::var(&config.token_env)
                    .ok()
                    .filter(|t| !t.is_empty());
                Ok(ReporterBackend::Webhook(WebhookReporter::new(
                    url,
                    token,
                    Duration::from_secs(config.timeout_secs),
                )?))
            }
            None => Ok(ReporterBackend::Log(TracingReporter)),
        }
    }
}

impl StatusReporter for ReporterBackend {
    async fn notify(&self, event: StatusEvent) {
        match self {
            ReporterBackend::Webhook(r) => r.notify(event).await,
            ReporterBackend::Log(r) => r.notify(event).await,
        }
    }

    async fn alert(&self, alert: OfflineAlert) {
        match self {
            ReporterBackend::Webhook(r) => r.alert(alert).await,
            ReporterBackend::Log(r) => r.alert(alert).await,
        }
    }
}

// ── Unit tests ────────────────────────────────────────────────────────────────
