//! Generic JSON webhook channel for the messaging service.
//!
//! The messaging service owns cleaner contact details; this channel posts the
//! raw event together with its recipient and lets the service route it.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::ChannelError;
use crate::events::NotifyEvent;
use crate::NotifyChannel;

/// Environment variable for the messaging webhook URL.
const ENV_MESSAGING_WEBHOOK_URL: &str = "MESSAGING_WEBHOOK_URL";

/// Environment variable for the optional messaging bearer token.
const ENV_MESSAGING_TOKEN: &str = "MESSAGING_TOKEN";

/// Messaging-service webhook channel.
pub struct WebhookChannel {
    url: Option<String>,
    token: Option<String>,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct WebhookEnvelope<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    recipient: Option<&'a str>,
    title: String,
    severity: &'static str,
    event: &'a NotifyEvent,
}

impl WebhookChannel {
    /// Create a new webhook channel from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let url = std::env::var(ENV_MESSAGING_WEBHOOK_URL)
            .ok()
            .filter(|s| !s.is_empty());
        let token = std::env::var(ENV_MESSAGING_TOKEN)
            .ok()
            .filter(|s| !s.is_empty());

        if url.is_none() {
            debug!("Messaging webhook disabled (MESSAGING_WEBHOOK_URL not set)");
        }

        Self {
            url,
            token,
            client: reqwest::Client::new(),
        }
    }

    /// Create a webhook channel posting to `url`.
    #[must_use]
    pub fn new(url: String, token: Option<String>) -> Self {
        Self {
            url: Some(url),
            token,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl NotifyChannel for WebhookChannel {
    fn name(&self) -> &'static str {
        "webhook"
    }

    fn enabled(&self) -> bool {
        self.url.is_some()
    }

    async fn send(&self, event: &NotifyEvent) -> Result<(), ChannelError> {
        let url = self
            .url
            .as_ref()
            .ok_or_else(|| ChannelError::NotConfigured(ENV_MESSAGING_WEBHOOK_URL.to_string()))?;

        let envelope = WebhookEnvelope {
            recipient: event.recipient(),
            title: event.title(),
            severity: event.severity().as_str(),
            event,
        };

        let mut request = self.client.post(url).json(&envelope);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            debug!(channel = "webhook", recipient = ?event.recipient(), "Notification delivered");
            return Ok(());
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ChannelError::RateLimited { retry_after_secs: 1 });
        }

        let body = response.text().await.unwrap_or_default();
        warn!(channel = "webhook", status = %status, "Messaging webhook rejected notification");

        Err(ChannelError::Rejected {
            channel: "webhook",
            status: status.as_u16(),
            body,
        })
    }
}
