//! Slack webhook notification channel (operator feed).

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::ChannelError;
use crate::events::NotifyEvent;
use crate::NotifyChannel;

/// Environment variable for Slack webhook URL.
const ENV_SLACK_WEBHOOK_URL: &str = "SLACK_WEBHOOK_URL";

/// Maximum number of run errors listed in a summary attachment.
const MAX_LISTED_ERRORS: usize = 10;

/// Slack webhook notification channel.
pub struct SlackChannel {
    webhook_url: Option<String>,
    client: reqwest::Client,
}

impl SlackChannel {
    /// Create a new Slack channel from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let webhook_url = std::env::var(ENV_SLACK_WEBHOOK_URL)
            .ok()
            .filter(|s| !s.is_empty());

        if webhook_url.is_some() {
            debug!("Slack notifications enabled");
        } else {
            debug!("Slack notifications disabled (SLACK_WEBHOOK_URL not set)");
        }

        Self {
            webhook_url,
            client: reqwest::Client::new(),
        }
    }

    /// Create a Slack channel with a specific webhook URL.
    #[must_use]
    pub fn new(webhook_url: String) -> Self {
        Self {
            webhook_url: Some(webhook_url),
            client: reqwest::Client::new(),
        }
    }

    /// Format an event as a Slack webhook payload.
    fn format_payload(event: &NotifyEvent) -> SlackPayload {
        let fields = Self::format_fields(event)
            .into_iter()
            .map(|(title, value)| SlackField {
                title,
                value,
                short: true,
            })
            .collect();

        let attachment = SlackAttachment {
            fallback: event.title(),
            color: event.severity().color().to_string(),
            author_name: Some("Reservation Sync".to_string()),
            title: event.title(),
            text: Self::format_description(event),
            fields,
            footer: Some(format!(
                "{} | {}",
                event.severity().as_str(),
                event.timestamp().format("%Y-%m-%d %H:%M:%S UTC")
            )),
            ts: Some(event.timestamp().timestamp()),
        };

        SlackPayload {
            attachments: vec![attachment],
        }
    }

    /// Format the description for an event.
    fn format_description(event: &NotifyEvent) -> String {
        match event {
            NotifyEvent::TaskCancelled {
                property_name,
                date,
                ..
            } => {
                format!("The cleaning at *{property_name}* on `{date}` was cancelled because the booking is no longer active")
            }

            NotifyEvent::ScheduleChanged {
                property_name,
                previous_date,
                new_date,
                ..
            } => {
                format!("The cleaning at *{property_name}* moved from `{previous_date}` to `{new_date}`")
            }

            NotifyEvent::SyncSummary { errors, .. } => {
                if errors.is_empty() {
                    "Run finished without errors".to_string()
                } else {
                    let mut text = format!("Run finished with {} error(s):", errors.len());
                    for error in errors.iter().take(MAX_LISTED_ERRORS) {
                        text.push_str("\n• ");
                        text.push_str(error);
                    }
                    if errors.len() > MAX_LISTED_ERRORS {
                        text.push_str(&format!(
                            "\n… and {} more",
                            errors.len() - MAX_LISTED_ERRORS
                        ));
                    }
                    text
                }
            }
        }
    }

    /// Format additional fields for an event.
    fn format_fields(event: &NotifyEvent) -> Vec<(String, String)> {
        match event {
            NotifyEvent::TaskCancelled {
                cleaner_id,
                task_id,
                reservation_id,
                ..
            }
            | NotifyEvent::ScheduleChanged {
                cleaner_id,
                task_id,
                reservation_id,
                ..
            } => {
                let mut fields = vec![
                    ("Cleaner".to_string(), cleaner_id.clone()),
                    ("Task ID".to_string(), task_id.clone()),
                ];
                if let Some(reservation_id) = reservation_id {
                    fields.push(("Reservation".to_string(), reservation_id.clone()));
                }
                fields
            }

            NotifyEvent::SyncSummary {
                run_id,
                processed,
                created,
                updated,
                cancelled,
                ..
            } => vec![
                ("Run".to_string(), run_id.clone()),
                ("Processed".to_string(), processed.to_string()),
                ("Created".to_string(), created.to_string()),
                ("Updated".to_string(), updated.to_string()),
                ("Cancelled".to_string(), cancelled.to_string()),
            ],
        }
    }
}

#[async_trait]
impl NotifyChannel for SlackChannel {
    fn name(&self) -> &'static str {
        "slack"
    }

    fn enabled(&self) -> bool {
        self.webhook_url.is_some()
    }

    async fn send(&self, event: &NotifyEvent) -> Result<(), ChannelError> {
        let webhook_url = self
            .webhook_url
            .as_ref()
            .ok_or_else(|| ChannelError::NotConfigured(ENV_SLACK_WEBHOOK_URL.to_string()))?;

        let payload = Self::format_payload(event);

        debug!(channel = "slack", event_type = ?event.title(), "Sending notification");

        let response = self.client.post(webhook_url).json(&payload).send().await?;
        let status = response.status();

        if status.is_success() {
            debug!(channel = "slack", "Notification sent successfully");
            return Ok(());
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(1);
            return Err(ChannelError::RateLimited { retry_after_secs });
        }

        let body = response.text().await.unwrap_or_default();
        warn!(
            channel = "slack",
            status = %status,
            body = %body,
            "Slack webhook request failed"
        );

        Err(ChannelError::Rejected {
            channel: "slack",
            status: status.as_u16(),
            body,
        })
    }
}

// =============================================================================
// Slack API types
// =============================================================================

#[derive(Debug, Serialize)]
struct SlackPayload {
    attachments: Vec<SlackAttachment>,
}

#[derive(Debug, Serialize)]
struct SlackAttachment {
    fallback: String,
    color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    author_name: Option<String>,
    title: String,
    text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    fields: Vec<SlackField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    footer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ts: Option<i64>,
}

#[derive(Debug, Serialize)]
struct SlackField {
    title: String,
    value: String,
    short: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    #[test]
    fn test_summary_lists_errors() {
        let event = NotifyEvent::SyncSummary {
            run_id: "run-1".to_string(),
            status: "completed".to_string(),
            processed: 3,
            created: 1,
            updated: 0,
            cancelled: 0,
            errors: vec!["listing 99 not mapped".to_string()],
            timestamp: Utc::now(),
        };

        let payload = SlackChannel::format_payload(&event);
        let attachment = &payload.attachments[0];
        assert!(attachment.text.contains("1 error(s)"));
        assert!(attachment.text.contains("listing 99 not mapped"));
        assert_eq!(attachment.color, "#f39c12");
        assert_eq!(attachment.fields.len(), 5);
    }

    #[test]
    fn test_summary_truncates_long_error_lists() {
        let errors: Vec<String> = (0..15).map(|i| format!("error {i}")).collect();
        let event = NotifyEvent::SyncSummary {
            run_id: "run-2".to_string(),
            status: "completed".to_string(),
            processed: 15,
            created: 0,
            updated: 0,
            cancelled: 0,
            errors,
            timestamp: Utc::now(),
        };

        let text = SlackChannel::format_description(&event);
        assert!(text.contains("error 9"));
        assert!(!text.contains("error 10"));
        assert!(text.contains("and 5 more"));
    }

    #[test]
    fn test_cancellation_fields_include_reservation() {
        let event = NotifyEvent::TaskCancelled {
            cleaner_id: "cleaner-7".to_string(),
            task_id: "task-1".to_string(),
            property_name: "Apt Centro".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 6, 5).unwrap(),
            reservation_id: Some("501".to_string()),
            timestamp: Utc::now(),
        };

        let fields = SlackChannel::format_fields(&event);
        assert!(fields.contains(&("Reservation".to_string(), "501".to_string())));
    }
}
