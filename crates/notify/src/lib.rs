//! Notification system for the reservation sync platform.
//!
//! This crate is the boundary to the messaging service. It delivers
//! cleaner-facing notices (a task was cancelled or moved) and the
//! operator-facing end-of-run summary.
//!
//! # Usage
//!
//! ```no_run
//! use notify::{Notifier, NotifyEvent};
//!
//! # async fn example() {
//! let notifier = Notifier::from_env();
//!
//! let event = NotifyEvent::SyncSummary {
//!     run_id: "run-42".to_string(),
//!     status: "completed".to_string(),
//!     processed: 12,
//!     created: 2,
//!     updated: 1,
//!     cancelled: 0,
//!     errors: vec![],
//!     timestamp: chrono::Utc::now(),
//! };
//!
//! if let Err(e) = notifier.deliver(&event).await {
//!     eprintln!("summary not delivered: {e}");
//! }
//! # }
//! ```
//!
//! # Configuration
//!
//! - `SLACK_WEBHOOK_URL`: Slack webhook URL (operator channel)
//! - `MESSAGING_WEBHOOK_URL`: messaging service webhook (routes to cleaners)
//! - `MESSAGING_TOKEN`: optional bearer token for the messaging webhook
//! - `NOTIFY_DISABLED`: Set to "true" to disable all notifications

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod channels;
pub mod error;
pub mod events;

pub use channels::slack::SlackChannel;
pub use channels::webhook::WebhookChannel;
pub use channels::NotifyChannel;
pub use error::ChannelError;
pub use events::{NotifyEvent, Severity};

use std::sync::Arc;
use tracing::{debug, info, warn};

/// Environment variable to disable all notifications.
const ENV_NOTIFY_DISABLED: &str = "NOTIFY_DISABLED";

/// Central notification dispatcher.
///
/// Delivery is synchronous: callers await the outcome so they can retry a
/// failed send or record it.
pub struct Notifier {
    channels: Vec<Arc<dyn NotifyChannel>>,
    disabled: bool,
}

impl Notifier {
    /// Create a new notifier from environment variables.
    ///
    /// This will auto-detect which channels are configured based on
    /// environment variables and enable them accordingly.
    #[must_use]
    pub fn from_env() -> Self {
        let disabled = std::env::var(ENV_NOTIFY_DISABLED)
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(false);

        if disabled {
            info!("Notifications disabled via NOTIFY_DISABLED");
            return Self::disabled();
        }

        let mut channels: Vec<Arc<dyn NotifyChannel>> = vec![];

        let slack = SlackChannel::from_env();
        if slack.enabled() {
            info!("Slack notifications enabled");
            channels.push(Arc::new(slack));
        }

        let webhook = WebhookChannel::from_env();
        if webhook.enabled() {
            info!("Messaging webhook notifications enabled");
            channels.push(Arc::new(webhook));
        }

        if channels.is_empty() {
            warn!("No notification channels configured");
        } else {
            info!(
                channel_count = channels.len(),
                "Notification system initialized"
            );
        }

        Self {
            channels,
            disabled: false,
        }
    }

    /// Create a notifier with specific channels.
    #[must_use]
    pub fn with_channels(channels: Vec<Arc<dyn NotifyChannel>>) -> Self {
        Self {
            channels,
            disabled: false,
        }
    }

    /// Create a disabled notifier (for testing or when notifications are off).
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            channels: vec![],
            disabled: true,
        }
    }

    /// Check if any notification channels are enabled.
    #[must_use]
    pub fn has_channels(&self) -> bool {
        !self.disabled && !self.channels.is_empty()
    }

    /// Get the number of enabled channels.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        if self.disabled {
            0
        } else {
            self.channels.len()
        }
    }

    /// Send an event to every enabled channel, one after another, and
    /// collect the per-channel results.
    pub async fn send_all(
        &self,
        event: &NotifyEvent,
    ) -> Vec<(&'static str, Result<(), ChannelError>)> {
        if !self.has_channels() {
            debug!("No active channels, skipping event");
            return vec![];
        }

        let mut results = Vec::with_capacity(self.channels.len());
        for channel in self.channels.iter().filter(|c| c.enabled()) {
            let result = channel.send(event).await;
            if result.is_ok() {
                debug!(channel = channel.name(), "Notification sent");
            }
            results.push((channel.name(), result));
        }

        results
    }

    /// Deliver an event to every enabled channel and fail if any channel did.
    ///
    /// A notifier with no active channels delivers trivially. When several
    /// channels fail, the first error is returned and the rest are logged.
    pub async fn deliver(&self, event: &NotifyEvent) -> Result<(), ChannelError> {
        let mut first_error = None;

        for (channel, result) in self.send_all(event).await {
            if let Err(e) = result {
                warn!(channel, error = %e, "Notification delivery failed");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }

        first_error.map_or(Ok(()), Err)
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{NaiveDate, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingChannel {
        sent: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl NotifyChannel for CountingChannel {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn enabled(&self) -> bool {
            true
        }

        async fn send(&self, _event: &NotifyEvent) -> Result<(), ChannelError> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(ChannelError::Other("boom".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn cancelled_event() -> NotifyEvent {
        NotifyEvent::TaskCancelled {
            cleaner_id: "cleaner-1".to_string(),
            task_id: "task-1".to_string(),
            property_name: "Apt Centro".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 6, 5).unwrap(),
            reservation_id: Some("501".to_string()),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_disabled_notifier() {
        let notifier = Notifier::disabled();
        assert!(!notifier.has_channels());
        assert_eq!(notifier.channel_count(), 0);
    }

    #[test]
    fn test_event_titles() {
        assert_eq!(
            cancelled_event().title(),
            "Cleaning Cancelled: Apt Centro on 2024-06-05"
        );

        let event = NotifyEvent::SyncSummary {
            run_id: "r".to_string(),
            status: "completed".to_string(),
            processed: 0,
            created: 0,
            updated: 0,
            cancelled: 0,
            errors: vec![],
            timestamp: Utc::now(),
        };
        assert_eq!(event.title(), "Reservation Sync completed");
        assert_eq!(event.severity(), Severity::Info);
        assert!(event.recipient().is_none());
    }

    #[test]
    fn test_recipient_is_cleaner() {
        assert_eq!(cancelled_event().recipient(), Some("cleaner-1"));
    }

    #[tokio::test]
    async fn test_deliver_without_channels_succeeds() {
        let notifier = Notifier::disabled();
        assert!(notifier.deliver(&cancelled_event()).await.is_ok());
    }

    #[tokio::test]
    async fn test_deliver_reports_channel_failure() {
        let ok = Arc::new(CountingChannel {
            sent: AtomicUsize::new(0),
            fail: false,
        });
        let failing = Arc::new(CountingChannel {
            sent: AtomicUsize::new(0),
            fail: true,
        });
        let channels: Vec<Arc<dyn NotifyChannel>> = vec![ok.clone(), failing.clone()];
        let notifier = Notifier::with_channels(channels);

        let result = notifier.deliver(&cancelled_event()).await;

        assert!(result.is_err());
        assert_eq!(ok.sent.load(Ordering::SeqCst), 1);
        assert_eq!(failing.sent.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_send_all_reports_each_channel() {
        let ok = Arc::new(CountingChannel {
            sent: AtomicUsize::new(0),
            fail: false,
        });
        let failing = Arc::new(CountingChannel {
            sent: AtomicUsize::new(0),
            fail: true,
        });
        let channels: Vec<Arc<dyn NotifyChannel>> = vec![ok, failing];
        let results = Notifier::with_channels(channels)
            .send_all(&cancelled_event())
            .await;

        assert_eq!(results.len(), 2);
        assert!(results[0].1.is_ok());
        assert!(results[1].1.is_err());
    }
}
