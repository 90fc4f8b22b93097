//! HTTP client for the channel-manager reservation API.

use std::collections::HashSet;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, info, instrument, warn};

use super::wire::{ListResponse, TokenResponse, WireReservation};
use super::{FeedBatch, ReservationFeed};
use crate::config::FeedConfig;
use crate::error::FeedError;
use crate::models::{ExternalReservation, SyncWindow};
use crate::retry::{RetryError, RetryPolicy};

/// Hard stop for pagination in case the feed keeps returning full pages.
const MAX_PAGES: u32 = 500;

/// Reservation feed backed by the channel-manager REST API.
#[derive(Debug, Clone)]
pub struct HttpFeedClient {
    client: Client,
    config: FeedConfig,
    retry: RetryPolicy,
}

impl HttpFeedClient {
    /// Create a new feed client.
    ///
    /// # Errors
    ///
    /// Returns an error if no credentials are configured or the HTTP client
    /// cannot be built.
    pub fn new(config: FeedConfig, retry: RetryPolicy) -> Result<Self, FeedError> {
        if !config.has_credentials() {
            return Err(FeedError::Config(
                "set FEED_API_TOKEN or FEED_CLIENT_ID and FEED_CLIENT_SECRET".to_string(),
            ));
        }

        let client = Client::builder()
            .user_agent(concat!("reservation-sync/", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            config,
            retry,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    /// Obtain a bearer token, either the configured one or via client credentials.
    async fn access_token(&self) -> Result<String, RetryError<FeedError>> {
        if let Some(token) = &self.config.api_token {
            return Ok(token.clone());
        }

        self.retry
            .execute("feed authentication", || self.request_token())
            .await
    }

    async fn request_token(&self) -> Result<String, FeedError> {
        let (Some(client_id), Some(client_secret)) =
            (&self.config.client_id, &self.config.client_secret)
        else {
            return Err(FeedError::Config("missing client credentials".to_string()));
        };

        let response = self
            .client
            .post(self.url("/v1/accessTokens"))
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
                ("scope", "general"),
            ])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            return Err(FeedError::Auth(format!("{status}: {body}")));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(FeedError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| FeedError::Auth(format!("unreadable token response: {e}")))?;
        debug!("Obtained feed access token");
        Ok(token.access_token)
    }

    /// Fetch one raw page of reservation entries.
    async fn fetch_page(
        &self,
        token: &str,
        window: SyncWindow,
        offset: u32,
    ) -> Result<Vec<serde_json::Value>, FeedError> {
        let start = window.start.format("%Y-%m-%d").to_string();
        let end = window.end.format("%Y-%m-%d").to_string();
        let limit = self.config.page_size.to_string();
        let offset = offset.to_string();

        let response = self
            .client
            .get(self.url("/v1/reservations"))
            .bearer_auth(token)
            .query(&[
                ("departureStartDate", start.as_str()),
                ("departureEndDate", end.as_str()),
                ("limit", limit.as_str()),
                ("offset", offset.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(FeedError::Auth(format!("reservation listing returned {status}")));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(FeedError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        let page: ListResponse =
            serde_json::from_str(&body).map_err(|e| FeedError::Decode(e.to_string()))?;

        if let Some(status_text) = page.status.as_deref() {
            if status_text != "success" {
                return Err(FeedError::Api {
                    status: status.as_u16(),
                    message: page.message.unwrap_or_else(|| status_text.to_string()),
                });
            }
        }

        Ok(page.result)
    }
}

#[async_trait]
impl ReservationFeed for HttpFeedClient {
    #[instrument(skip(self), fields(start = %window.start, end = %window.end))]
    async fn fetch(&self, window: SyncWindow) -> Result<FeedBatch, RetryError<FeedError>> {
        let token = self.access_token().await?;

        let page_size = self.config.page_size;
        let mut batch = FeedBatch::default();
        let mut seen = HashSet::new();
        let mut offset = 0u32;

        for page_number in 1..=MAX_PAGES {
            let entries = self
                .retry
                .execute("fetch reservations page", || {
                    self.fetch_page(&token, window, offset)
                })
                .await?;

            let full_page = u32::try_from(entries.len()).map_or(true, |n| n >= page_size);
            debug!(page = page_number, entries = entries.len(), "Fetched reservation page");

            for entry in entries {
                match decode_entry(entry) {
                    Ok(reservation) => {
                        if seen.insert(reservation.external_id.clone()) {
                            batch.reservations.push(reservation);
                        } else {
                            debug!(
                                reservation_id = %reservation.external_id,
                                "Skipping reservation repeated across pages"
                            );
                        }
                    }
                    Err(message) => {
                        warn!(error = %message, "Rejected malformed reservation entry");
                        batch.rejected.push(message);
                    }
                }
            }

            if !full_page {
                break;
            }
            if page_number == MAX_PAGES {
                warn!(max_pages = MAX_PAGES, "Stopped paging at the page limit");
            }
            offset = offset.saturating_add(page_size);
        }

        info!(
            reservations = batch.reservations.len(),
            rejected = batch.rejected.len(),
            "Fetched reservations"
        );
        Ok(batch)
    }
}

fn decode_entry(entry: serde_json::Value) -> Result<ExternalReservation, String> {
    let hint = entry
        .get("id")
        .map_or_else(|| "<no id>".to_string(), ToString::to_string);
    let wire: WireReservation = serde_json::from_value(entry)
        .map_err(|e| format!("reservation {hint}: unreadable entry ({e})"))?;
    ExternalReservation::try_from(wire)
}
