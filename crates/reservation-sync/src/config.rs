//! Configuration for the reservation sync job.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use crate::models::UnknownStatusPolicy;
use crate::retry::RetryPolicy;

/// Default feed API base URL.
const DEFAULT_FEED_BASE_URL: &str = "https://api.hostaway.com";

/// Top-level sync configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Tenant/site identifier stamped on every row this job writes.
    pub tenant_id: String,
    /// Directory holding the file store document.
    pub data_dir: PathBuf,
    /// What to do with reservations in statuses the engine does not know.
    pub unknown_status_policy: UnknownStatusPolicy,
    /// Retry policy shared by every external call.
    pub retry: RetryPolicy,
    /// Reservation feed settings.
    pub feed: FeedConfig,
    /// Auto-assignment endpoint; assignment is skipped when unset.
    pub assignment: Option<AssignmentConfig>,
}

/// Reservation feed connection settings.
#[derive(Clone)]
pub struct FeedConfig {
    pub base_url: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Pre-issued bearer token; skips the client-credentials exchange.
    pub api_token: Option<String>,
    pub page_size: u32,
    /// HTTP timeout for a single request.
    pub request_timeout: Duration,
}

impl std::fmt::Debug for FeedConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedConfig")
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "***"))
            .field("api_token", &self.api_token.as_ref().map(|_| "***"))
            .field("page_size", &self.page_size)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Auto-assignment service settings.
#[derive(Debug, Clone)]
pub struct AssignmentConfig {
    pub url: String,
    pub token: Option<String>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_FEED_BASE_URL.to_string(),
            client_id: None,
            client_secret: None,
            api_token: None,
            page_size: 100,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl FeedConfig {
    /// Load feed settings from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            base_url: env::var("FEED_BASE_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_FEED_BASE_URL.to_string()),
            client_id: non_empty("FEED_CLIENT_ID"),
            client_secret: non_empty("FEED_CLIENT_SECRET"),
            api_token: non_empty("FEED_API_TOKEN"),
            page_size: parsed("FEED_PAGE_SIZE", 100).max(1),
            request_timeout: Duration::from_secs(parsed("FEED_TIMEOUT_SECS", 30)),
        }
    }

    /// Whether some way of authenticating is configured.
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        self.api_token.is_some() || (self.client_id.is_some() && self.client_secret.is_some())
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            tenant_id: "default".to_string(),
            data_dir: PathBuf::from("./data"),
            unknown_status_policy: UnknownStatusPolicy::default(),
            retry: RetryPolicy::default(),
            feed: FeedConfig::default(),
            assignment: None,
        }
    }
}

impl SyncConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let unknown_status_policy = match env::var("SYNC_UNKNOWN_STATUS_POLICY") {
            Ok(raw) => raw.parse().unwrap_or_else(|e| {
                warn!(error = %e, "Invalid SYNC_UNKNOWN_STATUS_POLICY, using default");
                UnknownStatusPolicy::default()
            }),
            Err(_) => UnknownStatusPolicy::default(),
        };

        let retry = RetryPolicy::new(
            parsed("SYNC_RETRY_ATTEMPTS", 3),
            Duration::from_millis(parsed("SYNC_RETRY_DELAY_MS", 2000)),
            Duration::from_secs(parsed("SYNC_CALL_TIMEOUT_SECS", 30)),
        );

        let assignment = non_empty("ASSIGNMENT_URL").map(|url| AssignmentConfig {
            url,
            token: non_empty("ASSIGNMENT_TOKEN"),
        });

        Self {
            tenant_id: non_empty("SYNC_TENANT_ID").unwrap_or_else(|| "default".to_string()),
            data_dir: non_empty("SYNC_DATA_DIR").map_or_else(|| PathBuf::from("./data"), PathBuf::from),
            unknown_status_policy,
            retry,
            feed: FeedConfig::from_env(),
            assignment,
        }
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
