//! Error types for the sync engine.

use thiserror::Error;

use crate::retry::{RetryError, Transient};

/// Errors raised by the reservation feed client.
#[derive(Debug, Error)]
pub enum FeedError {
    /// Credentials were rejected or no token could be obtained.
    #[error("Feed authentication failed: {0}")]
    Auth(String),

    /// HTTP request failed.
    #[error("Feed request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The feed answered with a non-success status.
    #[error("Feed API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// A page could not be decoded.
    #[error("Feed returned an unreadable page: {0}")]
    Decode(String),

    /// The client is missing required settings.
    #[error("Feed client not configured: {0}")]
    Config(String),
}

impl Transient for FeedError {
    fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            Self::Auth(_) | Self::Decode(_) | Self::Config(_) => false,
        }
    }
}

/// Errors raised by the storage layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A row the caller expected does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Reading or writing the backing file failed.
    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backing document could not be (de)serialised.
    #[error("Store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }
}

/// Errors raised by the auto-assignment client.
#[derive(Debug, Error)]
pub enum AssignmentError {
    /// HTTP request failed.
    #[error("Assignment request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The assignment service answered with a non-success status.
    #[error("Assignment service error: {status} - {message}")]
    Api { status: u16, message: String },
}

impl Transient for AssignmentError {
    fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Api { status, .. } => *status == 429 || *status >= 500,
        }
    }
}

impl Transient for notify::ChannelError {
    fn is_transient(&self) -> bool {
        notify::ChannelError::is_transient(self)
    }
}

/// Errors that stop the processing of a single reservation.
///
/// These are recorded on the run; the next reservation is processed as usual.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The listing could not be mapped to a property.
    #[error("Property not found for listing {listing_id}")]
    PropertyNotFound { listing_id: String },

    /// A store read or write failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors that abort a whole sync run.
///
/// Everything else is recorded on the run and processing continues.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Fetching reservations failed after retries, or authentication failed.
    #[error("Reservation feed unavailable: {0}")]
    Feed(#[from] RetryError<FeedError>),

    /// The run ledger or a bulk store read failed.
    #[error("Store unavailable: {0}")]
    Store(#[from] StoreError),
}

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
