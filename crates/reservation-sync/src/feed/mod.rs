//! Reservation feed client.
//!
//! [`ReservationFeed::fetch`] returns every reservation departing inside the
//! sync window, paging transparently and dropping repeats of the same
//! external id across pages. Entries that cannot be decoded are returned as
//! rejections instead of failing the whole fetch.

mod http;
mod wire;

pub use http::HttpFeedClient;

use async_trait::async_trait;

use crate::error::FeedError;
use crate::models::{ExternalReservation, SyncWindow};
use crate::retry::RetryError;

/// Result of one full fetch over the window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedBatch {
    pub reservations: Vec<ExternalReservation>,
    /// One message per feed entry that could not be decoded.
    pub rejected: Vec<String>,
}

/// Source of external reservations.
#[async_trait]
pub trait ReservationFeed: Send + Sync {
    /// Fetch all reservations departing within `window`.
    ///
    /// Any error here is fatal for the run.
    async fn fetch(&self, window: SyncWindow) -> Result<FeedBatch, RetryError<FeedError>>;
}
