//! Storage layer for properties, reservation records, tasks and run rows.
//!
//! Each table sits behind its own trait; [`SyncStore`] bundles them for the
//! engine. A store instance is scoped to a single tenant and never returns
//! another tenant's rows.

mod file;
mod memory;
mod state;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use state::StoreDocument;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::StoreResult;
use crate::models::{Property, ReservationRecord, SyncRun, Task};

/// Read access to the property-management service's properties.
#[async_trait]
pub trait PropertyDirectory: Send + Sync {
    /// Property whose stored external listing id equals `listing_id`.
    async fn property_by_listing_id(&self, listing_id: &str) -> StoreResult<Option<Property>>;

    async fn get_property(&self, id: &str) -> StoreResult<Option<Property>>;

    async fn list_properties(&self) -> StoreResult<Vec<Property>>;
}

/// Durable mirror of feed reservations.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    async fn get_reservation(&self, external_id: &str) -> StoreResult<Option<ReservationRecord>>;

    /// Insert or replace the record keyed by its external id.
    async fn upsert_reservation(&self, record: ReservationRecord) -> StoreResult<()>;

    async fn reservations_linked_to(&self, task_id: &str) -> StoreResult<Vec<ReservationRecord>>;
}

/// Cleaning tasks.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn get_task(&self, id: &str) -> StoreResult<Option<Task>>;

    async fn insert_task(&self, task: Task) -> StoreResult<()>;

    /// Change only the date of a task; fails with `NotFound` if it is gone.
    async fn update_task_date(&self, id: &str, date: NaiveDate) -> StoreResult<Task>;

    /// Hard delete. Returns whether a row was removed.
    async fn delete_task(&self, id: &str) -> StoreResult<bool>;

    /// Tasks on `date` whose property name matches case-insensitively.
    async fn tasks_by_property_name(
        &self,
        property_name: &str,
        date: NaiveDate,
    ) -> StoreResult<Vec<Task>>;

    /// Tasks created for the reservation `external_id`, whether or not a
    /// record links to them.
    async fn tasks_for_reservation(&self, external_id: &str) -> StoreResult<Vec<Task>>;

    /// Feed-originated tasks dated within `[start, end]`.
    async fn feed_tasks_between(&self, start: NaiveDate, end: NaiveDate)
        -> StoreResult<Vec<Task>>;
}

/// Append-only sync run ledger.
#[async_trait]
pub trait SyncRunStore: Send + Sync {
    async fn insert_run(&self, run: SyncRun) -> StoreResult<()>;

    /// Replace an existing run row; fails with `NotFound` if it was never inserted.
    async fn update_run(&self, run: SyncRun) -> StoreResult<()>;

    /// Most recent runs first.
    async fn recent_runs(&self, limit: usize) -> StoreResult<Vec<SyncRun>>;
}

/// Everything the sync engine reads and writes.
pub trait SyncStore: PropertyDirectory + ReservationStore + TaskStore + SyncRunStore {}

impl<T> SyncStore for T where T: PropertyDirectory + ReservationStore + TaskStore + SyncRunStore {}
