//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use notify::{ChannelError, Notifier, NotifyChannel, NotifyEvent};
use reservation_sync::models::{
    ExternalReservation, Property, ReservationRecord, ReservationStatus, SyncRun, SyncWindow, Task,
};
use reservation_sync::error::StoreResult;
use reservation_sync::store::{PropertyDirectory, ReservationStore, SyncRunStore, TaskStore};
use reservation_sync::{
    AssignmentError, AssignmentService, FeedBatch, FeedError, MemoryStore, ReservationFeed,
    ReservationSync, RetryError, RetryPolicy, StoreError, SyncOptions,
};

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

pub fn property(id: &str, name: &str, listing_id: &str) -> Property {
    Property {
        id: id.to_string(),
        tenant_id: "t1".to_string(),
        external_listing_id: Some(listing_id.to_string()),
        name: name.to_string(),
        address: format!("{name}, Calle Mayor 1"),
        default_service_duration_minutes: 120,
        default_service_cost: 45.0,
        check_in_time: NaiveTime::from_hms_opt(15, 0, 0).unwrap(),
        check_out_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
        client_id: "client-1".to_string(),
    }
}

pub fn reservation(
    id: &str,
    listing_id: &str,
    status: &str,
    arrival: NaiveDate,
    departure: NaiveDate,
) -> ExternalReservation {
    ExternalReservation {
        external_id: id.to_string(),
        listing_id: listing_id.to_string(),
        listing_name: None,
        status: ReservationStatus::parse(status),
        arrival_date: arrival,
        departure_date: departure,
        created_date: None,
        cancelled_date: None,
        nights: u32::try_from((departure - arrival).num_days()).unwrap(),
        adult_count: 2,
        guest_name: "Ana".to_string(),
    }
}

/// Feed whose contents the test sets before each run.
#[derive(Default)]
pub struct ScriptedFeed {
    reservations: Mutex<Option<Vec<ExternalReservation>>>,
    windows: Mutex<Vec<SyncWindow>>,
}

impl ScriptedFeed {
    pub fn serve(&self, reservations: Vec<ExternalReservation>) {
        *self.reservations.lock().unwrap() = Some(reservations);
    }

    /// Make the next fetches fail as if retries were exhausted.
    pub fn go_down(&self) {
        *self.reservations.lock().unwrap() = None;
    }

    pub fn windows(&self) -> Vec<SyncWindow> {
        self.windows.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReservationFeed for ScriptedFeed {
    async fn fetch(&self, window: SyncWindow) -> Result<FeedBatch, RetryError<FeedError>> {
        self.windows.lock().unwrap().push(window);
        match self.reservations.lock().unwrap().clone() {
            Some(reservations) => Ok(FeedBatch {
                reservations,
                rejected: Vec::new(),
            }),
            None => Err(RetryError::Exhausted {
                operation: "fetch reservations page".to_string(),
                attempts: 3,
                last: FeedError::Api {
                    status: 503,
                    message: "unavailable".to_string(),
                },
            }),
        }
    }
}

/// Notification channel that keeps every event it is given.
#[derive(Default)]
pub struct RecordingChannel {
    events: Mutex<Vec<NotifyEvent>>,
}

impl RecordingChannel {
    pub fn events(&self) -> Vec<NotifyEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn cleaner_events(&self) -> Vec<NotifyEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.recipient().is_some())
            .collect()
    }

    pub fn summaries(&self) -> Vec<NotifyEvent> {
        self.events()
            .into_iter()
            .filter(|e| matches!(e, NotifyEvent::SyncSummary { .. }))
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

#[async_trait]
impl NotifyChannel for RecordingChannel {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn enabled(&self) -> bool {
        true
    }

    async fn send(&self, event: &NotifyEvent) -> Result<(), ChannelError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Assignment service that records each batch.
#[derive(Default)]
pub struct RecordingAssignment {
    batches: Mutex<Vec<Vec<String>>>,
}

impl RecordingAssignment {
    pub fn batches(&self) -> Vec<Vec<String>> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl AssignmentService for RecordingAssignment {
    async fn assign(&self, task_ids: &[String]) -> Result<(), RetryError<AssignmentError>> {
        self.batches.lock().unwrap().push(task_ids.to_vec());
        Ok(())
    }
}

/// Store that forwards to a [`MemoryStore`] but can be told to fail
/// selected writes and the cleanup query.
pub struct FaultyStore {
    inner: Arc<MemoryStore>,
    failing_inserts: Mutex<HashSet<String>>,
    failing_deletes: Mutex<HashSet<String>>,
    fail_date_updates: Mutex<bool>,
    fail_window_query: Mutex<bool>,
}

fn disk_full() -> StoreError {
    StoreError::Io(std::io::Error::other("disk full"))
}

impl FaultyStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            failing_inserts: Mutex::default(),
            failing_deletes: Mutex::default(),
            fail_date_updates: Mutex::new(false),
            fail_window_query: Mutex::new(false),
        }
    }

    /// Fail task inserts for the given reservation.
    pub fn fail_insert_for(&self, reservation_id: &str) {
        self.failing_inserts
            .lock()
            .unwrap()
            .insert(reservation_id.to_string());
    }

    pub fn fail_delete_of(&self, task_id: &str) {
        self.failing_deletes.lock().unwrap().insert(task_id.to_string());
    }

    pub fn fail_date_updates(&self) {
        *self.fail_date_updates.lock().unwrap() = true;
    }

    pub fn fail_window_query(&self) {
        *self.fail_window_query.lock().unwrap() = true;
    }

    pub fn heal(&self) {
        self.failing_inserts.lock().unwrap().clear();
        self.failing_deletes.lock().unwrap().clear();
        *self.fail_date_updates.lock().unwrap() = false;
        *self.fail_window_query.lock().unwrap() = false;
    }
}

#[async_trait]
impl PropertyDirectory for FaultyStore {
    async fn property_by_listing_id(&self, listing_id: &str) -> StoreResult<Option<Property>> {
        self.inner.property_by_listing_id(listing_id).await
    }

    async fn get_property(&self, id: &str) -> StoreResult<Option<Property>> {
        self.inner.get_property(id).await
    }

    async fn list_properties(&self) -> StoreResult<Vec<Property>> {
        self.inner.list_properties().await
    }
}

#[async_trait]
impl ReservationStore for FaultyStore {
    async fn get_reservation(&self, external_id: &str) -> StoreResult<Option<ReservationRecord>> {
        self.inner.get_reservation(external_id).await
    }

    async fn upsert_reservation(&self, record: ReservationRecord) -> StoreResult<()> {
        self.inner.upsert_reservation(record).await
    }

    async fn reservations_linked_to(&self, task_id: &str) -> StoreResult<Vec<ReservationRecord>> {
        self.inner.reservations_linked_to(task_id).await
    }
}

#[async_trait]
impl TaskStore for FaultyStore {
    async fn get_task(&self, id: &str) -> StoreResult<Option<Task>> {
        self.inner.get_task(id).await
    }

    async fn insert_task(&self, task: Task) -> StoreResult<()> {
        let fails = task
            .source_reservation_id
            .as_ref()
            .is_some_and(|id| self.failing_inserts.lock().unwrap().contains(id));
        if fails {
            return Err(disk_full());
        }
        self.inner.insert_task(task).await
    }

    async fn update_task_date(&self, id: &str, date: NaiveDate) -> StoreResult<Task> {
        if *self.fail_date_updates.lock().unwrap() {
            return Err(disk_full());
        }
        self.inner.update_task_date(id, date).await
    }

    async fn delete_task(&self, id: &str) -> StoreResult<bool> {
        if self.failing_deletes.lock().unwrap().contains(id) {
            return Err(disk_full());
        }
        self.inner.delete_task(id).await
    }

    async fn tasks_by_property_name(
        &self,
        property_name: &str,
        date: NaiveDate,
    ) -> StoreResult<Vec<Task>> {
        self.inner.tasks_by_property_name(property_name, date).await
    }

    async fn tasks_for_reservation(&self, external_id: &str) -> StoreResult<Vec<Task>> {
        self.inner.tasks_for_reservation(external_id).await
    }

    async fn feed_tasks_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> StoreResult<Vec<Task>> {
        if *self.fail_window_query.lock().unwrap() {
            return Err(disk_full());
        }
        self.inner.feed_tasks_between(start, end).await
    }
}

#[async_trait]
impl SyncRunStore for FaultyStore {
    async fn insert_run(&self, run: SyncRun) -> StoreResult<()> {
        self.inner.insert_run(run).await
    }

    async fn update_run(&self, run: SyncRun) -> StoreResult<()> {
        self.inner.update_run(run).await
    }

    async fn recent_runs(&self, limit: usize) -> StoreResult<Vec<SyncRun>> {
        self.inner.recent_runs(limit).await
    }
}

/// A sync job wired to in-memory collaborators.
///
/// The job writes through `faults`; `store` reads the same rows without
/// any injected failures.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub faults: Arc<FaultyStore>,
    pub feed: Arc<ScriptedFeed>,
    pub channel: Arc<RecordingChannel>,
    pub assignment: Arc<RecordingAssignment>,
    pub sync: ReservationSync,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_options(SyncOptions::default()).await
    }

    pub async fn with_options(mut options: SyncOptions) -> Self {
        options.tenant_id = "t1".to_string();
        options.retry = RetryPolicy::new(1, Duration::ZERO, Duration::from_secs(5));

        let store = Arc::new(MemoryStore::new("t1"));
        store.add_property(property("p12", "Apt Centro", "12")).await;
        store.add_property(property("p14", "Casa Azul", "14")).await;

        let feed = Arc::new(ScriptedFeed::default());
        let channel = Arc::new(RecordingChannel::default());
        let assignment = Arc::new(RecordingAssignment::default());

        let channels: Vec<Arc<dyn NotifyChannel>> = vec![channel.clone()];
        let service: Arc<dyn AssignmentService> = assignment.clone();
        let faults = Arc::new(FaultyStore::new(store.clone()));
        let sync = ReservationSync::new(
            faults.clone(),
            feed.clone(),
            Arc::new(Notifier::with_channels(channels)),
            Some(service),
            options,
        );

        Self {
            store,
            faults,
            feed,
            channel,
            assignment,
            sync,
        }
    }
}
