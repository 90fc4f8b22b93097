//! JSON-document store on local disk.
//!
//! Every operation takes an exclusive advisory lock on `store.lock`, reads
//! the document from disk, and (for mutations) writes it back through a temp
//! file + rename before the lock is released. Several processes can share a
//! data directory and see each other's writes; a crash never leaves a
//! half-written document.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::NaiveDate;
use fs2::FileExt;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

use super::memory::MemoryStore;
use super::state::StoreDocument;
use super::{PropertyDirectory, ReservationStore, SyncRunStore, TaskStore};
use crate::error::StoreResult;
use crate::models::{Property, ReservationRecord, SyncRun, Task};

/// File name of the store document inside the data directory.
const STORE_FILE: &str = "store.json";

/// Lock file guarding the document across processes.
const LOCK_FILE: &str = "store.lock";

/// File-backed store scoped to one tenant.
pub struct FileStore {
    path: PathBuf,
    lock_path: PathBuf,
    tenant_id: String,
    local: Mutex<()>,
}

impl FileStore {
    /// Open (or start) the store document in `data_dir`.
    pub async fn open(data_dir: impl AsRef<Path>, tenant_id: impl Into<String>) -> StoreResult<Self> {
        let data_dir = data_dir.as_ref();
        fs::create_dir_all(data_dir).await?;

        let store = Self {
            path: data_dir.join(STORE_FILE),
            lock_path: data_dir.join(LOCK_FILE),
            tenant_id: tenant_id.into(),
            local: Mutex::new(()),
        };

        // Fail early on an unreadable document.
        store.read(|_, _| ()).await?;
        debug!(path = %store.path.display(), "Opened file store");

        Ok(store)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Register a property and write it to disk.
    pub async fn add_property(&self, mut property: Property) -> StoreResult<()> {
        self.write(|d, t| {
            property.tenant_id = t.to_string();
            d.properties.push(property);
        })
        .await
    }

    /// Detached in-memory copy; changes to it are never written back.
    pub async fn detached_copy(&self) -> StoreResult<MemoryStore> {
        let document = self.read(|d, _| d.clone()).await?;
        Ok(MemoryStore::from_document(&self.tenant_id, document))
    }

    /// Block (off the runtime) until this handle holds the cross-process lock.
    /// The lock is released when the returned file is dropped.
    async fn lock(&self) -> StoreResult<File> {
        let lock_path = self.lock_path.clone();
        let file = tokio::task::spawn_blocking(move || -> std::io::Result<File> {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(&lock_path)?;
            file.lock_exclusive()?;
            Ok(file)
        })
        .await
        .map_err(std::io::Error::other)??;
        Ok(file)
    }

    async fn load(&self) -> StoreResult<StoreDocument> {
        match fs::read_to_string(&self.path).await {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoreDocument::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, document: &StoreDocument) -> StoreResult<()> {
        let content = serde_json::to_string_pretty(document)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn read<R>(&self, f: impl FnOnce(&StoreDocument, &str) -> R) -> StoreResult<R> {
        let _local = self.local.lock().await;
        let _lock = self.lock().await?;
        let document = self.load().await?;
        Ok(f(&document, &self.tenant_id))
    }

    async fn write<R>(&self, f: impl FnOnce(&mut StoreDocument, &str) -> R) -> StoreResult<R> {
        let _local = self.local.lock().await;
        let _lock = self.lock().await?;
        let mut document = self.load().await?;
        let result = f(&mut document, &self.tenant_id);
        self.save(&document).await?;
        Ok(result)
    }
}

#[async_trait]
impl PropertyDirectory for FileStore {
    async fn property_by_listing_id(&self, listing_id: &str) -> StoreResult<Option<Property>> {
        self.read(|d, t| d.property_by_listing_id(t, listing_id)).await
    }

    async fn get_property(&self, id: &str) -> StoreResult<Option<Property>> {
        self.read(|d, t| d.property(t, id)).await
    }

    async fn list_properties(&self) -> StoreResult<Vec<Property>> {
        self.read(StoreDocument::properties).await
    }
}

#[async_trait]
impl ReservationStore for FileStore {
    async fn get_reservation(&self, external_id: &str) -> StoreResult<Option<ReservationRecord>> {
        self.read(|d, t| d.reservation(t, external_id)).await
    }

    async fn upsert_reservation(&self, record: ReservationRecord) -> StoreResult<()> {
        self.write(|d, t| d.upsert_reservation(t, record)).await
    }

    async fn reservations_linked_to(&self, task_id: &str) -> StoreResult<Vec<ReservationRecord>> {
        self.read(|d, t| d.reservations_linked_to(t, task_id)).await
    }
}

#[async_trait]
impl TaskStore for FileStore {
    async fn get_task(&self, id: &str) -> StoreResult<Option<Task>> {
        self.read(|d, t| d.task(t, id)).await
    }

    async fn insert_task(&self, task: Task) -> StoreResult<()> {
        self.write(|d, t| d.insert_task(t, task)).await
    }

    async fn update_task_date(&self, id: &str, date: NaiveDate) -> StoreResult<Task> {
        self.write(|d, t| d.update_task_date(t, id, date)).await?
    }

    async fn delete_task(&self, id: &str) -> StoreResult<bool> {
        self.write(|d, t| d.delete_task(t, id)).await
    }

    async fn tasks_by_property_name(
        &self,
        property_name: &str,
        date: NaiveDate,
    ) -> StoreResult<Vec<Task>> {
        self.read(|d, t| d.tasks_by_property_name(t, property_name, date))
            .await
    }

    async fn tasks_for_reservation(&self, external_id: &str) -> StoreResult<Vec<Task>> {
        self.read(|d, t| d.tasks_for_reservation(t, external_id)).await
    }

    async fn feed_tasks_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> StoreResult<Vec<Task>> {
        self.read(|d, t| d.feed_tasks_between(t, start, end)).await
    }
}

#[async_trait]
impl SyncRunStore for FileStore {
    async fn insert_run(&self, run: SyncRun) -> StoreResult<()> {
        self.write(|d, t| d.insert_run(t, run)).await
    }

    async fn update_run(&self, run: SyncRun) -> StoreResult<()> {
        self.write(|d, t| d.update_run(t, run)).await?
    }

    async fn recent_runs(&self, limit: usize) -> StoreResult<Vec<SyncRun>> {
        self.read(|d, t| d.recent_runs(t, limit)).await
    }
}
