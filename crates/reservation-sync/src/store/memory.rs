//! In-process store, used for tests and dry runs.

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::RwLock;

use super::state::StoreDocument;
use super::{PropertyDirectory, ReservationStore, SyncRunStore, TaskStore};
use crate::error::{StoreError, StoreResult};
use crate::models::{Property, ReservationRecord, SyncRun, Task};

/// In-memory store scoped to one tenant.
pub struct MemoryStore {
    tenant_id: String,
    document: RwLock<StoreDocument>,
}

impl MemoryStore {
    #[must_use]
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self::from_document(tenant_id, StoreDocument::default())
    }

    #[must_use]
    pub fn from_document(tenant_id: impl Into<String>, document: StoreDocument) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            document: RwLock::new(document),
        }
    }

    /// Register a property, as the property-management service would.
    pub async fn add_property(&self, mut property: Property) {
        property.tenant_id.clone_from(&self.tenant_id);
        self.document.write().await.properties.push(property);
    }

    /// Apply an edit made outside the sync engine (e.g. a cleaner assignment).
    pub async fn edit_task<F>(&self, id: &str, edit: F) -> StoreResult<Task>
    where
        F: FnOnce(&mut Task) + Send,
    {
        let mut document = self.document.write().await;
        let task = document
            .tasks
            .get_mut(id)
            .filter(|t| t.tenant_id == self.tenant_id)
            .ok_or_else(|| StoreError::not_found("task", id))?;
        edit(task);
        Ok(task.clone())
    }

    /// Every task of this tenant, ordered by id.
    pub async fn all_tasks(&self) -> Vec<Task> {
        self.document
            .read()
            .await
            .tasks
            .values()
            .filter(|t| t.tenant_id == self.tenant_id)
            .cloned()
            .collect()
    }

    pub(crate) async fn read<R>(&self, f: impl FnOnce(&StoreDocument, &str) -> R) -> R {
        let document = self.document.read().await;
        f(&document, &self.tenant_id)
    }

    pub(crate) async fn write<R>(&self, f: impl FnOnce(&mut StoreDocument, &str) -> R) -> R {
        let mut document = self.document.write().await;
        f(&mut document, &self.tenant_id)
    }
}

#[async_trait]
impl PropertyDirectory for MemoryStore {
    async fn property_by_listing_id(&self, listing_id: &str) -> StoreResult<Option<Property>> {
        Ok(self.read(|d, t| d.property_by_listing_id(t, listing_id)).await)
    }

    async fn get_property(&self, id: &str) -> StoreResult<Option<Property>> {
        Ok(self.read(|d, t| d.property(t, id)).await)
    }

    async fn list_properties(&self) -> StoreResult<Vec<Property>> {
        Ok(self.read(StoreDocument::properties).await)
    }
}

#[async_trait]
impl ReservationStore for MemoryStore {
    async fn get_reservation(&self, external_id: &str) -> StoreResult<Option<ReservationRecord>> {
        Ok(self.read(|d, t| d.reservation(t, external_id)).await)
    }

    async fn upsert_reservation(&self, record: ReservationRecord) -> StoreResult<()> {
        self.write(|d, t| d.upsert_reservation(t, record)).await;
        Ok(())
    }

    async fn reservations_linked_to(&self, task_id: &str) -> StoreResult<Vec<ReservationRecord>> {
        Ok(self.read(|d, t| d.reservations_linked_to(t, task_id)).await)
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn get_task(&self, id: &str) -> StoreResult<Option<Task>> {
        Ok(self.read(|d, t| d.task(t, id)).await)
    }

    async fn insert_task(&self, task: Task) -> StoreResult<()> {
        self.write(|d, t| d.insert_task(t, task)).await;
        Ok(())
    }

    async fn update_task_date(&self, id: &str, date: NaiveDate) -> StoreResult<Task> {
        self.write(|d, t| d.update_task_date(t, id, date)).await
    }

    async fn delete_task(&self, id: &str) -> StoreResult<bool> {
        Ok(self.write(|d, t| d.delete_task(t, id)).await)
    }

    async fn tasks_by_property_name(
        &self,
        property_name: &str,
        date: NaiveDate,
    ) -> StoreResult<Vec<Task>> {
        Ok(self
            .read(|d, t| d.tasks_by_property_name(t, property_name, date))
            .await)
    }

    async fn tasks_for_reservation(&self, external_id: &str) -> StoreResult<Vec<Task>> {
        Ok(self.read(|d, t| d.tasks_for_reservation(t, external_id)).await)
    }

    async fn feed_tasks_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> StoreResult<Vec<Task>> {
        Ok(self.read(|d, t| d.feed_tasks_between(t, start, end)).await)
    }
}

#[async_trait]
impl SyncRunStore for MemoryStore {
    async fn insert_run(&self, run: SyncRun) -> StoreResult<()> {
        self.write(|d, t| d.insert_run(t, run)).await;
        Ok(())
    }

    async fn update_run(&self, run: SyncRun) -> StoreResult<()> {
        self.write(|d, t| d.update_run(t, run)).await
    }

    async fn recent_runs(&self, limit: usize) -> StoreResult<Vec<SyncRun>> {
        Ok(self.read(|d, t| d.recent_runs(t, limit)).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, Utc};

    fn property(tenant: &str, id: &str, listing: &str) -> Property {
        Property {
            id: id.to_string(),
            tenant_id: tenant.to_string(),
            external_listing_id: Some(listing.to_string()),
            name: format!("Property {id}"),
            address: String::new(),
            default_service_duration_minutes: 120,
            default_service_cost: 30.0,
            check_in_time: NaiveTime::from_hms_opt(15, 0, 0).unwrap(),
            check_out_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            client_id: "c".to_string(),
        }
    }

    fn task(id: &str, tenant: &str, date: NaiveDate) -> Task {
        Task {
            id: id.to_string(),
            tenant_id: tenant.to_string(),
            property_id: "p1".to_string(),
            property_name: "Apt Centro".to_string(),
            client_id: "c".to_string(),
            date,
            start_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            duration_minutes: 120,
            cost: 30.0,
            address: String::new(),
            check_in_time: NaiveTime::from_hms_opt(15, 0, 0).unwrap(),
            check_out_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            status: crate::models::TaskStatus::Pending,
            assigned_cleaner_id: None,
            source_reservation_id: Some("r1".to_string()),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_rows_are_scoped_to_tenant() {
        let mut document = StoreDocument::default();
        document.properties.push(property("other", "p9", "12"));
        let date = NaiveDate::from_ymd_opt(2024, 6, 5).unwrap();
        document.tasks.insert("t-other".to_string(), task("t-other", "other", date));

        let store = MemoryStore::from_document("mine", document);

        assert!(store.property_by_listing_id("12").await.unwrap().is_none());
        assert!(store.get_task("t-other").await.unwrap().is_none());
        assert!(!store.delete_task("t-other").await.unwrap());
        assert!(store
            .tasks_by_property_name("apt centro", date)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_property_name_search_ignores_case() {
        let store = MemoryStore::new("t1");
        let date = NaiveDate::from_ymd_opt(2024, 6, 5).unwrap();
        store.insert_task(task("a", "t1", date)).await.unwrap();

        let found = store.tasks_by_property_name("APT CENTRO", date).await.unwrap();
        assert_eq!(found.len(), 1);
        assert!(store
            .tasks_by_property_name("Apt Centro", date.succ_opt().unwrap())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_update_date_of_missing_task_fails() {
        let store = MemoryStore::new("t1");
        let err = store
            .update_task_date("missing", NaiveDate::from_ymd_opt(2024, 6, 5).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { kind: "task", .. }));
    }
}
