//! Serializable store contents shared by the memory and file stores.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::models::{Property, ReservationRecord, SyncRun, Task};

/// The whole store as one document, covering every tenant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreDocument {
    #[serde(default)]
    pub properties: Vec<Property>,
    #[serde(default)]
    pub reservations: BTreeMap<String, ReservationRecord>,
    #[serde(default)]
    pub tasks: BTreeMap<String, Task>,
    #[serde(default)]
    pub runs: Vec<SyncRun>,
}

/// Reservation keys are tenant-qualified so two tenants may share an external id.
fn reservation_key(tenant: &str, external_id: &str) -> String {
    format!("{tenant}/{external_id}")
}

impl StoreDocument {
    pub(crate) fn property_by_listing_id(&self, tenant: &str, listing_id: &str) -> Option<Property> {
        self.properties
            .iter()
            .find(|p| p.tenant_id == tenant && p.external_listing_id.as_deref() == Some(listing_id))
            .cloned()
    }

    pub(crate) fn property(&self, tenant: &str, id: &str) -> Option<Property> {
        self.properties
            .iter()
            .find(|p| p.tenant_id == tenant && p.id == id)
            .cloned()
    }

    pub(crate) fn properties(&self, tenant: &str) -> Vec<Property> {
        self.properties
            .iter()
            .filter(|p| p.tenant_id == tenant)
            .cloned()
            .collect()
    }

    pub(crate) fn reservation(&self, tenant: &str, external_id: &str) -> Option<ReservationRecord> {
        self.reservations
            .get(&reservation_key(tenant, external_id))
            .cloned()
    }

    pub(crate) fn upsert_reservation(&mut self, tenant: &str, mut record: ReservationRecord) {
        record.tenant_id = tenant.to_string();
        self.reservations
            .insert(reservation_key(tenant, &record.external_id), record);
    }

    pub(crate) fn reservations_linked_to(&self, tenant: &str, task_id: &str) -> Vec<ReservationRecord> {
        self.reservations
            .values()
            .filter(|r| r.tenant_id == tenant && r.linked_task_id.as_deref() == Some(task_id))
            .cloned()
            .collect()
    }

    pub(crate) fn task(&self, tenant: &str, id: &str) -> Option<Task> {
        self.tasks.get(id).filter(|t| t.tenant_id == tenant).cloned()
    }

    pub(crate) fn insert_task(&mut self, tenant: &str, mut task: Task) {
        task.tenant_id = tenant.to_string();
        self.tasks.insert(task.id.clone(), task);
    }

    pub(crate) fn update_task_date(&mut self, tenant: &str, id: &str, date: NaiveDate) -> StoreResult<Task> {
        let task = self
            .tasks
            .get_mut(id)
            .filter(|t| t.tenant_id == tenant)
            .ok_or_else(|| StoreError::not_found("task", id))?;
        task.date = date;
        Ok(task.clone())
    }

    pub(crate) fn delete_task(&mut self, tenant: &str, id: &str) -> bool {
        if self.task(tenant, id).is_none() {
            return false;
        }
        self.tasks.remove(id).is_some()
    }

    pub(crate) fn tasks_by_property_name(&self, tenant: &str, name: &str, date: NaiveDate) -> Vec<Task> {
        self.tasks
            .values()
            .filter(|t| {
                t.tenant_id == tenant && t.date == date && t.property_name.eq_ignore_ascii_case(name)
            })
            .cloned()
            .collect()
    }

    pub(crate) fn tasks_for_reservation(&self, tenant: &str, external_id: &str) -> Vec<Task> {
        self.tasks
            .values()
            .filter(|t| {
                t.tenant_id == tenant && t.source_reservation_id.as_deref() == Some(external_id)
            })
            .cloned()
            .collect()
    }

    pub(crate) fn feed_tasks_between(&self, tenant: &str, start: NaiveDate, end: NaiveDate) -> Vec<Task> {
        self.tasks
            .values()
            .filter(|t| {
                t.tenant_id == tenant && t.is_feed_originated() && start <= t.date && t.date <= end
            })
            .cloned()
            .collect()
    }

    pub(crate) fn insert_run(&mut self, tenant: &str, mut run: SyncRun) {
        run.tenant_id = tenant.to_string();
        self.runs.push(run);
    }

    pub(crate) fn update_run(&mut self, tenant: &str, run: SyncRun) -> StoreResult<()> {
        let slot = self
            .runs
            .iter_mut()
            .find(|r| r.tenant_id == tenant && r.id == run.id)
            .ok_or_else(|| StoreError::not_found("sync run", run.id.clone()))?;
        *slot = SyncRun {
            tenant_id: tenant.to_string(),
            ..run
        };
        Ok(())
    }

    pub(crate) fn recent_runs(&self, tenant: &str, limit: usize) -> Vec<SyncRun> {
        let mut runs: Vec<SyncRun> = self
            .runs
            .iter()
            .filter(|r| r.tenant_id == tenant)
            .cloned()
            .collect();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        runs.truncate(limit);
        runs
    }
}
