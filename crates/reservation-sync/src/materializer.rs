//! Task create, reschedule and delete, plus the cleaner notifications that
//! go with them.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use notify::{Notifier, NotifyEvent};
use tracing::{debug, info};

use crate::error::StoreResult;
use crate::ledger::RunContext;
use crate::models::{ExternalReservation, Property, Task};
use crate::retry::RetryPolicy;
use crate::store::{SyncStore, TaskStore};

/// Performs task mutations on behalf of the reconciliation engine.
pub struct TaskMaterializer {
    store: Arc<dyn SyncStore>,
    notifier: Arc<Notifier>,
    retry: RetryPolicy,
}

impl TaskMaterializer {
    #[must_use]
    pub fn new(store: Arc<dyn SyncStore>, notifier: Arc<Notifier>, retry: RetryPolicy) -> Self {
        Self {
            store,
            notifier,
            retry,
        }
    }

    /// Create the pending, unassigned turnover task for a reservation.
    pub async fn create_task(
        &self,
        reservation: &ExternalReservation,
        property: &Property,
    ) -> StoreResult<Task> {
        let task = Task::for_reservation(reservation, property, Utc::now());
        self.store.insert_task(task.clone()).await?;

        info!(
            task_id = %task.id,
            reservation_id = %reservation.external_id,
            property = %property.name,
            date = %task.date,
            "Created cleaning task"
        );
        Ok(task)
    }

    /// Move a task to another date, keeping its assignment and every other field.
    pub async fn update_task_date(&self, task_id: &str, date: NaiveDate) -> StoreResult<Task> {
        self.store.update_task_date(task_id, date).await
    }

    /// Hard delete. Any cleaner notification must already have been sent.
    pub async fn delete_task(&self, task_id: &str) -> StoreResult<bool> {
        self.store.delete_task(task_id).await
    }

    /// Notify the assigned cleaner, then delete the task.
    ///
    /// A failed notification is recorded on the run and does not block the
    /// delete. Returns whether a row was removed.
    pub async fn retire_task(&self, task: &Task, context: &mut RunContext) -> StoreResult<bool> {
        if let Some(cleaner_id) = &task.assigned_cleaner_id {
            let event = NotifyEvent::TaskCancelled {
                cleaner_id: cleaner_id.clone(),
                task_id: task.id.clone(),
                property_name: task.property_name.clone(),
                date: task.date,
                reservation_id: task.source_reservation_id.clone(),
                timestamp: Utc::now(),
            };
            self.send(&event, context).await;
        }

        let removed = self.delete_task(&task.id).await?;
        if removed {
            info!(task_id = %task.id, date = %task.date, "Deleted cleaning task");
        } else {
            debug!(task_id = %task.id, "Task was already gone");
        }
        Ok(removed)
    }

    /// Move `task` to `new_date` and tell its cleaner if the date changed.
    pub async fn reschedule(
        &self,
        task: &Task,
        new_date: NaiveDate,
        context: &mut RunContext,
    ) -> StoreResult<Task> {
        if task.date == new_date {
            return Ok(task.clone());
        }

        let updated = self.update_task_date(&task.id, new_date).await?;
        info!(
            task_id = %task.id,
            from = %task.date,
            to = %new_date,
            "Rescheduled cleaning task"
        );

        if let Some(cleaner_id) = &updated.assigned_cleaner_id {
            let event = NotifyEvent::ScheduleChanged {
                cleaner_id: cleaner_id.clone(),
                task_id: updated.id.clone(),
                property_name: updated.property_name.clone(),
                previous_date: task.date,
                new_date,
                reservation_id: updated.source_reservation_id.clone(),
                timestamp: Utc::now(),
            };
            self.send(&event, context).await;
        }

        Ok(updated)
    }

    async fn send(&self, event: &NotifyEvent, context: &mut RunContext) {
        let result = self
            .retry
            .execute("notify cleaner", || self.notifier.deliver(event))
            .await;

        if let Err(e) = result {
            context.record_error(format!("{}: {e}", event.title()));
        }
    }
}
