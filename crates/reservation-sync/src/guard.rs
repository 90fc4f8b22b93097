//! Duplicate guard: decides whether a turnover already has a live task.
//!
//! Stage one trusts the reservation's own link, but only after re-reading the
//! task. Stage two searches tasks by property name and checkout date and
//! counts a hit only if the reservation behind it is still valid, so a new
//! booking can replace one that was cancelled. Together these make a repeat
//! run over an unchanged window create nothing.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::debug;

use crate::error::StoreResult;
use crate::models::{Task, UnknownStatusPolicy};
use crate::store::{ReservationStore, SyncStore, TaskStore};

/// Outcome of a duplicate check.
#[derive(Debug, Clone, PartialEq)]
pub enum GuardDecision {
    /// The reservation already owns this live task; update it instead.
    Tracked(Task),
    /// A task sourced from another valid reservation covers the turnover.
    Duplicate {
        task: Task,
        owner_reservation_id: Option<String>,
    },
    /// Nothing covers the turnover; a task may be created.
    Clear,
}

impl GuardDecision {
    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }
}

pub struct DuplicateGuard {
    store: Arc<dyn SyncStore>,
    policy: UnknownStatusPolicy,
}

impl DuplicateGuard {
    #[must_use]
    pub fn new(store: Arc<dyn SyncStore>, policy: UnknownStatusPolicy) -> Self {
        Self { store, policy }
    }

    /// Whether creating a task for this reservation would duplicate work.
    ///
    /// Stage one uses the link stored on the reservation's record, if any.
    pub async fn is_duplicate(
        &self,
        reservation_id: &str,
        property_name: &str,
        checkout_date: NaiveDate,
    ) -> StoreResult<bool> {
        let linked = self
            .store
            .get_reservation(reservation_id)
            .await?
            .and_then(|record| record.linked_task_id);

        Ok(self
            .check(reservation_id, linked.as_deref(), property_name, checkout_date)
            .await?
            .is_duplicate())
    }

    /// The linked task, re-read from the store. A dangling link yields `None`.
    pub async fn linked_task(&self, linked_task_id: Option<&str>) -> StoreResult<Option<Task>> {
        let Some(task_id) = linked_task_id else {
            return Ok(None);
        };

        let task = self.store.get_task(task_id).await?;
        if task.is_none() {
            debug!(task_id, "Linked task no longer exists");
        }
        Ok(task)
    }

    /// Run both stages and report what covers the turnover.
    pub async fn check(
        &self,
        reservation_id: &str,
        linked_task_id: Option<&str>,
        property_name: &str,
        checkout_date: NaiveDate,
    ) -> StoreResult<GuardDecision> {
        // Stage 1: the reservation's own link, re-verified.
        if let Some(task) = self.linked_task(linked_task_id).await? {
            return Ok(GuardDecision::Tracked(task));
        }

        // Stage 2: same property and date.
        let mut candidates = self
            .store
            .tasks_by_property_name(property_name, checkout_date)
            .await?;
        candidates.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

        // A task this reservation created without getting linked is adopted.
        if let Some(index) = candidates
            .iter()
            .position(|t| t.source_reservation_id.as_deref() == Some(reservation_id))
        {
            return Ok(GuardDecision::Tracked(candidates.swap_remove(index)));
        }

        for task in candidates {
            let Some(owner) = task.source_reservation_id.clone() else {
                // Manually created tasks are outside the engine's ownership.
                continue;
            };

            let owner_is_valid = match self.store.get_reservation(&owner).await? {
                Some(record) => record.status.validity(self.policy).is_valid(),
                // Unknown owner: the task was only ever created for a valid booking.
                None => true,
            };

            if owner_is_valid {
                return Ok(GuardDecision::Duplicate {
                    task,
                    owner_reservation_id: Some(owner),
                });
            }

            debug!(
                reservation_id,
                stale_owner = %owner,
                task_id = %task.id,
                "Ignoring task owned by an invalid reservation"
            );
        }

        Ok(GuardDecision::Clear)
    }
}
