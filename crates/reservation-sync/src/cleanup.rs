//! Post-sync sweep over the whole window.
//!
//! Catches duplicates the per-reservation guard could not prevent, such as
//! two reservations briefly mapping to the same property and date, then
//! hands the run's new tasks to auto-assignment in one batch.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::assignment::AssignmentService;
use crate::error::StoreResult;
use crate::ledger::RunContext;
use crate::materializer::TaskMaterializer;
use crate::models::Task;
use crate::store::{ReservationStore, SyncStore, TaskStore};

/// What the sweep did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Property/date groups that held more than one task.
    pub duplicate_groups: usize,
    /// Ids of the tasks deleted as duplicates.
    pub removed: Vec<String>,
    /// Reservation records re-pointed at a surviving task.
    pub relinked: usize,
    /// Number of task ids handed to auto-assignment.
    pub assigned: usize,
}

pub struct PostSyncCleanup {
    store: Arc<dyn SyncStore>,
    materializer: Arc<TaskMaterializer>,
    assignment: Option<Arc<dyn AssignmentService>>,
}

impl PostSyncCleanup {
    #[must_use]
    pub fn new(
        store: Arc<dyn SyncStore>,
        materializer: Arc<TaskMaterializer>,
        assignment: Option<Arc<dyn AssignmentService>>,
    ) -> Self {
        Self {
            store,
            materializer,
            assignment,
        }
    }

    /// De-duplicate the window, then request assignment for new tasks.
    ///
    /// Nothing here aborts the run; failures are recorded on `context`.
    pub async fn run(&self, context: &mut RunContext) -> CleanupReport {
        let mut report = self.sweep(context).await;

        if context.created_task_ids().is_empty() {
            debug!("No new tasks to assign");
            return report;
        }

        let Some(assignment) = &self.assignment else {
            debug!("Auto-assignment not configured");
            return report;
        };

        let task_ids = context.created_task_ids().to_vec();
        match assignment.assign(&task_ids).await {
            Ok(()) => report.assigned = task_ids.len(),
            Err(e) => context.record_error(format!("Auto-assignment failed: {e}")),
        }

        report
    }

    async fn sweep(&self, context: &mut RunContext) -> CleanupReport {
        let mut report = CleanupReport::default();
        let window = context.window();

        let tasks = match self.store.feed_tasks_between(window.start, window.end).await {
            Ok(tasks) => tasks,
            Err(e) => {
                context.record_error(format!("Duplicate cleanup skipped: {e}"));
                return report;
            }
        };

        let mut groups: BTreeMap<(NaiveDate, String), Vec<Task>> = BTreeMap::new();
        for task in tasks {
            groups
                .entry((task.date, task.property_id.clone()))
                .or_default()
                .push(task);
        }

        for ((date, property_id), mut group) in groups {
            if group.len() < 2 {
                continue;
            }
            report.duplicate_groups += 1;

            group.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
            let keep = group.remove(0);
            info!(
                %date,
                property_id = %property_id,
                kept = %keep.id,
                duplicates = group.len(),
                "Removing duplicate tasks"
            );

            for duplicate in group {
                match self.remove_duplicate(&duplicate, &keep, context).await {
                    Ok(relinked) => {
                        report.relinked += relinked;
                        context.record_error(format!(
                            "Removed duplicate task {} for {} on {}; kept task {}",
                            duplicate.id, duplicate.property_name, date, keep.id
                        ));
                        report.removed.push(duplicate.id);
                    }
                    Err(e) => context.record_error(format!(
                        "Failed to remove duplicate task {}: {e}",
                        duplicate.id
                    )),
                }
            }
        }

        report
    }

    /// Delete one duplicate and re-point its reservations at `keep`.
    async fn remove_duplicate(
        &self,
        duplicate: &Task,
        keep: &Task,
        context: &mut RunContext,
    ) -> StoreResult<usize> {
        self.materializer.retire_task(duplicate, context).await?;
        context.forget_created(&duplicate.id);

        let linked = self.store.reservations_linked_to(&duplicate.id).await?;
        let relinked = linked.len();
        for mut record in linked {
            record.linked_task_id = Some(keep.id.clone());
            self.store.upsert_reservation(record).await?;
        }

        Ok(relinked)
    }
}
