//! Per-reservation reconciliation state machine.
//!
//! [`plan`] compares one feed snapshot with the stored record and picks a
//! [`Transition`]; [`ReconciliationEngine::process`] applies it. Reservations
//! are handled one at a time and a failure only affects the reservation it
//! happened on.
//!
//! Every arm that needs a task goes through the same "ensure" step: trust the
//! linked task only after re-reading it, otherwise resolve the property, ask
//! the duplicate guard, and create a task only when nothing covers the
//! turnover. That step is what lets a repeated or overlapping run converge
//! instead of piling up tasks.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, instrument, warn};

use crate::error::ReconcileError;
use crate::guard::{DuplicateGuard, GuardDecision};
use crate::ledger::RunContext;
use crate::materializer::TaskMaterializer;
use crate::models::{
    ExternalReservation, ReservationRecord, StatusClass, Task, UnknownStatusPolicy,
};
use crate::resolver::PropertyResolver;
use crate::store::{ReservationStore, SyncStore, TaskStore};

// =============================================================================
// Planning
// =============================================================================

/// What a reservation needs, given what the store already holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// First sighting of a reservation that should have a task.
    Create,
    /// First sighting of a reservation that should not.
    RecordInvalid,
    /// Unchanged and valid: make sure the task still exists.
    SelfHeal,
    /// Unchanged and invalid.
    Touch,
    /// Valid before, invalid now.
    Cancel,
    /// Invalid before, valid now.
    Reactivate,
    /// Still valid, stay dates moved.
    Reschedule,
    /// Still valid, other fields changed.
    RefreshValid,
    /// Still invalid, fields changed.
    RefreshInvalid,
}

/// Pick the transition for `incoming` relative to the stored record.
#[must_use]
pub fn plan(
    existing: Option<&ReservationRecord>,
    incoming: &ExternalReservation,
    policy: UnknownStatusPolicy,
) -> Transition {
    let valid_now = incoming.status.validity(policy).is_valid();

    let Some(record) = existing else {
        return if valid_now {
            Transition::Create
        } else {
            Transition::RecordInvalid
        };
    };

    if !record.differs_from(incoming) {
        return if valid_now {
            Transition::SelfHeal
        } else {
            Transition::Touch
        };
    }

    match (record.status.validity(policy).is_valid(), valid_now) {
        (true, false) => Transition::Cancel,
        (false, true) => Transition::Reactivate,
        (true, true) if record.dates_differ(incoming) => Transition::Reschedule,
        (true, true) => Transition::RefreshValid,
        (false, false) => Transition::RefreshInvalid,
    }
}

// =============================================================================
// Applying
// =============================================================================

/// How the ensure step covered a turnover.
#[derive(Debug)]
enum Coverage {
    /// A live task already belonged to the reservation.
    Existing(Task),
    /// Another valid reservation's task covers the same property and date.
    Shared(Task),
    /// A new task was created.
    Created(Task),
}

impl Coverage {
    fn task(&self) -> &Task {
        match self {
            Self::Existing(task) | Self::Shared(task) | Self::Created(task) => task,
        }
    }

    fn was_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Applies transitions against the store.
pub struct ReconciliationEngine {
    store: Arc<dyn SyncStore>,
    resolver: PropertyResolver,
    guard: DuplicateGuard,
    materializer: Arc<TaskMaterializer>,
    policy: UnknownStatusPolicy,
    tenant_id: String,
}

impl ReconciliationEngine {
    #[must_use]
    pub fn new(
        store: Arc<dyn SyncStore>,
        materializer: Arc<TaskMaterializer>,
        policy: UnknownStatusPolicy,
        tenant_id: impl Into<String>,
    ) -> Self {
        Self {
            resolver: PropertyResolver::new(store.clone()),
            guard: DuplicateGuard::new(store.clone(), policy),
            store,
            materializer,
            policy,
            tenant_id: tenant_id.into(),
        }
    }

    /// Reconcile one reservation.
    ///
    /// Failures are appended to the run and `None` is returned; the caller
    /// moves on to the next reservation either way.
    #[instrument(skip_all, fields(reservation_id = %reservation.external_id))]
    pub async fn process(
        &self,
        reservation: &ExternalReservation,
        context: &mut RunContext,
    ) -> Option<Transition> {
        context.record_processed();

        if reservation.status.class() == StatusClass::Unrecognized {
            warn!(
                status = %reservation.status,
                policy = ?self.policy,
                "Unrecognized reservation status"
            );
        }

        match self.reconcile(reservation, context).await {
            Ok(transition) => Some(transition),
            Err(e) => {
                context.record_error(format!("Reservation {}: {e}", reservation.external_id));
                None
            }
        }
    }

    async fn reconcile(
        &self,
        reservation: &ExternalReservation,
        context: &mut RunContext,
    ) -> Result<Transition, ReconcileError> {
        let existing = self.store.get_reservation(&reservation.external_id).await?;
        let transition = plan(existing.as_ref(), reservation, self.policy);
        debug!(?transition, status = %reservation.status, "Planned transition");

        let linked = existing.as_ref().and_then(|r| r.linked_task_id.clone());
        let mut record = self.next_record(existing, reservation);

        match transition {
            Transition::Create | Transition::Reactivate => {
                // Never resurrect: any earlier task was deleted on cancellation.
                let coverage = self.ensure_task(reservation, None, context).await?;
                if coverage.was_created() {
                    context.record_created(&coverage.task().id);
                } else if transition == Transition::Reactivate {
                    context.record_updated();
                }
                link(&mut record, Some(coverage.task()));
            }

            Transition::RecordInvalid => {
                self.retire_unlinked(&reservation.external_id, context).await?;
                let property = self
                    .resolver
                    .resolve(&reservation.listing_id, reservation.listing_name.as_deref())
                    .await?
                    .map(|r| r.property);
                record.property_id = property.as_ref().map(|p| p.id.clone());
                record.client_id = property.map(|p| p.client_id);
                link(&mut record, None);
            }

            Transition::SelfHeal | Transition::RefreshValid => {
                let coverage = self
                    .ensure_task(reservation, linked.as_deref(), context)
                    .await?;
                if coverage.was_created() {
                    debug!(task_id = %coverage.task().id, "Recreated missing task");
                    context.record_created(&coverage.task().id);
                } else if transition == Transition::RefreshValid {
                    context.record_updated();
                }
                link(&mut record, Some(coverage.task()));
            }

            Transition::Touch => {
                self.retire_unlinked(&reservation.external_id, context).await?;
                link(&mut record, None);
            }

            Transition::RefreshInvalid => {
                self.retire_unlinked(&reservation.external_id, context).await?;
                context.record_updated();
                link(&mut record, None);
            }

            Transition::Cancel => {
                let removed_linked = self
                    .cancel_linked(&reservation.external_id, linked.as_deref(), context)
                    .await?;
                if removed_linked {
                    context.record_cancelled();
                }
                let removed_unlinked = self
                    .retire_unlinked(&reservation.external_id, context)
                    .await?;
                if !removed_linked && removed_unlinked == 0 {
                    context.record_updated();
                }
                link(&mut record, None);
            }

            Transition::Reschedule => {
                let task = self
                    .move_linked(reservation, linked.as_deref(), context)
                    .await?;
                link(&mut record, Some(&task));
            }
        }

        self.store.upsert_reservation(record).await?;
        Ok(transition)
    }

    /// Make sure a live task covers the reservation's turnover.
    ///
    /// The linked task wins if it still exists. Otherwise the property is
    /// resolved, the duplicate guard is consulted, and a task is created
    /// only when nothing else covers the same property and date.
    async fn ensure_task(
        &self,
        reservation: &ExternalReservation,
        linked_task_id: Option<&str>,
        context: &mut RunContext,
    ) -> Result<Coverage, ReconcileError> {
        if let Some(task) = self.guard.linked_task(linked_task_id).await? {
            return Ok(Coverage::Existing(task));
        }

        let resolution = self
            .resolver
            .resolve(&reservation.listing_id, reservation.listing_name.as_deref())
            .await?
            .ok_or_else(|| ReconcileError::PropertyNotFound {
                listing_id: reservation.listing_id.clone(),
            })?;
        let property = resolution.property;

        let decision = self
            .guard
            .check(
                &reservation.external_id,
                None,
                &property.name,
                reservation.checkout_date(),
            )
            .await?;

        match decision {
            GuardDecision::Tracked(task) => {
                debug!(task_id = %task.id, "Adopted unlinked task created for this reservation");
                Ok(Coverage::Existing(task))
            }
            GuardDecision::Duplicate {
                task,
                owner_reservation_id,
            } => {
                context.record_error(format!(
                    "Reservation {} duplicates task {} for {} on {} (reservation {}); linked to the existing task",
                    reservation.external_id,
                    task.id,
                    property.name,
                    task.date,
                    owner_reservation_id.as_deref().unwrap_or("unknown"),
                ));
                Ok(Coverage::Shared(task))
            }
            GuardDecision::Clear => {
                let task = self.materializer.create_task(reservation, &property).await?;
                Ok(Coverage::Created(task))
            }
        }
    }

    /// Remove the task linked to a reservation that is no longer valid.
    ///
    /// A task shared with another reservation is only unlinked. Returns
    /// whether a task was deleted.
    async fn cancel_linked(
        &self,
        reservation_id: &str,
        linked_task_id: Option<&str>,
        context: &mut RunContext,
    ) -> Result<bool, ReconcileError> {
        let Some(task) = self.guard.linked_task(linked_task_id).await? else {
            return Ok(false);
        };

        if !is_owned_by(&task, reservation_id) {
            debug!(task_id = %task.id, "Linked task belongs to another reservation; unlinking only");
            return Ok(false);
        }

        Ok(self.materializer.retire_task(&task, context).await?)
    }

    /// Delete every task still sourced from a reservation that is no longer
    /// valid, including tasks no record links to (a task insert that landed
    /// before the record write failed). Each one counts as cancelled.
    async fn retire_unlinked(
        &self,
        reservation_id: &str,
        context: &mut RunContext,
    ) -> Result<usize, ReconcileError> {
        let mut removed = 0;
        for task in self.store.tasks_for_reservation(reservation_id).await? {
            if self.materializer.retire_task(&task, context).await? {
                warn!(task_id = %task.id, "Removed task left behind by an invalid reservation");
                context.forget_created(&task.id);
                context.record_cancelled();
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Follow a date change. The reservation's own task is moved in place;
    /// a shared or missing task is replaced through the ensure step.
    async fn move_linked(
        &self,
        reservation: &ExternalReservation,
        linked_task_id: Option<&str>,
        context: &mut RunContext,
    ) -> Result<Task, ReconcileError> {
        let owned = self
            .guard
            .linked_task(linked_task_id)
            .await?
            .filter(|t| is_owned_by(t, &reservation.external_id));

        if let Some(task) = owned {
            let moved = self
                .materializer
                .reschedule(&task, reservation.checkout_date(), context)
                .await?;
            context.record_updated();
            return Ok(moved);
        }

        let coverage = self.ensure_task(reservation, None, context).await?;
        if coverage.was_created() {
            context.record_created(&coverage.task().id);
        } else {
            context.record_updated();
        }
        Ok(coverage.task().clone())
    }

    fn next_record(
        &self,
        existing: Option<ReservationRecord>,
        reservation: &ExternalReservation,
    ) -> ReservationRecord {
        let now = Utc::now();
        match existing {
            Some(mut record) => {
                record.apply_feed(reservation);
                record.last_synced_at = now;
                record
            }
            None => ReservationRecord::first_sighting(&self.tenant_id, reservation, None, None, now),
        }
    }
}

fn is_owned_by(task: &Task, reservation_id: &str) -> bool {
    task.source_reservation_id.as_deref() == Some(reservation_id)
}

/// Point a record at `task`, or clear its link.
fn link(record: &mut ReservationRecord, task: Option<&Task>) {
    match task {
        Some(task) => {
            record.linked_task_id = Some(task.id.clone());
            record.property_id = Some(task.property_id.clone());
            record.client_id = Some(task.client_id.clone());
        }
        None => record.linked_task_id = None,
    }
}
