//! Run orchestration: ledger, fetch, reconcile, cleanup, summary.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use notify::{Notifier, NotifyEvent};
use tracing::{error, info, instrument};

use crate::assignment::AssignmentService;
use crate::cleanup::{CleanupReport, PostSyncCleanup};
use crate::config::SyncConfig;
use crate::engine::ReconciliationEngine;
use crate::error::SyncError;
use crate::feed::ReservationFeed;
use crate::ledger::{RunContext, SyncLedger};
use crate::materializer::TaskMaterializer;
use crate::models::{SyncRun, SyncRunStatus, SyncWindow, UnknownStatusPolicy};
use crate::retry::RetryPolicy;
use crate::store::SyncStore;

/// Knobs shared by every stage of a run.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub tenant_id: String,
    pub unknown_status_policy: UnknownStatusPolicy,
    pub retry: RetryPolicy,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self::from(&SyncConfig::default())
    }
}

impl From<&SyncConfig> for SyncOptions {
    fn from(config: &SyncConfig) -> Self {
        Self {
            tenant_id: config.tenant_id.clone(),
            unknown_status_policy: config.unknown_status_policy,
            retry: config.retry,
        }
    }
}

/// Outcome of a run that reached the end.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// The finalized ledger row.
    pub run: SyncRun,
    /// Reservations returned by the feed.
    pub fetched: usize,
    pub cleanup: CleanupReport,
}

/// The scheduled reconciliation job.
pub struct ReservationSync {
    feed: Arc<dyn ReservationFeed>,
    notifier: Arc<Notifier>,
    retry: RetryPolicy,
    ledger: SyncLedger,
    engine: ReconciliationEngine,
    cleanup: PostSyncCleanup,
}

impl ReservationSync {
    #[must_use]
    pub fn new(
        store: Arc<dyn SyncStore>,
        feed: Arc<dyn ReservationFeed>,
        notifier: Arc<Notifier>,
        assignment: Option<Arc<dyn AssignmentService>>,
        options: SyncOptions,
    ) -> Self {
        let materializer = Arc::new(TaskMaterializer::new(
            store.clone(),
            notifier.clone(),
            options.retry,
        ));

        Self {
            ledger: SyncLedger::new(store.clone(), options.tenant_id.clone()),
            engine: ReconciliationEngine::new(
                store.clone(),
                materializer.clone(),
                options.unknown_status_policy,
                options.tenant_id,
            ),
            cleanup: PostSyncCleanup::new(store, materializer, assignment),
            feed,
            notifier,
            retry: options.retry,
        }
    }

    #[must_use]
    pub fn ledger(&self) -> &SyncLedger {
        &self.ledger
    }

    /// Run over `[today, today + 14 days]`, with today in UTC.
    pub async fn run(&self) -> Result<RunReport, SyncError> {
        self.run_for(Utc::now().date_naive()).await
    }

    /// Run over the window starting at `today`.
    ///
    /// Only a feed failure or a ledger write failure returns an error. In the
    /// feed case the run row is finalized as `error` first.
    #[instrument(skip(self))]
    pub async fn run_for(&self, today: NaiveDate) -> Result<RunReport, SyncError> {
        let window = SyncWindow::starting(today);
        let mut context = self.ledger.start(window).await?;

        let batch = match self.feed.fetch(window).await {
            Ok(batch) => batch,
            Err(e) => {
                error!(run_id = %context.run_id(), error = %e, "Reservation fetch failed; aborting run");
                context.record_error(format!("Reservation fetch failed: {e}"));
                self.send_summary(SyncRunStatus::Error, &mut context).await;
                self.ledger.finish(&context, SyncRunStatus::Error).await?;
                return Err(SyncError::Feed(e));
            }
        };

        info!(
            run_id = %context.run_id(),
            reservations = batch.reservations.len(),
            rejected = batch.rejected.len(),
            "Reconciling reservations"
        );
        for rejected in batch.rejected {
            context.record_error(rejected);
        }

        for reservation in &batch.reservations {
            let departure = reservation.checkout_date();
            if !window.contains(departure) {
                context.record_error(format!(
                    "Reservation {} departs on {departure}, outside the sync window; skipped",
                    reservation.external_id
                ));
                continue;
            }
            self.engine.process(reservation, &mut context).await;
        }

        let cleanup = self.cleanup.run(&mut context).await;

        self.send_summary(SyncRunStatus::Completed, &mut context).await;
        let run = self.ledger.finish(&context, SyncRunStatus::Completed).await?;

        Ok(RunReport {
            run,
            fetched: batch.reservations.len(),
            cleanup,
        })
    }

    /// Send the end-of-run summary, even when nothing changed.
    async fn send_summary(&self, status: SyncRunStatus, context: &mut RunContext) {
        let counters = context.counters();
        let event = NotifyEvent::SyncSummary {
            run_id: context.run_id().to_string(),
            status: status.as_str().to_string(),
            processed: counters.processed,
            created: counters.created,
            updated: counters.updated,
            cancelled: counters.cancelled,
            errors: context.errors().to_vec(),
            timestamp: Utc::now(),
        };

        let result = self
            .retry
            .execute("sync summary", || self.notifier.deliver(&event))
            .await;
        if let Err(e) = result {
            context.record_error(format!("Summary notification failed: {e}"));
        }
    }
}
