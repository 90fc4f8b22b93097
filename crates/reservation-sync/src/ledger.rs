//! Sync run ledger and the per-run accumulator.
//!
//! A run row is inserted in `running` state before any work starts and is
//! always finalized to `completed` or `error`. Stages never share global
//! counters; they all write into the [`RunContext`] created for the run.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::StoreResult;
use crate::models::{RunCounters, SyncRun, SyncRunStatus, SyncWindow};
use crate::store::{SyncRunStore, SyncStore};

/// Everything one run accumulates while it executes.
#[derive(Debug, Clone)]
pub struct RunContext {
    run: SyncRun,
    created_task_ids: Vec<String>,
}

impl RunContext {
    fn new(run: SyncRun) -> Self {
        Self {
            run,
            created_task_ids: Vec::new(),
        }
    }

    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run.id
    }

    #[must_use]
    pub fn window(&self) -> SyncWindow {
        self.run.window
    }

    #[must_use]
    pub fn counters(&self) -> RunCounters {
        self.run.counters
    }

    #[must_use]
    pub fn errors(&self) -> &[String] {
        &self.run.errors
    }

    /// Ids of tasks created during this run that still exist.
    #[must_use]
    pub fn created_task_ids(&self) -> &[String] {
        &self.created_task_ids
    }

    pub fn record_processed(&mut self) {
        self.run.counters.processed += 1;
    }

    pub fn record_created(&mut self, task_id: &str) {
        self.run.counters.created += 1;
        self.created_task_ids.push(task_id.to_string());
    }

    pub fn record_updated(&mut self) {
        self.run.counters.updated += 1;
    }

    pub fn record_cancelled(&mut self) {
        self.run.counters.cancelled += 1;
    }

    /// A task created earlier in this run was removed again.
    pub fn forget_created(&mut self, task_id: &str) {
        self.created_task_ids.retain(|id| id != task_id);
    }

    /// Append a recoverable error or warning to the run.
    pub fn record_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!(run_id = %self.run.id, "{message}");
        self.run.errors.push(message);
    }
}

/// Persists run rows.
pub struct SyncLedger {
    store: Arc<dyn SyncStore>,
    tenant_id: String,
}

impl SyncLedger {
    #[must_use]
    pub fn new(store: Arc<dyn SyncStore>, tenant_id: impl Into<String>) -> Self {
        Self {
            store,
            tenant_id: tenant_id.into(),
        }
    }

    /// Insert a `running` row and hand back the context for the run.
    pub async fn start(&self, window: SyncWindow) -> StoreResult<RunContext> {
        let run = SyncRun {
            id: Uuid::new_v4().to_string(),
            tenant_id: self.tenant_id.clone(),
            started_at: Utc::now(),
            completed_at: None,
            status: SyncRunStatus::Running,
            window,
            counters: RunCounters::default(),
            errors: Vec::new(),
        };

        self.store.insert_run(run.clone()).await?;
        info!(run_id = %run.id, start = %window.start, end = %window.end, "Sync run started");

        Ok(RunContext::new(run))
    }

    /// Write the final counters, errors and status for the run.
    pub async fn finish(&self, context: &RunContext, status: SyncRunStatus) -> StoreResult<SyncRun> {
        let mut run = context.run.clone();
        run.status = status;
        run.completed_at = Some(Utc::now());

        self.store.update_run(run.clone()).await?;
        info!(
            run_id = %run.id,
            status = status.as_str(),
            processed = run.counters.processed,
            created = run.counters.created,
            updated = run.counters.updated,
            cancelled = run.counters.cancelled,
            errors = run.errors.len(),
            changed = run.counters.has_changes(),
            "Sync run finished"
        );

        Ok(run)
    }

    /// Most recent runs first.
    pub async fn recent(&self, limit: usize) -> StoreResult<Vec<SyncRun>> {
        self.store.recent_runs(limit).await
    }
}
