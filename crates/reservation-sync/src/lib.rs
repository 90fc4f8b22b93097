//! Reservation-to-task reconciliation.
//!
//! Keeps the internal cleaning-task calendar in line with an external
//! vacation-rental reservation feed. Each run fetches every reservation
//! departing in the next 14 days and, one reservation at a time, creates,
//! moves or deletes turnover tasks. A cleanup sweep then removes any
//! duplicates left over, new tasks are sent to auto-assignment, and the run
//! is recorded in the ledger with a summary notification.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use notify::Notifier;
//! use reservation_sync::{FileStore, HttpFeedClient, ReservationSync, SyncConfig, SyncOptions};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = SyncConfig::from_env();
//! let store = Arc::new(FileStore::open(&config.data_dir, &config.tenant_id).await?);
//! let feed = Arc::new(HttpFeedClient::new(config.feed.clone(), config.retry)?);
//!
//! let sync = ReservationSync::new(
//!     store,
//!     feed,
//!     Arc::new(Notifier::from_env()),
//!     None,
//!     SyncOptions::from(&config),
//! );
//! let report = sync.run().await?;
//! println!("{} reservations, {} errors", report.fetched, report.run.errors.len());
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! See [`SyncConfig::from_env`] for the environment variables read.

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod assignment;
pub mod cleanup;
pub mod config;
pub mod engine;
pub mod error;
pub mod feed;
pub mod guard;
pub mod ledger;
pub mod materializer;
pub mod models;
pub mod resolver;
pub mod retry;
pub mod store;
pub mod sync;

pub use assignment::{AssignmentService, HttpAssignmentClient};
pub use cleanup::{CleanupReport, PostSyncCleanup};
pub use config::{AssignmentConfig, FeedConfig, SyncConfig};
pub use engine::{plan, ReconciliationEngine, Transition};
pub use error::{AssignmentError, FeedError, ReconcileError, StoreError, SyncError};
pub use feed::{FeedBatch, HttpFeedClient, ReservationFeed};
pub use guard::{DuplicateGuard, GuardDecision};
pub use ledger::{RunContext, SyncLedger};
pub use materializer::TaskMaterializer;
pub use resolver::{MatchKind, PropertyResolver, Resolution};
pub use retry::{RetryError, RetryPolicy, Transient};
pub use store::{FileStore, MemoryStore, SyncStore};
pub use sync::{ReservationSync, RunReport, SyncOptions};
