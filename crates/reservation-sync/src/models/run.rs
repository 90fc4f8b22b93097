use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Number of days after today covered by every run.
pub const LOOKAHEAD_DAYS: i64 = 14;

/// The inclusive departure-date window reconciled by a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl SyncWindow {
    /// `[today, today + LOOKAHEAD_DAYS]`.
    #[must_use]
    pub fn starting(today: NaiveDate) -> Self {
        Self {
            start: today,
            end: today + Duration::days(LOOKAHEAD_DAYS),
        }
    }

    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncRunStatus {
    Running,
    Completed,
    Error,
}

impl SyncRunStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

/// Counters accumulated over one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounters {
    /// Reservations handled, whether or not anything changed.
    pub processed: u32,
    /// Tasks created.
    pub created: u32,
    /// Tasks rescheduled or reservation records whose feed fields changed.
    pub updated: u32,
    /// Tasks removed because their reservation became invalid.
    pub cancelled: u32,
}

impl RunCounters {
    /// Whether the run touched anything.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.created > 0 || self.updated > 0 || self.cancelled > 0
    }
}

/// Audit row for one execution of the sync job. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRun {
    pub id: String,
    pub tenant_id: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    pub status: SyncRunStatus,
    pub window: SyncWindow,
    #[serde(default)]
    pub counters: RunCounters,
    #[serde(default)]
    pub errors: Vec<String>,
}
