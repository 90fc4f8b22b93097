//! Notification event types emitted by the reservation sync engine.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Severity levels for alerts and notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational - normal operations
    Info,
    /// Warning - something needs attention
    Warning,
    /// Critical - immediate action required
    Critical,
}

impl Severity {
    /// Get the hex color used by chat attachments for this severity.
    #[must_use]
    pub const fn color(&self) -> &'static str {
        match self {
            Self::Info => "#3498db",     // Blue
            Self::Warning => "#f39c12",  // Orange
            Self::Critical => "#e74c3c", // Red
        }
    }

    /// Get display name for this severity.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "Info",
            Self::Warning => "Warning",
            Self::Critical => "Critical",
        }
    }
}

/// Events that can trigger notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotifyEvent {
    // =========================================================================
    // Cleaner-facing events
    // =========================================================================
    /// A task assigned to a cleaner was removed because its booking is gone
    TaskCancelled {
        cleaner_id: String,
        task_id: String,
        property_name: String,
        date: NaiveDate,
        reservation_id: Option<String>,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },

    /// A task assigned to a cleaner moved to a different date
    ScheduleChanged {
        cleaner_id: String,
        task_id: String,
        property_name: String,
        previous_date: NaiveDate,
        new_date: NaiveDate,
        reservation_id: Option<String>,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },

    // =========================================================================
    // Operator-facing events
    // =========================================================================
    /// End-of-run reconciliation summary, sent even when nothing changed
    SyncSummary {
        run_id: String,
        status: String,
        processed: u32,
        created: u32,
        updated: u32,
        cancelled: u32,
        #[serde(default)]
        errors: Vec<String>,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },
}

impl NotifyEvent {
    /// Get a short title for this event type.
    #[must_use]
    pub fn title(&self) -> String {
        match self {
            Self::TaskCancelled {
                property_name,
                date,
                ..
            } => format!("Cleaning Cancelled: {property_name} on {date}"),
            Self::ScheduleChanged {
                property_name,
                new_date,
                ..
            } => format!("Cleaning Rescheduled: {property_name} to {new_date}"),
            Self::SyncSummary { status, .. } => format!("Reservation Sync {status}"),
        }
    }

    /// Get the severity/color for this event.
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            Self::TaskCancelled { .. } | Self::ScheduleChanged { .. } => Severity::Info,
            Self::SyncSummary { status, errors, .. } => {
                if status == "error" {
                    Severity::Critical
                } else if errors.is_empty() {
                    Severity::Info
                } else {
                    Severity::Warning
                }
            }
        }
    }

    /// The cleaner this event is addressed to, if any.
    #[must_use]
    pub fn recipient(&self) -> Option<&str> {
        match self {
            Self::TaskCancelled { cleaner_id, .. } | Self::ScheduleChanged { cleaner_id, .. } => {
                Some(cleaner_id)
            }
            Self::SyncSummary { .. } => None,
        }
    }

    /// Get the timestamp for this event.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::TaskCancelled { timestamp, .. }
            | Self::ScheduleChanged { timestamp, .. }
            | Self::SyncSummary { timestamp, .. } => *timestamp,
        }
    }
}
