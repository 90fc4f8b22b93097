use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ExternalReservation, Property};

/// Lifecycle state of a cleaning task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    Assigned,
    InProgress,
    Completed,
}

/// A cleaning/turnover work order at a property on a date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub tenant_id: String,
    pub property_id: String,
    pub property_name: String,
    pub client_id: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub duration_minutes: u32,
    pub cost: f64,
    #[serde(default)]
    pub address: String,
    pub check_in_time: NaiveTime,
    pub check_out_time: NaiveTime,
    pub status: TaskStatus,
    #[serde(default)]
    pub assigned_cleaner_id: Option<String>,
    /// External id of the reservation this task was created for.
    #[serde(default)]
    pub source_reservation_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Build the turnover task for `reservation` at `property`.
    ///
    /// The slot starts at the property's turnover time and lasts the
    /// property's default service duration. Cost, address and check-in/out
    /// times are copied from the property; no cleaner is assigned.
    #[must_use]
    pub fn for_reservation(
        reservation: &ExternalReservation,
        property: &Property,
        now: DateTime<Utc>,
    ) -> Self {
        let start_time = property.turnover_start();
        let (end_time, _) = start_time.overflowing_add_signed(Duration::minutes(i64::from(
            property.default_service_duration_minutes,
        )));

        Self {
            id: Uuid::new_v4().to_string(),
            tenant_id: property.tenant_id.clone(),
            property_id: property.id.clone(),
            property_name: property.name.clone(),
            client_id: property.client_id.clone(),
            date: reservation.checkout_date(),
            start_time,
            end_time,
            duration_minutes: property.default_service_duration_minutes,
            cost: property.default_service_cost,
            address: property.address.clone(),
            check_in_time: property.check_in_time,
            check_out_time: property.check_out_time,
            status: TaskStatus::Pending,
            assigned_cleaner_id: None,
            source_reservation_id: Some(reservation.external_id.clone()),
            created_at: now,
        }
    }

    /// Whether the sync engine owns this task's lifecycle.
    #[must_use]
    pub fn is_feed_originated(&self) -> bool {
        self.source_reservation_id.is_some()
    }
}
