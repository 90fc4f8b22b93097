use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Property;

/// Booking status reported by the reservation feed.
///
/// The set of statuses the engine understands is closed; anything else is
/// carried verbatim in [`ReservationStatus::Unrecognized`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ReservationStatus {
    Confirmed,
    New,
    Modified,
    AwaitingPayment,
    Cancelled,
    Inquiry,
    Declined,
    Expired,
    Unrecognized(String),
}

/// How the engine groups a status before applying policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Valid,
    Invalid,
    Unrecognized,
}

/// Whether a reservation should have a live cleaning task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    Valid,
    Invalid,
}

impl Validity {
    #[must_use]
    pub const fn is_valid(self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// What to do with reservations whose status the engine does not recognise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownStatusPolicy {
    /// Treat the reservation as valid and keep a task for it.
    #[default]
    Create,
    /// Treat the reservation as invalid; no task is kept.
    Skip,
}

impl FromStr for UnknownStatusPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "create" | "valid" => Ok(Self::Create),
            "skip" | "invalid" => Ok(Self::Skip),
            other => Err(format!("unknown status policy '{other}' (expected create|skip)")),
        }
    }
}

impl ReservationStatus {
    /// Parse a feed status string. Matching ignores case, `_`, `-` and spaces.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let normalized: String = raw
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .flat_map(char::to_lowercase)
            .collect();

        match normalized.as_str() {
            "confirmed" => Self::Confirmed,
            "new" => Self::New,
            "modified" => Self::Modified,
            "awaitingpayment" => Self::AwaitingPayment,
            "cancelled" | "canceled" => Self::Cancelled,
            "inquiry" => Self::Inquiry,
            "declined" => Self::Declined,
            "expired" => Self::Expired,
            _ => Self::Unrecognized(raw.to_string()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Confirmed => "confirmed",
            Self::New => "new",
            Self::Modified => "modified",
            Self::AwaitingPayment => "awaiting_payment",
            Self::Cancelled => "cancelled",
            Self::Inquiry => "inquiry",
            Self::Declined => "declined",
            Self::Expired => "expired",
            Self::Unrecognized(raw) => raw,
        }
    }

    #[must_use]
    pub const fn class(&self) -> StatusClass {
        match self {
            Self::Confirmed | Self::New | Self::Modified | Self::AwaitingPayment => {
                StatusClass::Valid
            }
            Self::Cancelled | Self::Inquiry | Self::Declined | Self::Expired => {
                StatusClass::Invalid
            }
            Self::Unrecognized(_) => StatusClass::Unrecognized,
        }
    }

    /// Decide whether this status should carry a task.
    ///
    /// This is the only place unrecognised statuses are resolved: they follow
    /// `policy`, which creates a task unless configured otherwise.
    #[must_use]
    pub const fn validity(&self, policy: UnknownStatusPolicy) -> Validity {
        match self.class() {
            StatusClass::Valid => Validity::Valid,
            StatusClass::Invalid => Validity::Invalid,
            StatusClass::Unrecognized => match policy {
                UnknownStatusPolicy::Create => Validity::Valid,
                UnknownStatusPolicy::Skip => Validity::Invalid,
            },
        }
    }
}

impl From<String> for ReservationStatus {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<ReservationStatus> for String {
    fn from(status: ReservationStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reservation as returned by one feed fetch. Immutable snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalReservation {
    pub external_id: String,
    pub listing_id: String,
    /// Listing name as shown by the feed, used as a property-name hint.
    pub listing_name: Option<String>,
    pub status: ReservationStatus,
    pub arrival_date: NaiveDate,
    pub departure_date: NaiveDate,
    pub created_date: Option<NaiveDateTime>,
    pub cancelled_date: Option<NaiveDateTime>,
    pub nights: u32,
    pub adult_count: u32,
    pub guest_name: String,
}

impl ExternalReservation {
    /// The turnover date: the cleaning happens when the guest leaves.
    #[must_use]
    pub const fn checkout_date(&self) -> NaiveDate {
        self.departure_date
    }
}

/// Durable mirror of a feed reservation, unique on `external_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationRecord {
    pub tenant_id: String,
    pub external_id: String,
    pub listing_id: String,
    #[serde(default)]
    pub listing_name: Option<String>,
    pub status: ReservationStatus,
    pub arrival_date: NaiveDate,
    pub departure_date: NaiveDate,
    #[serde(default)]
    pub created_date: Option<NaiveDateTime>,
    #[serde(default)]
    pub cancelled_date: Option<NaiveDateTime>,
    pub nights: u32,
    pub adult_count: u32,
    pub guest_name: String,
    /// Unset when the listing could not be mapped to a property.
    #[serde(default)]
    pub property_id: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub linked_task_id: Option<String>,
    pub last_synced_at: DateTime<Utc>,
}

impl ReservationRecord {
    /// Build the record for a reservation seen for the first time.
    #[must_use]
    pub fn first_sighting(
        tenant_id: &str,
        reservation: &ExternalReservation,
        property: Option<&Property>,
        linked_task_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            external_id: reservation.external_id.clone(),
            listing_id: reservation.listing_id.clone(),
            listing_name: reservation.listing_name.clone(),
            status: reservation.status.clone(),
            arrival_date: reservation.arrival_date,
            departure_date: reservation.departure_date,
            created_date: reservation.created_date,
            cancelled_date: reservation.cancelled_date,
            nights: reservation.nights,
            adult_count: reservation.adult_count,
            guest_name: reservation.guest_name.clone(),
            property_id: property.map(|p| p.id.clone()),
            client_id: property.map(|p| p.client_id.clone()),
            linked_task_id,
            last_synced_at: now,
        }
    }

    /// Whether the feed snapshot differs from what was last stored.
    #[must_use]
    pub fn differs_from(&self, reservation: &ExternalReservation) -> bool {
        self.listing_id != reservation.listing_id
            || self.status != reservation.status
            || self.arrival_date != reservation.arrival_date
            || self.departure_date != reservation.departure_date
            || self.cancelled_date != reservation.cancelled_date
            || self.nights != reservation.nights
            || self.adult_count != reservation.adult_count
            || self.guest_name != reservation.guest_name
    }

    /// Whether the stay dates moved.
    #[must_use]
    pub fn dates_differ(&self, reservation: &ExternalReservation) -> bool {
        self.arrival_date != reservation.arrival_date
            || self.departure_date != reservation.departure_date
    }

    /// Copy the mirrored feed fields from `reservation`.
    pub fn apply_feed(&mut self, reservation: &ExternalReservation) {
        self.listing_id.clone_from(&reservation.listing_id);
        self.listing_name.clone_from(&reservation.listing_name);
        self.status = reservation.status.clone();
        self.arrival_date = reservation.arrival_date;
        self.departure_date = reservation.departure_date;
        self.created_date = reservation.created_date;
        self.cancelled_date = reservation.cancelled_date;
        self.nights = reservation.nights;
        self.adult_count = reservation.adult_count;
        self.guest_name.clone_from(&reservation.guest_name);
    }
}
