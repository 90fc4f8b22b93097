//! Wire types of the reservation listing API.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;

use crate::models::{ExternalReservation, ReservationStatus};

/// Envelope returned by `GET /v1/reservations`.
#[derive(Debug, Deserialize)]
pub(super) struct ListResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub result: Vec<serde_json::Value>,
}

/// Token response of `POST /v1/accessTokens`.
#[derive(Debug, Deserialize)]
pub(super) struct TokenResponse {
    pub access_token: String,
}

/// Numeric or string identifiers; the feed is not consistent about which.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(super) enum WireId {
    Number(i64),
    Text(String),
}

impl WireId {
    fn into_string(self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct WireReservation {
    pub id: WireId,
    pub listing_map_id: WireId,
    #[serde(default)]
    pub listing_name: Option<String>,
    pub status: String,
    pub arrival_date: String,
    pub departure_date: String,
    #[serde(default)]
    pub reservation_date: Option<String>,
    #[serde(default)]
    pub cancellation_date: Option<String>,
    #[serde(default)]
    pub nights: Option<u32>,
    #[serde(default)]
    pub adults: Option<u32>,
    #[serde(default)]
    pub guest_name: Option<String>,
}

impl TryFrom<WireReservation> for ExternalReservation {
    type Error = String;

    fn try_from(wire: WireReservation) -> Result<Self, Self::Error> {
        let external_id = wire.id.into_string();
        let arrival_date = parse_date(&wire.arrival_date)
            .ok_or_else(|| format!("reservation {external_id}: bad arrivalDate '{}'", wire.arrival_date))?;
        let departure_date = parse_date(&wire.departure_date).ok_or_else(|| {
            format!(
                "reservation {external_id}: bad departureDate '{}'",
                wire.departure_date
            )
        })?;
        if departure_date < arrival_date {
            return Err(format!(
                "reservation {external_id}: departure {departure_date} before arrival {arrival_date}"
            ));
        }

        let nights = wire.nights.unwrap_or_else(|| {
            u32::try_from((departure_date - arrival_date).num_days()).unwrap_or(0)
        });

        Ok(Self {
            listing_id: wire.listing_map_id.into_string(),
            listing_name: wire.listing_name.filter(|s| !s.trim().is_empty()),
            status: ReservationStatus::parse(&wire.status),
            arrival_date,
            departure_date,
            created_date: wire.reservation_date.as_deref().and_then(parse_timestamp),
            cancelled_date: wire.cancellation_date.as_deref().and_then(parse_timestamp),
            nights,
            adult_count: wire.adults.unwrap_or(0),
            guest_name: wire.guest_name.unwrap_or_default(),
            external_id,
        })
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_timestamp(raw).map(|ts| ts.date()))
}

/// Accepts `YYYY-MM-DD HH:MM:SS`, RFC 3339 and bare dates.
fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .or_else(|| {
            chrono::DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.naive_utc())
        })
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
