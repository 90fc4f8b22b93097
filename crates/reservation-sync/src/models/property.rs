use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// A rentable unit, owned by the property-management service.
///
/// Read-only from the sync engine's point of view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub id: String,
    pub tenant_id: String,
    /// Identifier of the matching listing in the reservation feed.
    #[serde(default)]
    pub external_listing_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub address: String,
    pub default_service_duration_minutes: u32,
    #[serde(default)]
    pub default_service_cost: f64,
    pub check_in_time: NaiveTime,
    pub check_out_time: NaiveTime,
    pub client_id: String,
}

impl Property {
    /// The start of the turnover slot for cleanings at this property.
    ///
    /// Cleanings start when the departing guest checks out.
    #[must_use]
    pub fn turnover_start(&self) -> NaiveTime {
        self.check_out_time
    }
}
