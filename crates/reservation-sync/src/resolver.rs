//! Maps feed listings onto internal properties.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::StoreResult;
use crate::models::Property;
use crate::store::{PropertyDirectory, SyncStore};

/// How a property was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// Exact match on the stored external listing id.
    ListingId,
    /// Case-insensitive substring match on the property name.
    NameFallback,
}

/// A resolved property and how it was matched.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub property: Property,
    pub matched_by: MatchKind,
}

/// Resolves external listing ids (with an optional name hint) to properties.
pub struct PropertyResolver {
    directory: Arc<dyn SyncStore>,
}

impl PropertyResolver {
    #[must_use]
    pub fn new(directory: Arc<dyn SyncStore>) -> Self {
        Self { directory }
    }

    /// Resolve a listing to a property, or `None` when nothing matches.
    ///
    /// The name fallback only runs when the listing id is unknown and a hint
    /// was supplied. A fallback hit is reported so an operator can backfill
    /// the listing id; the id is never written from here.
    pub async fn resolve(
        &self,
        listing_id: &str,
        name_hint: Option<&str>,
    ) -> StoreResult<Option<Resolution>> {
        if let Some(property) = self.directory.property_by_listing_id(listing_id).await? {
            return Ok(Some(Resolution {
                property,
                matched_by: MatchKind::ListingId,
            }));
        }

        let Some(hint) = name_hint.map(str::trim).filter(|h| !h.is_empty()) else {
            debug!(listing_id, "No property for listing and no name hint");
            return Ok(None);
        };

        let needle = hint.to_lowercase();
        let mut candidates: Vec<Property> = self
            .directory
            .list_properties()
            .await?
            .into_iter()
            .filter(|p| {
                let name = p.name.trim().to_lowercase();
                !name.is_empty() && name.contains(&needle)
            })
            .collect();

        // Prefer properties that have no listing id yet, then the shortest name.
        candidates.sort_by_key(|p| (p.external_listing_id.is_some(), p.name.len()));

        let Some(property) = candidates.into_iter().next() else {
            debug!(listing_id, hint, "No property matched listing name");
            return Ok(None);
        };

        info!(
            listing_id,
            property_id = %property.id,
            property_name = %property.name,
            "Matched property by name; recommend backfilling its external listing id"
        );

        Ok(Some(Resolution {
            property,
            matched_by: MatchKind::NameFallback,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::NaiveTime;

    fn property(id: &str, name: &str, listing: Option<&str>) -> Property {
        Property {
            id: id.to_string(),
            tenant_id: "t1".to_string(),
            external_listing_id: listing.map(ToString::to_string),
            name: name.to_string(),
            address: String::new(),
            default_service_duration_minutes: 120,
            default_service_cost: 0.0,
            check_in_time: NaiveTime::from_hms_opt(15, 0, 0).unwrap(),
            check_out_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            client_id: "c1".to_string(),
        }
    }

    async fn resolver() -> (PropertyResolver, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new("t1"));
        store.add_property(property("p12", "Apt Centro", Some("12"))).await;
        store.add_property(property("p13", "Casa Azul Playa", None)).await;
        (PropertyResolver::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_resolves_by_listing_id() {
        let (resolver, _) = resolver().await;
        let resolution = resolver.resolve("12", Some("whatever")).await.unwrap().unwrap();
        assert_eq!(resolution.property.id, "p12");
        assert_eq!(resolution.matched_by, MatchKind::ListingId);
    }

    #[tokio::test]
    async fn test_falls_back_to_name_substring() {
        let (resolver, store) = resolver().await;
        let resolution = resolver
            .resolve("99", Some("casa azul"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolution.property.id, "p13");
        assert_eq!(resolution.matched_by, MatchKind::NameFallback);

        // The listing id is not written back.
        let stored = store.get_property("p13").await.unwrap().unwrap();
        assert!(stored.external_listing_id.is_none());
    }

    #[tokio::test]
    async fn test_not_found_without_hint() {
        let (resolver, _) = resolver().await;
        assert!(resolver.resolve("99", None).await.unwrap().is_none());
        assert!(resolver.resolve("99", Some("  ")).await.unwrap().is_none());
        assert!(resolver.resolve("99", Some("Loft")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_name_fallback_needs_name_to_contain_hint() {
        let (resolver, store) = resolver().await;
        store.add_property(property("p20", "", None)).await;

        // The hint contains a property name, but not the other way round.
        assert!(resolver
            .resolve("99", Some("Apt Centro Deluxe"))
            .await
            .unwrap()
            .is_none());

        // A nameless property never matches.
        let resolution = resolver.resolve("99", Some("azul")).await.unwrap().unwrap();
        assert_eq!(resolution.property.id, "p13");
    }
}
