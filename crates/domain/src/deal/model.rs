//! Deal records.

use chrono::{DateTime, Utc};
use common::{DealId, ListingId, OfferId, UserId};
use document_store::Patch;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::listing::BusinessListing;
use crate::offer::Offer;
use crate::policy::Parties;
use crate::record::{Record, fields};

/// Namespace for deriving deal ids from offer ids.
const DEAL_NAMESPACE: Uuid = Uuid::from_u128(0x5eed_5a1e_d3a1_4c0f_9b7e_0ffe_12ac_ce97);

/// The deal created by accepting `offer_id`.
///
/// Derived deterministically, so an offer can never produce two deals.
pub fn deal_id_for_offer(offer_id: OfferId) -> DealId {
    DealId::from_uuid(Uuid::new_v5(&DEAL_NAMESPACE, offer_id.as_uuid().as_bytes()))
}

/// The status of a deal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DealStatus {
    #[default]
    InProgress,
    Completed,
}

impl DealStatus {
    pub fn can_complete(&self) -> bool {
        matches!(self, DealStatus::InProgress)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DealStatus::InProgress => "in_progress",
            DealStatus::Completed => "completed",
        }
    }
}

impl std::fmt::Display for DealStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A transaction in progress between the buyer of an accepted offer and the
/// listing's seller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub id: DealId,
    pub business_id: ListingId,
    pub seller_id: UserId,
    pub buyer_id: UserId,
    pub offer_id: OfferId,
    pub status: DealStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for Deal {
    type Id = DealId;
    const COLLECTION: &'static str = "deals";
    const KIND: &'static str = "Deal";

    fn id(&self) -> DealId {
        self.id
    }
}

impl Deal {
    /// Opens the deal for an accepted offer.
    pub fn open(offer: &Offer, listing: &BusinessListing, now: DateTime<Utc>) -> Self {
        Self {
            id: deal_id_for_offer(offer.id),
            business_id: listing.id,
            seller_id: listing.seller_id,
            buyer_id: offer.buyer_id,
            offer_id: offer.id,
            status: DealStatus::InProgress,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn status_fields(status: DealStatus, now: DateTime<Utc>) -> Patch {
        fields(json!({ "status": status, "updated_at": now }))
    }

    pub fn parties(&self) -> Parties {
        Parties::none()
            .seller(self.seller_id)
            .buyer(self.buyer_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deal_id_is_stable_per_offer() {
        let offer = OfferId::new();
        assert_eq!(deal_id_for_offer(offer), deal_id_for_offer(offer));
        assert_ne!(deal_id_for_offer(offer), deal_id_for_offer(OfferId::new()));
    }

    #[test]
    fn only_in_progress_completes() {
        assert!(DealStatus::InProgress.can_complete());
        assert!(!DealStatus::Completed.can_complete());
        assert_eq!(
            serde_json::to_value(DealStatus::InProgress).unwrap(),
            "in_progress"
        );
    }
}
