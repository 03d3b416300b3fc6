//! Read models returned to callers: records with their related records
//! embedded.

use domain::{BusinessListing, Deal, Offer, TimelineEvent};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct OfferView {
    #[serde(flatten)]
    pub offer: Offer,
    /// `None` when the listing has since been deleted.
    pub business: Option<BusinessListing>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DealView {
    #[serde(flatten)]
    pub deal: Deal,
    pub business: Option<BusinessListing>,
    /// In the order the events were recorded.
    pub timeline_events: Vec<TimelineEvent>,
}
