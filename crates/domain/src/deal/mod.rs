//! Deals, their timelines and documents.

mod document;
mod model;
pub mod timeline;

pub use document::{DealDocument, NewDealDocument};
pub use model::{Deal, DealStatus, deal_id_for_offer};
pub use timeline::{NewTimelineEvent, TimelineEvent};
