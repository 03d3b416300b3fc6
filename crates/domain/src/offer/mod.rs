//! Offers made by buyers on listings.

mod model;
mod state;

pub use model::{DEFAULT_CLOSING_TIMELINE_DAYS, FinancingTerms, NewOffer, Offer};
pub use state::OfferStatus;
