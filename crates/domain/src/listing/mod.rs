//! Business listings.

mod model;
mod service;
mod state;

pub use model::{
    BusinessListing, DEFAULT_FEATURED, DEFAULT_PAGE_SIZE, ListingFilter, ListingUpdate,
    MAX_FEATURED, MAX_PAGE_SIZE, NewListing,
};
pub use service::ListingService;
pub use state::ListingStatus;
