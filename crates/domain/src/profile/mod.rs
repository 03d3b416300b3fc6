//! User profiles and onboarding.

mod model;
mod service;

pub use model::{Profile, ProfileUpdate};
pub use service::ProfileService;
