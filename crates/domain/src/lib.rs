//! Domain layer for the SeedSMB marketplace.
//!
//! This crate provides:
//! - Records for listings, offers, deals, timeline events, deal documents,
//!   investments, pipeline deals and user profiles
//! - A typed `Repository` over any `DocumentStore`
//! - Callers, roles and the central authorization policy
//! - The listing registry, investment ledger, pipeline and profile services

pub mod deal;
pub mod error;
pub mod identity;
pub mod investment;
pub mod listing;
pub mod money;
pub mod offer;
pub mod pipeline;
pub mod policy;
pub mod profile;
pub mod record;
pub mod repository;

pub use deal::{
    Deal, DealDocument, DealStatus, NewDealDocument, NewTimelineEvent, TimelineEvent,
    deal_id_for_offer,
};
pub use error::DomainError;
pub use identity::{Caller, Role};
pub use investment::{Investment, InvestmentLedger, NewInvestment};
pub use listing::{
    BusinessListing, ListingFilter, ListingService, ListingStatus, ListingUpdate, NewListing,
};
pub use money::Money;
pub use offer::{FinancingTerms, NewOffer, Offer, OfferStatus};
pub use pipeline::{
    MarketplaceStatus, NewPipelineDeal, PipelineDeal, PipelineDealUpdate, PipelineService,
    PipelineStage, Priority,
};
pub use policy::{AccessDenied, Action, Parties, authorize};
pub use profile::{Profile, ProfileService, ProfileUpdate};
pub use record::{Record, Versioned};
pub use repository::Repository;
