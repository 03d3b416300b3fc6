pub mod types;

pub use types::{
    DealId, DocumentId, IdParseError, InvestmentId, ListingId, OfferId, PipelineDealId,
    TimelineEventId, UserId,
};
