//! Private acquisition pipeline (CRM) and its bridge to the marketplace.

mod model;
mod service;

pub use model::{
    MarketplaceStatus, NewPipelineDeal, PipelineDeal, PipelineDealUpdate, PipelineStage,
    Priority,
};
pub use service::PipelineService;
