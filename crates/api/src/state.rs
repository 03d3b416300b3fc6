//! Shared application state.

use document_store::DocumentStore;
use domain::{InvestmentLedger, ListingService, PipelineService, ProfileService};
use workflow::{DealWorkflow, OfferWorkflow, Reconciler, WorkflowConfig};

use crate::auth::TokenVerifier;

/// Services shared by all handlers. Every service holds a handle to the same
/// store.
pub struct AppState<S: DocumentStore> {
    pub listings: ListingService<S>,
    pub investments: InvestmentLedger<S>,
    pub pipeline: PipelineService<S>,
    pub profiles: ProfileService<S>,
    pub offers: OfferWorkflow<S>,
    pub deals: DealWorkflow<S>,
    pub reconciler: Reconciler<S>,
    pub verifier: TokenVerifier,
}

impl<S: DocumentStore + Clone> AppState<S> {
    pub fn new(store: S, workflow: WorkflowConfig, verifier: TokenVerifier) -> Self {
        Self {
            listings: ListingService::new(store.clone()),
            investments: InvestmentLedger::new(store.clone()),
            pipeline: PipelineService::new(store.clone()),
            profiles: ProfileService::new(store.clone()),
            offers: OfferWorkflow::new(store.clone(), workflow.clone()),
            deals: DealWorkflow::new(store.clone(), workflow),
            reconciler: Reconciler::new(store),
            verifier,
        }
    }
}
