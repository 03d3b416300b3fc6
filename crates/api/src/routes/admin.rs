//! Operator endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use document_store::DocumentStore;
use workflow::ReconcileReport;

use crate::auth::Authenticated;
use crate::error::ApiError;
use crate::state::AppState;

/// POST /admin/reconcile: repair records left out of step. Admins only.
#[tracing::instrument(skip(state))]
pub async fn reconcile<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
) -> Result<Json<ReconcileReport>, ApiError> {
    Ok(Json(state.reconciler.run_as(&caller).await?))
}
