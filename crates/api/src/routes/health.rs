//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use document_store::DocumentStore;
use domain::{BusinessListing, Record};
use serde::Serialize;
use uuid::Uuid;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub store: &'static str,
}

/// GET /health: 200 while the document store answers, 503 otherwise.
///
/// Probes with a point lookup that never matches, so the check costs one
/// indexed read.
pub async fn check<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> (StatusCode, Json<HealthResponse>) {
    let store = state.listings.repository().store();
    match store.get(BusinessListing::COLLECTION, Uuid::nil()).await {
        Ok(_) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                store: "ok",
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check failed to reach the document store");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "degraded",
                    store: "unavailable",
                }),
            )
        }
    }
}
