//! Acquisition pipeline endpoints and the marketplace bridge.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::PipelineDealId;
use document_store::DocumentStore;
use domain::{BusinessListing, MarketplaceStatus, NewPipelineDeal, PipelineDeal, PipelineDealUpdate};

use super::parse_id;
use crate::auth::Authenticated;
use crate::error::ApiError;
use crate::state::AppState;

/// GET /seedstack/deals: the caller's pipeline.
pub async fn list<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
) -> Result<Json<Vec<PipelineDeal>>, ApiError> {
    Ok(Json(state.pipeline.list(&caller).await?))
}

/// POST /seedstack/deals
pub async fn create<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    Json(new): Json<NewPipelineDeal>,
) -> Result<(StatusCode, Json<PipelineDeal>), ApiError> {
    let deal = state.pipeline.create(&caller, new).await?;
    Ok((StatusCode::CREATED, Json(deal)))
}

/// PUT /seedstack/deals/{id}
pub async fn update<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
    Json(update): Json<PipelineDealUpdate>,
) -> Result<Json<PipelineDeal>, ApiError> {
    let id: PipelineDealId = parse_id(&id)?;
    Ok(Json(state.pipeline.update(&caller, id, update).await?))
}

/// DELETE /seedstack/deals/{id}
pub async fn delete<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id: PipelineDealId = parse_id(&id)?;
    state.pipeline.delete(&caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /seedstack/deals/{id}/publish-to-marketplace
#[tracing::instrument(skip(state))]
pub async fn publish<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<BusinessListing>), ApiError> {
    let id: PipelineDealId = parse_id(&id)?;
    let listing = state.pipeline.publish_to_marketplace(&caller, id).await?;
    Ok((StatusCode::CREATED, Json(listing)))
}

/// GET /integration/marketplace-status/{deal_id}
pub async fn marketplace_status<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    Path(deal_id): Path<String>,
) -> Result<Json<MarketplaceStatus>, ApiError> {
    let deal_id: PipelineDealId = parse_id(&deal_id)?;
    Ok(Json(state.pipeline.marketplace_status(&caller, deal_id).await?))
}
