//! Deal endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::DealId;
use document_store::DocumentStore;
use domain::{Deal, DealDocument, NewDealDocument, NewTimelineEvent, TimelineEvent};
use workflow::DealView;

use super::parse_id;
use crate::auth::Authenticated;
use crate::error::ApiError;
use crate::state::AppState;

/// GET /deals: deals the caller is a party to.
pub async fn list<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
) -> Result<Json<Vec<DealView>>, ApiError> {
    Ok(Json(state.deals.list_for_caller(&caller).await?))
}

/// GET /deals/{id}: the deal with its listing and timeline.
pub async fn get<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
) -> Result<Json<DealView>, ApiError> {
    let id: DealId = parse_id(&id)?;
    Ok(Json(state.deals.get(&caller, id).await?))
}

/// POST /deals/{id}/timeline
#[tracing::instrument(skip(state, new))]
pub async fn append_timeline<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
    Json(new): Json<NewTimelineEvent>,
) -> Result<(StatusCode, Json<TimelineEvent>), ApiError> {
    let id: DealId = parse_id(&id)?;
    let event = state.deals.append_timeline(&caller, id, new).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

/// POST /deals/{id}/complete
#[tracing::instrument(skip(state))]
pub async fn complete<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
) -> Result<Json<Deal>, ApiError> {
    let id: DealId = parse_id(&id)?;
    Ok(Json(state.deals.complete(&caller, id).await?))
}

/// POST /deals/{id}/documents
#[tracing::instrument(skip(state, new))]
pub async fn add_document<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
    Json(new): Json<NewDealDocument>,
) -> Result<(StatusCode, Json<DealDocument>), ApiError> {
    let id: DealId = parse_id(&id)?;
    let document = state.deals.add_document(&caller, id, new).await?;
    Ok((StatusCode::CREATED, Json(document)))
}

/// GET /deals/{id}/documents
pub async fn list_documents<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
) -> Result<Json<Vec<DealDocument>>, ApiError> {
    let id: DealId = parse_id(&id)?;
    Ok(Json(state.deals.list_documents(&caller, id).await?))
}
