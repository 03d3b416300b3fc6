//! Business listing endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::{ListingId, UserId};
use document_store::DocumentStore;
use domain::{BusinessListing, ListingFilter, ListingUpdate, NewListing};
use serde::Deserialize;

use super::parse_id;
use crate::auth::Authenticated;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct FeaturedParams {
    pub limit: Option<usize>,
}

/// POST /listings: create a draft listing.
#[tracing::instrument(skip(state, new))]
pub async fn create<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    Json(new): Json<NewListing>,
) -> Result<(StatusCode, Json<BusinessListing>), ApiError> {
    let listing = state.listings.create(&caller, new).await?;
    Ok((StatusCode::CREATED, Json(listing)))
}

/// GET /listings: search listings. Public.
#[tracing::instrument(skip(state))]
pub async fn search<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(filter): Query<ListingFilter>,
) -> Result<Json<Vec<BusinessListing>>, ApiError> {
    Ok(Json(state.listings.search(&filter).await?))
}

/// GET /listings/featured: the best funded active listings. Public.
pub async fn featured<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(params): Query<FeaturedParams>,
) -> Result<Json<Vec<BusinessListing>>, ApiError> {
    Ok(Json(state.listings.featured(params.limit).await?))
}

/// GET /listings/seller/{seller_id}: every listing of one seller. Public.
pub async fn by_seller<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(seller_id): Path<String>,
) -> Result<Json<Vec<BusinessListing>>, ApiError> {
    let seller_id: UserId = parse_id(&seller_id)?;
    Ok(Json(state.listings.by_seller(seller_id).await?))
}

/// GET /listings/{id}: one listing. Public.
pub async fn get<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<BusinessListing>, ApiError> {
    let id: ListingId = parse_id(&id)?;
    Ok(Json(state.listings.get(id).await?))
}

/// PUT /listings/{id}: edit descriptive and financial fields.
#[tracing::instrument(skip(state, update))]
pub async fn update<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
    Json(update): Json<ListingUpdate>,
) -> Result<Json<BusinessListing>, ApiError> {
    let id: ListingId = parse_id(&id)?;
    Ok(Json(state.listings.update(&caller, id, update).await?))
}

/// PUT /listings/{id}/publish: draft to active.
#[tracing::instrument(skip(state))]
pub async fn publish<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
) -> Result<Json<BusinessListing>, ApiError> {
    let id: ListingId = parse_id(&id)?;
    Ok(Json(state.listings.publish(&caller, id).await?))
}

/// DELETE /listings/{id}
#[tracing::instrument(skip(state))]
pub async fn delete<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id: ListingId = parse_id(&id)?;
    state.listings.delete(&caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
