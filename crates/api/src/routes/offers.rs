//! Offer endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::OfferId;
use document_store::DocumentStore;
use domain::{Deal, NewOffer, Offer};
use workflow::OfferView;

use super::parse_id;
use crate::auth::Authenticated;
use crate::error::ApiError;
use crate::state::AppState;

/// POST /offers: submit an offer on an active listing.
#[tracing::instrument(skip(state, new))]
pub async fn create<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    Json(new): Json<NewOffer>,
) -> Result<(StatusCode, Json<Offer>), ApiError> {
    let offer = state.offers.submit(&caller, new).await?;
    Ok((StatusCode::CREATED, Json(offer)))
}

/// GET /offers: offers the caller made.
pub async fn list_mine<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
) -> Result<Json<Vec<OfferView>>, ApiError> {
    Ok(Json(state.offers.list_for_buyer(&caller).await?))
}

/// GET /offers/seller: offers on the caller's listings.
pub async fn list_received<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
) -> Result<Json<Vec<OfferView>>, ApiError> {
    Ok(Json(state.offers.list_for_seller(&caller).await?))
}

/// GET /offers/{id}
pub async fn get<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
) -> Result<Json<OfferView>, ApiError> {
    let id: OfferId = parse_id(&id)?;
    Ok(Json(state.offers.get(&caller, id).await?))
}

/// POST /offers/{id}/accept: accept the offer and open its deal.
#[tracing::instrument(skip(state))]
pub async fn accept<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
) -> Result<Json<Deal>, ApiError> {
    let id: OfferId = parse_id(&id)?;
    Ok(Json(state.offers.accept(&caller, id).await?))
}

/// POST /offers/{id}/reject
#[tracing::instrument(skip(state))]
pub async fn reject<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
) -> Result<Json<Offer>, ApiError> {
    let id: OfferId = parse_id(&id)?;
    Ok(Json(state.offers.reject(&caller, id).await?))
}
