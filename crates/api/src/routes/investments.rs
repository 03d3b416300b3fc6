//! Investment endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{InvestmentId, ListingId};
use document_store::DocumentStore;
use domain::{Investment, NewInvestment};

use super::parse_id;
use crate::auth::Authenticated;
use crate::error::ApiError;
use crate::state::AppState;

/// POST /investments: pledge towards a listing's funding target.
#[tracing::instrument(skip(state, new))]
pub async fn create<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    Json(new): Json<NewInvestment>,
) -> Result<(StatusCode, Json<Investment>), ApiError> {
    let investment = state.investments.pledge(&caller, new).await?;
    Ok((StatusCode::CREATED, Json(investment)))
}

/// GET /investments: the caller's own pledges.
pub async fn list_mine<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
) -> Result<Json<Vec<Investment>>, ApiError> {
    Ok(Json(state.investments.list_for_investor(&caller).await?))
}

/// GET /investments/business/{business_id}: pledges on a listing, for its seller.
pub async fn for_business<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    Path(business_id): Path<String>,
) -> Result<Json<Vec<Investment>>, ApiError> {
    let business_id: ListingId = parse_id(&business_id)?;
    Ok(Json(
        state.investments.list_for_listing(&caller, business_id).await?,
    ))
}

/// GET /investments/{id}
pub async fn get<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
) -> Result<Json<Investment>, ApiError> {
    let id: InvestmentId = parse_id(&id)?;
    Ok(Json(state.investments.get(&caller, id).await?))
}
