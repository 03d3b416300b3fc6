//! User profile endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::UserId;
use document_store::DocumentStore;
use domain::{Profile, ProfileUpdate, Role};

use super::parse_id;
use crate::auth::{Authenticated, Identity};
use crate::error::ApiError;
use crate::state::AppState;

/// GET /profiles/me: the caller's profile, created on first access.
pub async fn me<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
) -> Result<Json<Profile>, ApiError> {
    let profile = state.profiles.me(&identity.caller, identity.email).await?;
    Ok(Json(profile))
}

/// PUT /profiles/me
pub async fn update_me<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<Profile>, ApiError> {
    let profile = state
        .profiles
        .update_me(&identity.caller, identity.email, update)
        .await?;
    Ok(Json(profile))
}

/// PUT /profiles/me/complete-onboarding
pub async fn complete_onboarding<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
) -> Result<Json<Profile>, ApiError> {
    let profile = state
        .profiles
        .complete_onboarding(&identity.caller, identity.email)
        .await?;
    Ok(Json(profile))
}

/// GET /profiles/{user_id}
pub async fn get<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(_caller): Authenticated,
    Path(user_id): Path<String>,
) -> Result<Json<Profile>, ApiError> {
    let user_id: UserId = parse_id(&user_id)?;
    Ok(Json(state.profiles.get(user_id).await?))
}

/// GET /profiles/type/{user_type}: admins only.
pub async fn by_type<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Authenticated(caller): Authenticated,
    Path(user_type): Path<String>,
) -> Result<Json<Vec<Profile>>, ApiError> {
    let user_type: Role = serde_json::from_value(serde_json::Value::String(user_type))
        .map_err(|_| ApiError::BadRequest("Invalid user type".to_string()))?;
    Ok(Json(state.profiles.by_type(&caller, user_type).await?))
}
