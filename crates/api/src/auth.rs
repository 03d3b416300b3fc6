//! Bearer token authentication.
//!
//! Tokens are HS256 JWTs issued elsewhere. The subject is the user id and
//! `user_type` carries the role.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use common::UserId;
use document_store::DocumentStore;
use domain::{Caller, Role};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

/// Payload of a bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    pub user_type: Role,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Verifies bearer tokens and resolves them to callers.
#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn verify(&self, token: &str) -> Result<Caller, ApiError> {
        self.identify(token).map(|identity| identity.caller)
    }

    /// Like [`TokenVerifier::verify`], also keeping the token's email.
    pub fn identify(&self, token: &str) -> Result<Identity, ApiError> {
        let claims = decode::<Claims>(token, &self.key, &self.validation)
            .map_err(|err| {
                let reason = match err.kind() {
                    ErrorKind::ExpiredSignature => "Token expired",
                    ErrorKind::InvalidSignature => "Invalid signature",
                    _ => "Invalid token",
                };
                tracing::debug!(error = %err, "Rejected bearer token");
                ApiError::Unauthenticated(reason.to_string())
            })?
            .claims;

        let user_id = claims
            .sub
            .parse::<UserId>()
            .map_err(|_| ApiError::Unauthenticated("Invalid token subject".to_string()))?;
        Ok(Identity {
            caller: Caller::new(user_id, claims.user_type),
            email: claims.email,
        })
    }

    /// Resolves the `Authorization` header of a request.
    pub fn authenticate(&self, parts: &Parts) -> Result<Caller, ApiError> {
        self.identify(bearer_token(parts)?).map(|identity| identity.caller)
    }
}

fn bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or_else(|| ApiError::Unauthenticated("Not authenticated".to_string()))?;
    header
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::Unauthenticated("Invalid authorization header".to_string()))
}

/// A verified token: the caller plus the email it was issued for.
#[derive(Debug, Clone)]
pub struct Identity {
    pub caller: Caller,
    pub email: Option<String>,
}

impl<S> FromRequestParts<Arc<AppState<S>>> for Identity
where
    S: DocumentStore + Clone + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<S>>,
    ) -> Result<Self, Self::Rejection> {
        state.verifier.identify(bearer_token(parts)?)
    }
}

/// The authenticated caller of a request. Rejects with 401 when the bearer
/// token is missing or invalid.
#[derive(Debug, Clone, Copy)]
pub struct Authenticated(pub Caller);

impl<S> FromRequestParts<Arc<AppState<S>>> for Authenticated
where
    S: DocumentStore + Clone + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<S>>,
    ) -> Result<Self, Self::Rejection> {
        state.verifier.authenticate(parts).map(Authenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};

    const SECRET: &str = "test-secret";

    fn now() -> u64 {
        chrono::Utc::now().timestamp() as u64
    }

    fn token(sub: &str, role: Role, exp: u64, secret: &str) -> String {
        let claims = Claims {
            sub: sub.to_string(),
            email: Some("someone@example.com".into()),
            user_type: role,
            iat: now(),
            exp,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn valid_token_resolves_caller() {
        let user = UserId::new();
        let verifier = TokenVerifier::new(SECRET);
        let caller = verifier
            .verify(&token(&user.to_string(), Role::Seller, now() + 600, SECRET))
            .unwrap();
        assert_eq!(caller.user_id, user);
        assert_eq!(caller.role, Role::Seller);
    }

    #[test]
    fn identify_keeps_email() {
        let user = UserId::new();
        let identity = TokenVerifier::new(SECRET)
            .identify(&token(&user.to_string(), Role::Buyer, now() + 600, SECRET))
            .unwrap();
        assert_eq!(identity.caller.user_id, user);
        assert_eq!(identity.email.as_deref(), Some("someone@example.com"));
    }

    #[test]
    fn expired_wrongly_signed_and_bad_subject_are_rejected() {
        let verifier = TokenVerifier::new(SECRET);
        let user = UserId::new().to_string();

        for bad in [
            token(&user, Role::Buyer, now() - 3600, SECRET),
            token(&user, Role::Buyer, now() + 600, "other-secret"),
            token("not-a-uuid", Role::Buyer, now() + 600, SECRET),
            "garbage".to_string(),
        ] {
            assert!(matches!(
                verifier.verify(&bad),
                Err(ApiError::Unauthenticated(_))
            ));
        }
    }
}
