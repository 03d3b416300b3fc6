//! Domain error types.

use document_store::DocumentStoreError;
use thiserror::Error;

use crate::policy::AccessDenied;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The requested record does not exist.
    #[error("{kind} not found")]
    NotFound { kind: &'static str, id: String },

    /// The caller is authenticated but may not perform the operation.
    #[error("{0}")]
    Forbidden(String),

    /// The record's current state does not permit the transition.
    #[error("{0}")]
    InvalidState(String),

    /// The request itself is malformed.
    #[error("{0}")]
    Validation(String),

    /// An error occurred in the document store.
    #[error("Document store error: {0}")]
    Store(#[from] DocumentStoreError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Replaces a failed store precondition with an `InvalidState` carrying
    /// `message`; any other error passes through.
    pub fn on_conflict(self, message: impl Into<String>) -> Self {
        match self {
            Self::Store(DocumentStoreError::PreconditionFailed { .. }) => {
                Self::InvalidState(message.into())
            }
            other => other,
        }
    }

    /// Returns true if retrying the same request later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_transient())
    }
}

impl From<AccessDenied> for DomainError {
    fn from(denied: AccessDenied) -> Self {
        DomainError::Forbidden(denied.message.to_string())
    }
}
