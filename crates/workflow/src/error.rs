//! Workflow error types.

use std::time::Duration;

use document_store::DocumentStoreError;
use domain::DomainError;
use thiserror::Error;

/// Errors that can occur during workflow operations.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// A domain rule, lookup or store call failed.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// The operation did not finish within the configured timeout. Nothing
    /// was partially applied; the call may be retried.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Records disagree in a way the request cannot resolve, such as a deal
    /// whose listing is not under a letter of intent.
    #[error("Inconsistent workflow state: {0}")]
    Inconsistent(String),
}

impl From<DocumentStoreError> for WorkflowError {
    fn from(error: DocumentStoreError) -> Self {
        WorkflowError::Domain(error.into())
    }
}

impl WorkflowError {
    pub fn invalid_state(message: impl Into<String>) -> Self {
        WorkflowError::Domain(DomainError::invalid_state(message))
    }

    /// Returns true when repeating the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkflowError::Timeout(_) => true,
            WorkflowError::Domain(e) => e.is_transient(),
            WorkflowError::Inconsistent(_) => false,
        }
    }
}

/// Convenience type alias for workflow results.
pub type Result<T> = std::result::Result<T, WorkflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_outage_is_retryable() {
        let error = WorkflowError::from(DocumentStoreError::Unavailable("down".into()));
        assert!(error.is_retryable());
        assert!(WorkflowError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(!WorkflowError::invalid_state("nope").is_retryable());
    }
}
