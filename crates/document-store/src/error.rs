use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur when interacting with the document store.
#[derive(Debug, Error)]
pub enum DocumentStoreError {
    /// The document does not exist.
    #[error("Document not found: {collection}/{id}")]
    NotFound { collection: String, id: Uuid },

    /// A document with the same id already exists in the collection.
    #[error("Document already exists: {collection}/{id}")]
    AlreadyExists { collection: String, id: Uuid },

    /// A conditional write found the document in a different state than
    /// expected. Nothing in the batch was applied.
    #[error("Precondition failed for {collection}/{id}: {reason}")]
    PreconditionFailed {
        collection: String,
        id: Uuid,
        reason: String,
    },

    /// The write itself is malformed (empty batch, non-object patch, ...).
    #[error("Invalid write: {0}")]
    InvalidWrite(String),

    /// The backing store cannot be reached right now. Safe to retry.
    #[error("Document store unavailable: {0}")]
    Unavailable(String),

    /// The database aborted the transaction to break a lock cycle or a
    /// serialization conflict. Nothing was applied and the write may be
    /// retried as is.
    #[error("Write aborted by contention: {0}")]
    Contention(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// SQLSTATE codes Postgres uses for `deadlock_detected` and
/// `serialization_failure`.
const CONTENTION_CODES: [&str; 2] = ["40P01", "40001"];

impl From<sqlx::Error> for DocumentStoreError {
    fn from(err: sqlx::Error) -> Self {
        let contended = err
            .as_database_error()
            .and_then(|db| db.code())
            .is_some_and(|code| CONTENTION_CODES.contains(&&*code));
        if contended {
            Self::Contention(err.to_string())
        } else {
            Self::Database(err)
        }
    }
}

impl DocumentStoreError {
    /// Returns true when the failure is about reaching the store rather than
    /// about the data, so the same request may succeed later.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Unavailable(_) | Self::Contention(_) => true,
            Self::Database(e) => matches!(
                e,
                sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::Io(_)
                    | sqlx::Error::WorkerCrashed
            ),
            _ => false,
        }
    }

    /// Returns true when the database rolled the write back because of
    /// concurrent transactions rather than because of the data.
    pub fn is_contention(&self) -> bool {
        matches!(self, Self::Contention(_))
    }

    /// Returns the `(collection, id)` of a failed precondition, if that is
    /// what this error is.
    pub fn failed_precondition(&self) -> Option<(&str, Uuid)> {
        match self {
            Self::PreconditionFailed { collection, id, .. } => Some((collection.as_str(), *id)),
            _ => None,
        }
    }
}

/// Result type for document store operations.
pub type Result<T> = std::result::Result<T, DocumentStoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_is_transient() {
        assert!(DocumentStoreError::Unavailable("down".into()).is_transient());
        assert!(DocumentStoreError::Database(sqlx::Error::PoolTimedOut).is_transient());
    }

    #[test]
    fn non_database_sqlx_errors_stay_database_errors() {
        let err = DocumentStoreError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, DocumentStoreError::Database(_)));
        assert!(!err.is_contention());
        assert!(!err.is_transient());
    }

    #[test]
    fn contention_is_transient() {
        let err = DocumentStoreError::Contention("deadlock detected".into());
        assert!(err.is_contention());
        assert!(err.is_transient());
        assert!(err.failed_precondition().is_none());
    }

    #[test]
    fn data_errors_are_not_transient() {
        let err = DocumentStoreError::NotFound {
            collection: "offers".into(),
            id: Uuid::new_v4(),
        };
        assert!(!err.is_transient());
        assert!(!DocumentStoreError::InvalidWrite("empty".into()).is_transient());
    }

    #[test]
    fn failed_precondition_exposes_target() {
        let id = Uuid::new_v4();
        let err = DocumentStoreError::PreconditionFailed {
            collection: "listings".into(),
            id,
            reason: "status".into(),
        };
        assert_eq!(err.failed_precondition(), Some(("listings", id)));
    }
}
