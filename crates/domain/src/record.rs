//! Records persisted as documents.

use document_store::{Patch, Version};
use serde::{Serialize, de::DeserializeOwned};
use uuid::Uuid;

/// A domain record stored as one document in its own collection.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Strongly typed identifier of the record.
    type Id: Copy + Into<Uuid> + From<Uuid> + std::fmt::Display + Send + Sync;

    /// Collection the record is stored in.
    const COLLECTION: &'static str;

    /// Human readable name used in "not found" messages.
    const KIND: &'static str;

    fn id(&self) -> Self::Id;
}

/// A record together with the document version it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<R> {
    pub record: R,
    pub version: Version,
}

/// Builds a patch from a JSON object literal. Non-objects yield an empty patch.
pub fn fields(value: serde_json::Value) -> Patch {
    match value {
        serde_json::Value::Object(map) => map,
        _ => Patch::new(),
    }
}
