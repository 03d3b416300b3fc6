use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A set of top-level fields merged into a document body by a patch.
pub type Patch = Map<String, Value>;

/// Version number of a stored document, used for optimistic concurrency.
///
/// A freshly inserted document is at version 1 and every applied patch
/// increments it by one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// The version a document has right after insertion.
    pub fn first() -> Self {
        Self(1)
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// A stored JSON document together with its storage metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Collection the document belongs to (e.g. "offers", "deals").
    pub collection: String,

    /// Identifier, unique within the collection.
    pub id: Uuid,

    /// Current version; see [`Version`].
    pub version: Version,

    /// Store-wide insertion sequence. Strictly increasing in insertion order,
    /// so it orders documents created within the same clock tick.
    pub seq: i64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// The document body. Always a JSON object.
    pub body: Value,
}

impl Document {
    /// Returns a top-level field of the body, if present.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.body.get(name)
    }

    /// Deserializes the body into a typed record.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> serde_json::Result<T> {
        T::deserialize(&self.body)
    }

    /// Merges `patch` into the body and bumps the version.
    pub(crate) fn apply_patch(&mut self, patch: &Patch, now: DateTime<Utc>) {
        if let Value::Object(body) = &mut self.body {
            for (key, value) in patch {
                body.insert(key.clone(), value.clone());
            }
        }
        self.version = self.version.next();
        self.updated_at = now;
    }
}
