use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::{Document, DocumentQuery, DocumentStoreError, Patch, Result, Version};

/// Conditions a document must satisfy for a patch or delete to apply.
///
/// An empty precondition always holds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Precondition {
    /// Expected current version of the document.
    pub expected_version: Option<Version>,

    /// Each listed field must currently equal one of the allowed values.
    pub field_in: Vec<(String, Vec<Value>)>,
}

impl Precondition {
    /// A precondition that always holds.
    pub fn none() -> Self {
        Self::default()
    }

    /// Requires the document to be at exactly `version`.
    pub fn expect_version(version: Version) -> Self {
        Self::none().and_version(version)
    }

    /// Requires `field` to currently hold one of `values`.
    pub fn field_in<V: Into<Value>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::none().and_field_in(field, values)
    }

    pub fn and_version(mut self, version: Version) -> Self {
        self.expected_version = Some(version);
        self
    }

    pub fn and_field_in<V: Into<Value>>(
        mut self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.field_in.push((
            field.into(),
            values.into_iter().map(Into::into).collect(),
        ));
        self
    }

    /// Checks the precondition against the current state of a document.
    ///
    /// Returns a human readable reason on failure.
    pub fn check(&self, document: &Document) -> std::result::Result<(), String> {
        if let Some(expected) = self.expected_version
            && document.version != expected
        {
            return Err(format!(
                "expected version {expected}, found {}",
                document.version
            ));
        }
        for (field, allowed) in &self.field_in {
            let actual = document.field(field).unwrap_or(&Value::Null);
            if !allowed.contains(actual) {
                return Err(format!("{field} is {actual}"));
            }
        }
        Ok(())
    }
}

/// A single write inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Creates a document. Fails with `AlreadyExists` if the id is taken.
    Insert {
        collection: String,
        id: Uuid,
        body: Value,
    },

    /// Merges top-level fields into an existing document.
    Patch {
        collection: String,
        id: Uuid,
        patch: Patch,
        precondition: Precondition,
    },

    /// Removes an existing document.
    Delete {
        collection: String,
        id: Uuid,
        precondition: Precondition,
    },

    /// Requires an existing document to satisfy a precondition for the rest
    /// of the batch to apply. Writes nothing, but holds the document steady
    /// until the batch commits.
    Check {
        collection: String,
        id: Uuid,
        precondition: Precondition,
    },
}

impl WriteOp {
    pub fn collection(&self) -> &str {
        match self {
            Self::Insert { collection, .. }
            | Self::Patch { collection, .. }
            | Self::Delete { collection, .. }
            | Self::Check { collection, .. } => collection,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Self::Insert { id, .. }
            | Self::Patch { id, .. }
            | Self::Delete { id, .. }
            | Self::Check { id, .. } => *id,
        }
    }
}

/// An ordered list of writes applied all-or-nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, op: WriteOp) -> Self {
        self.ops.push(op);
        self
    }

    pub fn insert(self, collection: impl Into<String>, id: Uuid, body: Value) -> Self {
        self.push(WriteOp::Insert {
            collection: collection.into(),
            id,
            body,
        })
    }

    pub fn patch(
        self,
        collection: impl Into<String>,
        id: Uuid,
        patch: Patch,
        precondition: Precondition,
    ) -> Self {
        self.push(WriteOp::Patch {
            collection: collection.into(),
            id,
            patch,
            precondition,
        })
    }

    pub fn delete(self, collection: impl Into<String>, id: Uuid, precondition: Precondition) -> Self {
        self.push(WriteOp::Delete {
            collection: collection.into(),
            id,
            precondition,
        })
    }

    pub fn check(self, collection: impl Into<String>, id: Uuid, precondition: Precondition) -> Self {
        self.push(WriteOp::Check {
            collection: collection.into(),
            id,
            precondition,
        })
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

impl Extend<WriteOp> for WriteBatch {
    fn extend<T: IntoIterator<Item = WriteOp>>(&mut self, iter: T) {
        self.ops.extend(iter);
    }
}

/// Validates a batch before any of it is applied.
pub fn validate_batch(batch: &WriteBatch) -> Result<()> {
    if batch.is_empty() {
        return Err(DocumentStoreError::InvalidWrite(
            "cannot commit an empty batch".to_string(),
        ));
    }
    for op in batch.ops() {
        if let WriteOp::Insert { body, .. } = op
            && !body.is_object()
        {
            return Err(DocumentStoreError::InvalidWrite(format!(
                "document body for {}/{} must be a JSON object",
                op.collection(),
                op.id()
            )));
        }
    }
    Ok(())
}

/// Core trait for document store implementations.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Retrieves a document by id. Returns None if it does not exist.
    async fn get(&self, collection: &str, id: Uuid) -> Result<Option<Document>>;

    /// Retrieves the documents matching a query.
    async fn query(&self, query: DocumentQuery) -> Result<Vec<Document>>;

    /// Applies every write in the batch atomically: either all of them take
    /// effect or none does.
    ///
    /// Preconditions are evaluated against the state produced by the
    /// earlier writes of the same batch. Returns the resulting documents of
    /// the inserts and patches, in batch order.
    async fn commit(&self, batch: WriteBatch) -> Result<Vec<Document>>;
}

/// Extension trait providing single-write helpers on top of `commit`.
#[async_trait]
pub trait DocumentStoreExt: DocumentStore {
    async fn insert(&self, collection: &str, id: Uuid, body: Value) -> Result<Document> {
        let batch = WriteBatch::new().insert(collection, id, body);
        single(collection, id, self.commit(batch).await?)
    }

    async fn patch(
        &self,
        collection: &str,
        id: Uuid,
        patch: Patch,
        precondition: Precondition,
    ) -> Result<Document> {
        let batch = WriteBatch::new().patch(collection, id, patch, precondition);
        single(collection, id, self.commit(batch).await?)
    }

    async fn delete(&self, collection: &str, id: Uuid, precondition: Precondition) -> Result<()> {
        let batch = WriteBatch::new().delete(collection, id, precondition);
        self.commit(batch).await.map(|_| ())
    }

    async fn exists(&self, collection: &str, id: Uuid) -> Result<bool> {
        Ok(self.get(collection, id).await?.is_some())
    }
}

impl<T: DocumentStore + ?Sized> DocumentStoreExt for T {}

fn single(collection: &str, id: Uuid, documents: Vec<Document>) -> Result<Document> {
    documents
        .into_iter()
        .next()
        .ok_or_else(|| DocumentStoreError::NotFound {
            collection: collection.to_string(),
            id,
        })
}
