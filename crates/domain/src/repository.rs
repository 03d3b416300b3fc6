//! Typed access to records in a document store.

use std::marker::PhantomData;

use document_store::{
    Document, DocumentQuery, DocumentStore, DocumentStoreError, Patch, Precondition, WriteBatch,
    WriteOp,
};

use crate::error::DomainError;
use crate::record::{Record, Versioned};

/// Loads and stores records of one type.
///
/// Thin and stateless: cloning a repository clones the store handle.
pub struct Repository<S, R>
where
    S: DocumentStore,
    R: Record,
{
    store: S,
    _phantom: PhantomData<R>,
}

impl<S, R> Clone for Repository<S, R>
where
    S: DocumentStore + Clone,
    R: Record,
{
    fn clone(&self) -> Self {
        Self::new(self.store.clone())
    }
}

impl<S, R> Repository<S, R>
where
    S: DocumentStore,
    R: Record,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            _phantom: PhantomData,
        }
    }

    /// Returns a reference to the underlying document store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// A query over this record's collection.
    pub fn query() -> DocumentQuery {
        DocumentQuery::collection(R::COLLECTION)
    }

    pub async fn get(&self, id: R::Id) -> Result<Option<R>, DomainError> {
        match self.store.get(R::COLLECTION, id.into()).await? {
            Some(doc) => Ok(Some(Self::decode(&doc)?)),
            None => Ok(None),
        }
    }

    pub async fn get_versioned(&self, id: R::Id) -> Result<Option<Versioned<R>>, DomainError> {
        match self.store.get(R::COLLECTION, id.into()).await? {
            Some(doc) => Ok(Some(Versioned {
                record: Self::decode(&doc)?,
                version: doc.version,
            })),
            None => Ok(None),
        }
    }

    /// Loads a record, failing with `NotFound` if it does not exist.
    pub async fn require(&self, id: R::Id) -> Result<R, DomainError> {
        self.get(id)
            .await?
            .ok_or_else(|| DomainError::not_found(R::KIND, id))
    }

    pub async fn require_versioned(&self, id: R::Id) -> Result<Versioned<R>, DomainError> {
        self.get_versioned(id)
            .await?
            .ok_or_else(|| DomainError::not_found(R::KIND, id))
    }

    pub async fn find(&self, query: DocumentQuery) -> Result<Vec<R>, DomainError> {
        let docs = self.store.query(query).await?;
        docs.iter().map(Self::decode).collect()
    }

    pub async fn insert(&self, record: &R) -> Result<R, DomainError> {
        let batch = WriteBatch::new().push(Self::insert_op(record)?);
        let written = self.store.commit(batch).await?;
        Self::first(written, record.id())
    }

    pub async fn patch(
        &self,
        id: R::Id,
        patch: Patch,
        precondition: Precondition,
    ) -> Result<R, DomainError> {
        let batch = WriteBatch::new().push(Self::patch_op(id, patch, precondition));
        let written = self
            .store
            .commit(batch)
            .await
            .map_err(|e| Self::map_missing(e, id))?;
        Self::first(written, id)
    }

    pub async fn delete(&self, id: R::Id, precondition: Precondition) -> Result<(), DomainError> {
        let batch = WriteBatch::new().push(Self::delete_op(id, precondition));
        self.store
            .commit(batch)
            .await
            .map_err(|e| Self::map_missing(e, id))?;
        Ok(())
    }

    pub fn insert_op(record: &R) -> Result<WriteOp, DomainError> {
        Ok(WriteOp::Insert {
            collection: R::COLLECTION.to_string(),
            id: record.id().into(),
            body: serde_json::to_value(record)?,
        })
    }

    pub fn patch_op(id: R::Id, patch: Patch, precondition: Precondition) -> WriteOp {
        WriteOp::Patch {
            collection: R::COLLECTION.to_string(),
            id: id.into(),
            patch,
            precondition,
        }
    }

    pub fn delete_op(id: R::Id, precondition: Precondition) -> WriteOp {
        WriteOp::Delete {
            collection: R::COLLECTION.to_string(),
            id: id.into(),
            precondition,
        }
    }

    /// Requires the record `id` to satisfy `precondition` when the batch
    /// commits, without writing to it.
    pub fn check_op(id: R::Id, precondition: Precondition) -> WriteOp {
        WriteOp::Check {
            collection: R::COLLECTION.to_string(),
            id: id.into(),
            precondition,
        }
    }

    /// Returns true if `error` is a failed precondition on the record `id`.
    pub fn is_conflict_on(error: &DocumentStoreError, id: R::Id) -> bool {
        error.failed_precondition() == Some((R::COLLECTION, id.into()))
    }

    pub fn decode(doc: &Document) -> Result<R, DomainError> {
        Ok(doc.decode()?)
    }

    fn first(written: Vec<Document>, id: R::Id) -> Result<R, DomainError> {
        match written.first() {
            Some(doc) => Self::decode(doc),
            None => Err(DomainError::not_found(R::KIND, id)),
        }
    }

    fn map_missing(error: DocumentStoreError, id: R::Id) -> DomainError {
        match error {
            DocumentStoreError::NotFound { ref collection, .. } if collection == R::COLLECTION => {
                DomainError::not_found(R::KIND, id)
            }
            other => DomainError::Store(other),
        }
    }
}
