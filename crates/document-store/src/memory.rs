use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    Document, DocumentQuery, DocumentStoreError, Result, Version,
    store::{DocumentStore, WriteBatch, WriteOp, validate_batch},
};

type Key = (String, Uuid);

#[derive(Default)]
struct MemoryState {
    documents: HashMap<Key, Document>,
    last_seq: i64,
}

/// In-memory document store.
///
/// Provides the same atomicity and precondition semantics as the
/// PostgreSQL implementation: a batch is staged and checked under a single
/// write lock, then published in one step. Also offers switches to
/// simulate an unreachable or slow backend.
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    state: Arc<RwLock<MemoryState>>,
    unavailable: Arc<AtomicBool>,
    latency_ms: Arc<AtomicU64>,
}

impl InMemoryDocumentStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent operation fail with `Unavailable` (or succeed
    /// again when `false`).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Delays every subsequent operation by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Returns the number of documents in a collection.
    pub async fn count(&self, collection: &str) -> usize {
        self.state
            .read()
            .await
            .documents
            .keys()
            .filter(|(c, _)| c == collection)
            .count()
    }

    /// Removes every document.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.documents.clear();
    }

    async fn enter(&self) -> Result<()> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DocumentStoreError::Unavailable(
                "in-memory store switched off".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, collection: &str, id: Uuid) -> Result<Option<Document>> {
        self.enter().await?;
        let state = self.state.read().await;
        Ok(state.documents.get(&(collection.to_string(), id)).cloned())
    }

    async fn query(&self, query: DocumentQuery) -> Result<Vec<Document>> {
        self.enter().await?;
        let state = self.state.read().await;
        Ok(query.apply(state.documents.values()))
    }

    async fn commit(&self, batch: WriteBatch) -> Result<Vec<Document>> {
        validate_batch(&batch)?;
        self.enter().await?;

        let mut state = self.state.write().await;
        let now = Utc::now();
        let mut last_seq = state.last_seq;
        let mut staged: HashMap<Key, Option<Document>> = HashMap::new();
        let mut written = Vec::new();

        for op in batch.into_ops() {
            let key = (op.collection().to_string(), op.id());
            let current = match staged.get(&key) {
                Some(doc) => doc.clone(),
                None => state.documents.get(&key).cloned(),
            };

            match op {
                WriteOp::Insert {
                    collection,
                    id,
                    body,
                } => {
                    if current.is_some() {
                        return Err(DocumentStoreError::AlreadyExists { collection, id });
                    }
                    last_seq += 1;
                    let doc = Document {
                        collection,
                        id,
                        version: Version::first(),
                        seq: last_seq,
                        created_at: now,
                        updated_at: now,
                        body,
                    };
                    written.push(doc.clone());
                    staged.insert(key, Some(doc));
                }
                WriteOp::Patch {
                    collection,
                    id,
                    patch,
                    precondition,
                } => {
                    let Some(mut doc) = current else {
                        return Err(DocumentStoreError::NotFound { collection, id });
                    };
                    precondition.check(&doc).map_err(|reason| {
                        DocumentStoreError::PreconditionFailed {
                            collection: collection.clone(),
                            id,
                            reason,
                        }
                    })?;
                    doc.apply_patch(&patch, now);
                    written.push(doc.clone());
                    staged.insert(key, Some(doc));
                }
                WriteOp::Delete {
                    collection,
                    id,
                    precondition,
                } => {
                    let Some(doc) = current else {
                        return Err(DocumentStoreError::NotFound { collection, id });
                    };
                    precondition.check(&doc).map_err(|reason| {
                        DocumentStoreError::PreconditionFailed {
                            collection: collection.clone(),
                            id,
                            reason,
                        }
                    })?;
                    staged.insert(key, None);
                }
                WriteOp::Check {
                    collection,
                    id,
                    precondition,
                } => {
                    let Some(doc) = current else {
                        return Err(DocumentStoreError::NotFound { collection, id });
                    };
                    precondition.check(&doc).map_err(|reason| {
                        DocumentStoreError::PreconditionFailed {
                            collection: collection.clone(),
                            id,
                            reason,
                        }
                    })?;
                }
            }
        }

        // Nothing above touched `state`, so an early return discards the batch.
        state.last_seq = last_seq;
        for (key, doc) in staged {
            match doc {
                Some(doc) => {
                    state.documents.insert(key, doc);
                }
                None => {
                    state.documents.remove(&key);
                }
            }
        }

        Ok(written)
    }
}
