use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    Document, DocumentQuery, Result,
    store::{DocumentStore, WriteBatch},
};

/// Serves reads from a fixture store while the primary store is unreachable.
///
/// Only transient failures (see [`crate::DocumentStoreError::is_transient`])
/// trigger the fallback. Writes always go to the primary; a degraded
/// service is read-only.
#[derive(Clone)]
pub struct FallbackDocumentStore<P, F> {
    primary: P,
    fallback: F,
}

impl<P, F> FallbackDocumentStore<P, F> {
    pub fn new(primary: P, fallback: F) -> Self {
        Self { primary, fallback }
    }

    pub fn primary(&self) -> &P {
        &self.primary
    }

    pub fn fallback(&self) -> &F {
        &self.fallback
    }
}

fn record_fallback(operation: &'static str, collection: &str, error: &crate::DocumentStoreError) {
    tracing::warn!(
        operation,
        collection,
        error = %error,
        "Primary document store unavailable, serving fixture data"
    );
    metrics::counter!("document_store_fallback_reads_total", "operation" => operation)
        .increment(1);
}

#[async_trait]
impl<P, F> DocumentStore for FallbackDocumentStore<P, F>
where
    P: DocumentStore,
    F: DocumentStore,
{
    async fn get(&self, collection: &str, id: Uuid) -> Result<Option<Document>> {
        match self.primary.get(collection, id).await {
            Err(e) if e.is_transient() => {
                record_fallback("get", collection, &e);
                self.fallback.get(collection, id).await
            }
            other => other,
        }
    }

    async fn query(&self, query: DocumentQuery) -> Result<Vec<Document>> {
        match self.primary.query(query.clone()).await {
            Err(e) if e.is_transient() => {
                record_fallback("query", &query.collection, &e);
                self.fallback.query(query).await
            }
            other => other,
        }
    }

    async fn commit(&self, batch: WriteBatch) -> Result<Vec<Document>> {
        self.primary.commit(batch).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DocumentStoreError, DocumentStoreExt, InMemoryDocumentStore};
    use serde_json::json;

    async fn stores() -> (
        FallbackDocumentStore<InMemoryDocumentStore, InMemoryDocumentStore>,
        Uuid,
    ) {
        let primary = InMemoryDocumentStore::new();
        let fixtures = InMemoryDocumentStore::new();
        let id = Uuid::new_v4();
        fixtures
            .insert("listings", id, json!({"title": "Fixture Cafe", "status": "active"}))
            .await
            .unwrap();
        (FallbackDocumentStore::new(primary, fixtures), id)
    }

    #[tokio::test]
    async fn reads_primary_when_healthy() {
        let (store, fixture_id) = stores().await;
        assert!(store.get("listings", fixture_id).await.unwrap().is_none());

        let listings = store
            .query(DocumentQuery::collection("listings"))
            .await
            .unwrap();
        assert!(listings.is_empty());
    }

    #[tokio::test]
    async fn reads_fixtures_when_primary_unavailable() {
        let (store, fixture_id) = stores().await;
        store.primary().set_unavailable(true);

        let doc = store.get("listings", fixture_id).await.unwrap().unwrap();
        assert_eq!(doc.body["title"], "Fixture Cafe");

        let listings = store
            .query(DocumentQuery::collection("listings").eq("status", "active"))
            .await
            .unwrap();
        assert_eq!(listings.len(), 1);
    }

    #[tokio::test]
    async fn writes_never_fall_back() {
        let (store, _) = stores().await;
        store.primary().set_unavailable(true);

        let result = store
            .insert("listings", Uuid::new_v4(), json!({"title": "New"}))
            .await;
        assert!(matches!(result, Err(DocumentStoreError::Unavailable(_))));
        assert_eq!(store.fallback().count("listings").await, 1);
    }
}
