//! Tenant-scoped retrieval engine.
//!
//! Every read and write funnels through [`RetrievalEngine`], which injects
//! the tenant filter, applies the score threshold, hides degraded points
//! from similarity search, and enforces ownership on mutations.
//!
//! Read paths (search, list) are infallible: a store failure is logged and
//! surfaces as empty results. Write paths propagate errors.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use tracing::warn;

use crate::embedding::{fit_dimension, zero_vector, EmbeddingGateway};
use crate::models::{MutationOutcome, PointPayload, PointRecord, SearchHit, TENANT_FIELD};
use crate::store::{SearchFilter, VectorStore};

/// A similarity query: free text embedded on the fly, or a pre-computed
/// vector.
pub enum SearchQuery {
    Text(String),
    #[allow(dead_code)]
    Vector(Vec<f32>),
}

pub struct RetrievalEngine {
    store: Arc<dyn VectorStore>,
    gateway: Arc<dyn EmbeddingGateway>,
    collection: String,
    dimension: usize,
    score_threshold: f32,
}

impl RetrievalEngine {
    pub fn new(
        store: Arc<dyn VectorStore>,
        gateway: Arc<dyn EmbeddingGateway>,
        collection: String,
        dimension: usize,
        score_threshold: f32,
    ) -> Self {
        Self {
            store,
            gateway,
            collection,
            dimension,
            score_threshold,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn gateway(&self) -> &dyn EmbeddingGateway {
        self.gateway.as_ref()
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Write points into the engine's collection.
    pub async fn upsert(&self, points: &[PointRecord]) -> Result<()> {
        self.store.upsert(&self.collection, points).await
    }

    /// Similarity search within one tenant's points.
    ///
    /// The tenant condition is always the first filter; caller-supplied
    /// conditions are appended. Degraded points never appear in results.
    /// Store and embedding failures degrade to an empty result set.
    pub async fn search(
        &self,
        tenant: &str,
        query: SearchQuery,
        extra_filters: &[(String, serde_json::Value)],
        limit: usize,
    ) -> Vec<SearchHit> {
        let vector = match query {
            SearchQuery::Vector(v) => v,
            SearchQuery::Text(text) => match self.gateway.embed(&text).await {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %e, "query embedding failed, falling back to zero vector");
                    zero_vector(self.dimension)
                }
            },
        };
        // Gateways may produce a different native width than the collection.
        let vector = fit_dimension(vector, self.dimension);

        let mut filter = SearchFilter::new().must(TENANT_FIELD, serde_json::json!(tenant));
        for (field, value) in extra_filters {
            filter = filter.must(field, value.clone());
        }

        // Degraded hits are filtered below, after the store applied its own
        // limit, so over-fetch to keep the caller's limit satisfiable.
        let fetch = limit.saturating_mul(2);

        match self
            .store
            .search(
                &self.collection,
                &vector,
                &filter,
                fetch,
                self.score_threshold,
            )
            .await
        {
            Ok(mut hits) => {
                hits.retain(|hit| !hit.payload.degraded);
                hits.truncate(limit);
                hits
            }
            Err(e) => {
                warn!(tenant, error = %e, "search failed, returning no results");
                Vec::new()
            }
        }
    }

    /// Enumerate a tenant's points in insertion order. Degraded points are
    /// included; callers that need the clean subset filter themselves.
    pub async fn list_by_tenant(&self, tenant: &str, limit: usize) -> Vec<SearchHit> {
        let filter = SearchFilter::new().must(TENANT_FIELD, serde_json::json!(tenant));
        match self.store.scroll(&self.collection, &filter, limit).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(tenant, error = %e, "scroll failed, returning no results");
                Vec::new()
            }
        }
    }

    /// Fetch one of the tenant's points by id.
    pub async fn get(&self, tenant: &str, id: &str) -> Result<Option<PointRecord>> {
        self.owned_point(tenant, id).await
    }

    /// Merge caller metadata into a point's payload, if the point exists and
    /// belongs to the tenant. The merge writes to the open metadata map;
    /// patch keys naming a schema field (ownership included) are refused.
    pub async fn update_metadata(
        &self,
        tenant: &str,
        id: &str,
        patch: &BTreeMap<String, serde_json::Value>,
    ) -> Result<MutationOutcome> {
        let Some(mut record) = self.owned_point(tenant, id).await? else {
            return Ok(MutationOutcome::NotFoundOrDenied);
        };

        for (key, value) in patch {
            if PointPayload::is_reserved_field(key) {
                warn!(field = %key, "refusing to patch reserved payload field");
                continue;
            }
            record.payload.extra.insert(key.clone(), value.clone());
        }
        self.store.upsert(&self.collection, &[record]).await?;
        Ok(MutationOutcome::Applied)
    }

    /// Delete a point, if it exists and belongs to the tenant.
    pub async fn delete(&self, tenant: &str, id: &str) -> Result<MutationOutcome> {
        if self.owned_point(tenant, id).await?.is_none() {
            return Ok(MutationOutcome::NotFoundOrDenied);
        }
        self.store
            .delete_points(&self.collection, &[id.to_string()])
            .await?;
        Ok(MutationOutcome::Applied)
    }

    /// Fetch a point only when the tenant owns it. A point belonging to
    /// another tenant reads the same as a missing one.
    async fn owned_point(&self, tenant: &str, id: &str) -> Result<Option<PointRecord>> {
        let record = self.store.retrieve(&self.collection, id).await?;
        Ok(record.filter(|r| r.payload.tenant_id == tenant))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection;
    use crate::models::PointPayload;
    use crate::store_memory::MemoryStore;
    use async_trait::async_trait;

    /// Embeds to a fixed vector; errors on demand.
    struct StubGateway {
        vector: Vec<f32>,
        fail: bool,
    }

    #[async_trait]
    impl EmbeddingGateway for StubGateway {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            if self.fail {
                anyhow::bail!("stub gateway down");
            }
            Ok(self.vector.clone())
        }

        fn dimension(&self) -> usize {
            self.vector.len()
        }
    }

    async fn engine(fail_embed: bool) -> RetrievalEngine {
        let store: Arc<dyn VectorStore> = Arc::new(MemoryStore::new());
        collection::ensure(&store, "docs", 2).await.unwrap();
        RetrievalEngine::new(
            store,
            Arc::new(StubGateway {
                vector: vec![1.0, 0.0],
                fail: fail_embed,
            }),
            "docs".to_string(),
            2,
            0.3,
        )
    }

    fn point(id: &str, tenant: &str, vector: Vec<f32>) -> PointRecord {
        let mut payload = PointPayload::empty();
        payload.tenant_id = tenant.to_string();
        payload.filename = format!("{}.txt", id);
        payload.content = format!("content of {}", id);
        PointRecord {
            id: id.to_string(),
            vector,
            payload,
        }
    }

    #[tokio::test]
    async fn test_search_is_tenant_scoped() {
        let engine = engine(false).await;
        engine
            .upsert(&[
                point("a", "alice", vec![1.0, 0.0]),
                point("b", "bob", vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let hits = engine
            .search("alice", SearchQuery::Text("anything".to_string()), &[], 10)
            .await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "a");
    }

    #[tokio::test]
    async fn test_search_applies_extra_filters() {
        let engine = engine(false).await;
        let mut tagged = point("a", "alice", vec![1.0, 0.0]);
        tagged
            .payload
            .extra
            .insert("course".to_string(), serde_json::json!("math"));
        engine
            .upsert(&[tagged, point("b", "alice", vec![1.0, 0.0])])
            .await
            .unwrap();

        let hits = engine
            .search(
                "alice",
                SearchQuery::Vector(vec![1.0, 0.0]),
                &[("course".to_string(), serde_json::json!("math"))],
                10,
            )
            .await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "a");
    }

    #[tokio::test]
    async fn test_search_excludes_degraded_points() {
        let engine = engine(false).await;
        let mut degraded = point("bad", "alice", vec![1.0, 0.0]);
        degraded.payload.degraded = true;
        engine
            .upsert(&[point("good", "alice", vec![1.0, 0.0]), degraded])
            .await
            .unwrap();

        let hits = engine
            .search("alice", SearchQuery::Vector(vec![1.0, 0.0]), &[], 10)
            .await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "good");

        // Enumeration still shows everything.
        let listed = engine.list_by_tenant("alice", 100).await;
        assert_eq!(listed.len(), 2);
    }

    #[tokio::test]
    async fn test_embed_failure_degrades_to_zero_vector_search() {
        let engine = engine(true).await;
        engine
            .upsert(&[point("a", "alice", vec![1.0, 0.0])])
            .await
            .unwrap();

        // The zero query vector scores 0.0 against everything, below the
        // 0.3 threshold, so the search comes back empty instead of failing.
        let hits = engine
            .search("alice", SearchQuery::Text("q".to_string()), &[], 10)
            .await;
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_search_fits_query_vector_to_collection_dimension() {
        // Gateway speaks 3 components, the collection 2.
        let store: Arc<dyn VectorStore> = Arc::new(MemoryStore::new());
        collection::ensure(&store, "docs", 2).await.unwrap();
        let engine = RetrievalEngine::new(
            store,
            Arc::new(StubGateway {
                vector: vec![1.0, 0.0, 0.7],
                fail: false,
            }),
            "docs".to_string(),
            2,
            0.3,
        );
        engine
            .upsert(&[point("a", "alice", vec![1.0, 0.0])])
            .await
            .unwrap();

        let hits = engine
            .search("alice", SearchQuery::Text("q".to_string()), &[], 10)
            .await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "a");
    }

    #[tokio::test]
    async fn test_degraded_points_do_not_consume_the_limit() {
        let engine = engine(false).await;
        let mut degraded = point("bad", "alice", vec![1.0, 0.0]);
        degraded.payload.degraded = true;
        engine
            .upsert(&[
                degraded,
                point("c1", "alice", vec![0.9, 0.1]),
                point("c2", "alice", vec![0.9, 0.2]),
            ])
            .await
            .unwrap();

        // The degraded point scores highest; it must not crowd clean
        // matches out of a limit-2 result.
        let hits = engine
            .search("alice", SearchQuery::Vector(vec![1.0, 0.0]), &[], 2)
            .await;
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| !h.payload.degraded));
    }

    #[tokio::test]
    async fn test_get_enforces_ownership() {
        let engine = engine(false).await;
        engine
            .upsert(&[point("a", "alice", vec![1.0, 0.0])])
            .await
            .unwrap();

        let record = engine.get("alice", "a").await.unwrap().unwrap();
        assert_eq!(record.payload.filename, "a.txt");

        assert!(engine.get("bob", "a").await.unwrap().is_none());
        assert!(engine.get("alice", "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_metadata_refuses_reserved_fields() {
        let engine = engine(false).await;
        engine
            .upsert(&[point("a", "alice", vec![1.0, 0.0])])
            .await
            .unwrap();

        let mut patch = BTreeMap::new();
        patch.insert("tenant_id".to_string(), serde_json::json!("bob"));
        patch.insert("degraded".to_string(), serde_json::json!(true));
        patch.insert("course".to_string(), serde_json::json!("math"));

        assert_eq!(
            engine.update_metadata("alice", "a", &patch).await.unwrap(),
            MutationOutcome::Applied
        );

        let record = engine.store().retrieve("docs", "a").await.unwrap().unwrap();
        // Ownership and flags untouched, in the struct and on the wire.
        assert_eq!(record.payload.tenant_id, "alice");
        assert!(!record.payload.degraded);
        assert_eq!(record.payload.extra.get("tenant_id"), None);
        assert_eq!(
            record.payload.extra.get("course"),
            Some(&serde_json::json!("math"))
        );
        assert_eq!(
            record.payload.to_value()["tenant_id"],
            serde_json::json!("alice")
        );
    }

    #[tokio::test]
    async fn test_update_metadata_enforces_ownership() {
        let engine = engine(false).await;
        engine
            .upsert(&[point("a", "alice", vec![1.0, 0.0])])
            .await
            .unwrap();

        let mut patch = BTreeMap::new();
        patch.insert("grade".to_string(), serde_json::json!("A"));

        let outcome = engine.update_metadata("bob", "a", &patch).await.unwrap();
        assert_eq!(outcome, MutationOutcome::NotFoundOrDenied);

        let outcome = engine.update_metadata("alice", "a", &patch).await.unwrap();
        assert_eq!(outcome, MutationOutcome::Applied);

        let record = engine.store().retrieve("docs", "a").await.unwrap().unwrap();
        assert_eq!(record.payload.extra.get("grade"), Some(&serde_json::json!("A")));
        // Ownership and vector survive the rewrite.
        assert_eq!(record.payload.tenant_id, "alice");
        assert_eq!(record.vector, vec![1.0, 0.0]);
    }

    #[tokio::test]
    async fn test_delete_enforces_ownership() {
        let engine = engine(false).await;
        engine
            .upsert(&[point("a", "alice", vec![1.0, 0.0])])
            .await
            .unwrap();

        assert_eq!(
            engine.delete("bob", "a").await.unwrap(),
            MutationOutcome::NotFoundOrDenied
        );
        assert_eq!(engine.store().count("docs").await.unwrap(), 1);

        assert_eq!(
            engine.delete("alice", "a").await.unwrap(),
            MutationOutcome::Applied
        );
        assert_eq!(engine.store().count("docs").await.unwrap(), 0);

        assert_eq!(
            engine.delete("alice", "a").await.unwrap(),
            MutationOutcome::NotFoundOrDenied
        );
    }
}
