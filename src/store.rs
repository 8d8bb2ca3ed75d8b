//! Vector store abstraction.
//!
//! Defines the [`VectorStore`] trait — a similarity-searchable id→(vector,
//! payload) store with named collections — plus the [`SearchFilter`]
//! exact-match condition set used for tenant scoping. Stores are
//! dependency-injected `Arc<dyn VectorStore>` handles, never ambient
//! globals, so the retrieval engine stays testable against the in-memory
//! backend.

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::config::StoreConfig;
use crate::models::{PointRecord, SearchHit};
use crate::store_memory::MemoryStore;

/// A set of exact-match conditions over payload fields. All conditions must
/// hold (`must` semantics). Tenant-scoped operations always carry the
/// tenant condition.
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    pub conditions: Vec<(String, serde_json::Value)>,
}

impl SearchFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an equality condition. Values must be strings, integers, or
    /// booleans; other JSON types are not matchable by every backend.
    pub fn must(mut self, field: &str, value: serde_json::Value) -> Self {
        self.conditions.push((field.to_string(), value));
        self
    }

    /// Evaluate the filter against a payload (used by the in-memory store;
    /// the Qdrant backend filters server-side).
    pub fn matches(&self, payload: &crate::models::PointPayload) -> bool {
        self.conditions
            .iter()
            .all(|(field, value)| payload.field(field).as_ref() == Some(value))
    }
}

/// A similarity-searchable store of vector points grouped into named,
/// dimension-fixed collections with cosine distance.
///
/// Mutation and lifecycle failures propagate to the caller; the read-side
/// degradation policy (empty results on failure) lives in the retrieval
/// engine, not here.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the collection if missing, including the tenant keyword index.
    /// Idempotent: an existing collection is a no-op, never an error.
    async fn ensure_collection(&self, name: &str, dimension: usize) -> Result<()>;

    /// Drop the collection and all its points.
    async fn delete_collection(&self, name: &str) -> Result<()>;

    /// Insert or replace points by id in a single batch call.
    async fn upsert(&self, collection: &str, points: &[PointRecord]) -> Result<()>;

    /// Fetch one point by id, vector included. `None` when absent.
    async fn retrieve(&self, collection: &str, id: &str) -> Result<Option<PointRecord>>;

    /// Delete points by id. Unknown ids are ignored.
    async fn delete_points(&self, collection: &str, ids: &[String]) -> Result<()>;

    /// Filtered nearest-neighbor search, descending score, at most `limit`
    /// results, excluding scores below `score_threshold`.
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        filter: &SearchFilter,
        limit: usize,
        score_threshold: f32,
    ) -> Result<Vec<SearchHit>>;

    /// Filtered enumeration without ranking (scores are `0.0`), up to
    /// `limit` points in insertion-adjacent order.
    async fn scroll(
        &self,
        collection: &str,
        filter: &SearchFilter,
        limit: usize,
    ) -> Result<Vec<SearchHit>>;

    /// Number of points in the collection.
    async fn count(&self, collection: &str) -> Result<usize>;
}

/// Open the store backend selected by configuration.
pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn VectorStore>> {
    match config.backend.as_str() {
        "memory" => Ok(Arc::new(MemoryStore::new())),
        #[cfg(feature = "qdrant")]
        "qdrant" => {
            let url = config
                .url
                .as_deref()
                .unwrap_or("http://localhost:6334");
            Ok(Arc::new(crate::store_qdrant::QdrantStore::new(url)?))
        }
        #[cfg(not(feature = "qdrant"))]
        "qdrant" => bail!("store backend 'qdrant' requires the 'qdrant' build feature"),
        other => bail!("unknown store backend: {}", other),
    }
}
