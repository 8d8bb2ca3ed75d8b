//! In-memory vector store using cosine similarity.
//!
//! A `tokio::sync::RwLock`-guarded map of collections, each an
//! insertion-ordered list of points. Backs the default configuration,
//! development setups, and every test that needs a store without a running
//! Qdrant.

use std::collections::HashMap;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::embedding::cosine_similarity;
use crate::models::{PointRecord, SearchHit};
use crate::store::{SearchFilter, VectorStore};

#[derive(Debug, Default)]
struct Collection {
    dimension: usize,
    /// Insertion order preserved so scroll enumerates predictably.
    points: Vec<PointRecord>,
}

/// An in-memory [`VectorStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn ensure_collection(&self, name: &str, dimension: usize) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections
            .entry(name.to_string())
            .or_insert_with(|| Collection {
                dimension,
                points: Vec::new(),
            });
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections.remove(name);
        Ok(())
    }

    async fn upsert(&self, collection: &str, points: &[PointRecord]) -> Result<()> {
        let mut collections = self.collections.write().await;
        let col = match collections.get_mut(collection) {
            Some(col) => col,
            None => bail!("collection '{}' does not exist", collection),
        };
        for point in points {
            match col.points.iter_mut().find(|p| p.id == point.id) {
                Some(existing) => *existing = point.clone(),
                None => col.points.push(point.clone()),
            }
        }
        Ok(())
    }

    async fn retrieve(&self, collection: &str, id: &str) -> Result<Option<PointRecord>> {
        let collections = self.collections.read().await;
        let col = match collections.get(collection) {
            Some(col) => col,
            None => bail!("collection '{}' does not exist", collection),
        };
        Ok(col.points.iter().find(|p| p.id == id).cloned())
    }

    async fn delete_points(&self, collection: &str, ids: &[String]) -> Result<()> {
        let mut collections = self.collections.write().await;
        let col = match collections.get_mut(collection) {
            Some(col) => col,
            None => bail!("collection '{}' does not exist", collection),
        };
        col.points.retain(|p| !ids.contains(&p.id));
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        filter: &SearchFilter,
        limit: usize,
        score_threshold: f32,
    ) -> Result<Vec<SearchHit>> {
        let collections = self.collections.read().await;
        let col = match collections.get(collection) {
            Some(col) => col,
            None => bail!("collection '{}' does not exist", collection),
        };

        let query = crate::embedding::fit_dimension(vector.to_vec(), col.dimension);

        let mut hits: Vec<SearchHit> = col
            .points
            .iter()
            .filter(|p| filter.matches(&p.payload))
            .map(|p| SearchHit {
                id: p.id.clone(),
                score: cosine_similarity(&p.vector, &query),
                payload: p.payload.clone(),
            })
            .filter(|h| h.score >= score_threshold)
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn scroll(
        &self,
        collection: &str,
        filter: &SearchFilter,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let collections = self.collections.read().await;
        let col = match collections.get(collection) {
            Some(col) => col,
            None => bail!("collection '{}' does not exist", collection),
        };

        Ok(col
            .points
            .iter()
            .filter(|p| filter.matches(&p.payload))
            .take(limit)
            .map(|p| SearchHit {
                id: p.id.clone(),
                score: 0.0,
                payload: p.payload.clone(),
            })
            .collect())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let collections = self.collections.read().await;
        let col = match collections.get(collection) {
            Some(col) => col,
            None => bail!("collection '{}' does not exist", collection),
        };
        Ok(col.points.len())
    }
}
