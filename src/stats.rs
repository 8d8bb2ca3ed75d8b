//! Store-wide statistics.

use anyhow::Result;

use crate::engine::RetrievalEngine;

#[derive(Debug, Clone, PartialEq)]
pub struct StoreStats {
    pub collection: String,
    /// Total points across all tenants.
    pub points: usize,
}

pub async fn collect(engine: &RetrievalEngine) -> Result<StoreStats> {
    let points = engine.store().count(engine.collection()).await?;
    Ok(StoreStats {
        collection: engine.collection().to_string(),
        points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection;
    use crate::embedding::DisabledGateway;
    use crate::models::{PointPayload, PointRecord};
    use crate::store::VectorStore;
    use crate::store_memory::MemoryStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_collect_counts_all_tenants() {
        let store: Arc<dyn VectorStore> = Arc::new(MemoryStore::new());
        collection::ensure(&store, "docs", 2).await.unwrap();
        let engine = RetrievalEngine::new(
            store,
            Arc::new(DisabledGateway::new(2)),
            "docs".to_string(),
            2,
            0.3,
        );

        let mut alice = PointPayload::empty();
        alice.tenant_id = "alice".to_string();
        let mut bob = PointPayload::empty();
        bob.tenant_id = "bob".to_string();

        engine
            .upsert(&[
                PointRecord {
                    id: "a".to_string(),
                    vector: vec![1.0, 0.0],
                    payload: alice,
                },
                PointRecord {
                    id: "b".to_string(),
                    vector: vec![0.0, 1.0],
                    payload: bob,
                },
            ])
            .await
            .unwrap();

        let stats = collect(&engine).await.unwrap();
        assert_eq!(stats.collection, "docs");
        assert_eq!(stats.points, 2);
    }
}
