//! Collection lifecycle: idempotent creation and destructive recreation.

use anyhow::Result;
use std::sync::Arc;
use tracing::warn;

use crate::store::VectorStore;

/// Make sure the collection exists with the configured vector width.
/// Safe to call repeatedly; an existing collection is left untouched.
pub async fn ensure(store: &Arc<dyn VectorStore>, name: &str, dimension: usize) -> Result<()> {
    store.ensure_collection(name, dimension).await
}

/// Drop the collection and create it again, empty. A missing collection is
/// not an error: the delete failure is logged and creation proceeds.
pub async fn recreate(store: &Arc<dyn VectorStore>, name: &str, dimension: usize) -> Result<()> {
    if let Err(e) = store.delete_collection(name).await {
        warn!(collection = name, error = %e, "delete before recreate failed, continuing");
    }
    store.ensure_collection(name, dimension).await
}
