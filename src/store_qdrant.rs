//! Qdrant vector store backend (feature `qdrant`).
//!
//! Implements [`VectorStore`] over the qdrant-client gRPC API: cosine
//! distance collections, a keyword payload index on the tenant field,
//! server-side `must` equality filters, score thresholds, and scroll-based
//! enumeration.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::vectors_output::VectorsOptions;
use qdrant_client::qdrant::{
    Condition, CountPointsBuilder, CreateCollectionBuilder,
    CreateFieldIndexCollectionBuilder, DeletePointsBuilder, Distance, FieldType, Filter,
    GetPointsBuilder, PointStruct, PointsIdsList, RetrievedPoint, ScoredPoint,
    ScrollPointsBuilder, SearchPointsBuilder, Value as QdrantValue, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use tracing::debug;

use crate::models::{PointPayload, PointRecord, SearchHit, TENANT_FIELD};
use crate::store::{SearchFilter, VectorStore};

/// A [`VectorStore`] backed by [Qdrant](https://qdrant.tech/).
pub struct QdrantStore {
    client: Qdrant,
}

impl QdrantStore {
    /// Connect to a Qdrant instance at the given gRPC URL.
    pub fn new(url: &str) -> Result<Self> {
        let client = Qdrant::from_url(url).build().map_err(map_err)?;
        Ok(Self { client })
    }
}

fn map_err(e: qdrant_client::QdrantError) -> anyhow::Error {
    anyhow!("qdrant: {}", e)
}

/// Build a Qdrant `must` filter from the exact-match condition set.
///
/// Qdrant match conditions cover keyword, integer, and boolean values only.
/// Anything else (doubles included) falls back to keyword matching on its
/// JSON text, which will not match a numeric payload field.
fn to_qdrant_filter(filter: &SearchFilter) -> Filter {
    let conditions: Vec<Condition> = filter
        .conditions
        .iter()
        .map(|(field, value)| match value {
            serde_json::Value::Bool(b) => Condition::matches(field.as_str(), *b),
            serde_json::Value::Number(n) if n.is_i64() => {
                Condition::matches(field.as_str(), n.as_i64().unwrap_or_default())
            }
            serde_json::Value::String(s) => Condition::matches(field.as_str(), s.clone()),
            other => Condition::matches(field.as_str(), other.to_string()),
        })
        .collect();
    Filter::must(conditions)
}

fn point_id_string(id: Option<&qdrant_client::qdrant::PointId>) -> String {
    id.and_then(|pid| match &pid.point_id_options {
        Some(PointIdOptions::Uuid(s)) => Some(s.clone()),
        Some(PointIdOptions::Num(n)) => Some(n.to_string()),
        None => None,
    })
    .unwrap_or_default()
}

/// Convert a Qdrant payload value into JSON for [`PointPayload::from_value`].
fn qdrant_value_to_json(value: &QdrantValue) -> serde_json::Value {
    match &value.kind {
        Some(Kind::StringValue(s)) => serde_json::Value::String(s.clone()),
        Some(Kind::IntegerValue(i)) => serde_json::json!(i),
        Some(Kind::DoubleValue(d)) => serde_json::json!(d),
        Some(Kind::BoolValue(b)) => serde_json::Value::Bool(*b),
        Some(Kind::StructValue(s)) => serde_json::Value::Object(
            s.fields
                .iter()
                .map(|(k, v)| (k.clone(), qdrant_value_to_json(v)))
                .collect(),
        ),
        Some(Kind::ListValue(l)) => {
            serde_json::Value::Array(l.values.iter().map(qdrant_value_to_json).collect())
        }
        Some(Kind::NullValue(_)) | None => serde_json::Value::Null,
    }
}

fn payload_from_map(
    map: &std::collections::HashMap<String, QdrantValue>,
) -> PointPayload {
    let object: serde_json::Map<String, serde_json::Value> = map
        .iter()
        .map(|(k, v)| (k.clone(), qdrant_value_to_json(v)))
        .collect();
    PointPayload::from_value(serde_json::Value::Object(object))
}

fn scored_point_to_hit(point: ScoredPoint) -> SearchHit {
    SearchHit {
        id: point_id_string(point.id.as_ref()),
        score: point.score,
        payload: payload_from_map(&point.payload),
    }
}

fn retrieved_point_to_record(point: RetrievedPoint) -> PointRecord {
    let vector = point
        .vectors
        .and_then(|v| v.vectors_options)
        .and_then(|opts| match opts {
            VectorsOptions::Vector(v) => Some(v.data),
            VectorsOptions::Vectors(_) => None,
        })
        .unwrap_or_default();

    PointRecord {
        id: point_id_string(point.id.as_ref()),
        vector,
        payload: payload_from_map(&point.payload),
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn ensure_collection(&self, name: &str, dimension: usize) -> Result<()> {
        let collections = self.client.list_collections().await.map_err(map_err)?;
        if collections.collections.iter().any(|c| c.name == name) {
            debug!(collection = name, "collection already exists, skipping creation");
            return Ok(());
        }

        self.client
            .create_collection(
                CreateCollectionBuilder::new(name)
                    .vectors_config(VectorParamsBuilder::new(dimension as u64, Distance::Cosine)),
            )
            .await
            .map_err(map_err)?;

        // Keyword index so tenant equality filters stay efficient.
        self.client
            .create_field_index(CreateFieldIndexCollectionBuilder::new(
                name,
                TENANT_FIELD,
                FieldType::Keyword,
            ))
            .await
            .map_err(map_err)?;

        debug!(collection = name, dimension, "created collection");
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.client.delete_collection(name).await.map_err(map_err)?;
        debug!(collection = name, "deleted collection");
        Ok(())
    }

    async fn upsert(&self, collection: &str, points: &[PointRecord]) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }

        let qdrant_points: Vec<PointStruct> = points
            .iter()
            .map(|point| {
                let payload =
                    Payload::try_from(point.payload.to_value()).unwrap_or_default();
                PointStruct::new(point.id.clone(), point.vector.clone(), payload)
            })
            .collect();

        self.client
            .upsert_points(
                qdrant_client::qdrant::UpsertPointsBuilder::new(collection, qdrant_points)
                    .wait(true),
            )
            .await
            .map_err(map_err)?;

        debug!(collection, count = points.len(), "upserted points");
        Ok(())
    }

    async fn retrieve(&self, collection: &str, id: &str) -> Result<Option<PointRecord>> {
        let response = self
            .client
            .get_points(
                GetPointsBuilder::new(collection, vec![id.to_string().into()])
                    .with_payload(true)
                    .with_vectors(true),
            )
            .await
            .map_err(map_err)?;

        Ok(response.result.into_iter().next().map(retrieved_point_to_record))
    }

    async fn delete_points(&self, collection: &str, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let point_ids: Vec<qdrant_client::qdrant::PointId> =
            ids.iter().map(|id| id.clone().into()).collect();

        self.client
            .delete_points(
                DeletePointsBuilder::new(collection)
                    .points(PointsIdsList { ids: point_ids })
                    .wait(true),
            )
            .await
            .map_err(map_err)?;

        debug!(collection, count = ids.len(), "deleted points");
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
        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(collection, vector.to_vec(), limit as u64)
                    .filter(to_qdrant_filter(filter))
                    .score_threshold(score_threshold)
                    .with_payload(true),
            )
            .await
            .map_err(map_err)?;

        Ok(response.result.into_iter().map(scored_point_to_hit).collect())
    }

    async fn scroll(
        &self,
        collection: &str,
        filter: &SearchFilter,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let response = self
            .client
            .scroll(
                ScrollPointsBuilder::new(collection)
                    .filter(to_qdrant_filter(filter))
                    .limit(limit as u32)
                    .with_payload(true)
                    .with_vectors(false),
            )
            .await
            .map_err(map_err)?;

        Ok(response
            .result
            .into_iter()
            .map(|point| SearchHit {
                id: point_id_string(point.id.as_ref()),
                score: 0.0,
                payload: payload_from_map(&point.payload),
            })
            .collect())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let response = self
            .client
            .count(CountPointsBuilder::new(collection).exact(true))
            .await
            .map_err(map_err)?;

        Ok(response.result.map(|r| r.count as usize).unwrap_or(0))
    }
}
