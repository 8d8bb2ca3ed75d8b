//! Document ingestion.
//!
//! Two entry points share one pipeline:
//!
//! - [`ingest_folder`]: bulk-load every supported file in a directory,
//!   chunked into overlapping word windows, one point per chunk.
//! - [`add_file`]: store a single file as one whole-document point with
//!   caller-supplied metadata.
//!
//! Ingestion never aborts on a bad file or a failed embedding: unreadable
//! and unsupported files are counted as skipped, and embedding failures
//! produce a zero-vector point flagged as degraded.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use crate::chunk::chunk_words;
use crate::config::ChunkingConfig;
use crate::embedding::{elide_middle, fit_dimension, zero_vector, EmbeddingGateway, MAX_EMBED_CHARS};
use crate::engine::RetrievalEngine;
use crate::extract::extract_text;
use crate::models::{FileKind, IngestReport, PointPayload, PointRecord};

/// Stored content previews are capped at this many characters.
pub const CONTENT_PREVIEW_CHARS: usize = 5000;

const PREVIEW_SUFFIX: &str = "... [truncated]";

/// Embed text, pre-truncated to the gateway's input limit. A gateway
/// failure yields a zero vector and the degraded flag instead of an error.
async fn embed_or_degraded(
    gateway: &dyn EmbeddingGateway,
    text: &str,
    dimension: usize,
) -> (Vec<f32>, bool) {
    let elided = elide_middle(text, MAX_EMBED_CHARS);
    match gateway.embed(&elided).await {
        Ok(vector) => (fit_dimension(vector, dimension), false),
        Err(e) => {
            warn!(error = %e, "embedding failed, storing zero vector");
            (zero_vector(dimension), true)
        }
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn file_ext(filename: &str) -> String {
    filename
        .rsplit_once('.')
        .map(|(_, e)| e.to_ascii_lowercase())
        .unwrap_or_default()
}

/// First [`CONTENT_PREVIEW_CHARS`] characters, with a marker when cut.
fn content_preview(text: &str) -> String {
    if text.chars().count() <= CONTENT_PREVIEW_CHARS {
        return text.to_string();
    }
    let head: String = text.chars().take(CONTENT_PREVIEW_CHARS).collect();
    format!("{}{}", head, PREVIEW_SUFFIX)
}

fn base_payload(tenant: &str, filename: &str, bytes: &[u8], text: &str) -> PointPayload {
    let mut payload = PointPayload::empty();
    payload.tenant_id = tenant.to_string();
    payload.filename = filename.to_string();
    payload.file_hash = sha256_hex(bytes);
    payload.file_size = bytes.len() as u64;
    payload.file_type = file_ext(filename);
    payload.uploaded_at = chrono::Utc::now().to_rfc3339();
    payload.text_length = text.chars().count() as u64;
    payload
}

/// Ingest every supported file directly under `folder` for one tenant.
///
/// Files are processed in filename order. Subdirectories, unsupported
/// kinds, and unreadable files are skipped and counted. A missing folder
/// is an empty run, not an error.
pub async fn ingest_folder(
    engine: &RetrievalEngine,
    folder: &Path,
    tenant: &str,
    chunking: &ChunkingConfig,
) -> Result<IngestReport> {
    let mut report = IngestReport::default();

    let entries = match std::fs::read_dir(folder) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(folder = %folder.display(), error = %e, "cannot read folder, nothing ingested");
            return Ok(report);
        }
    };

    let mut paths: Vec<_> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();
    paths.sort();

    for path in paths {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        if path.is_dir() {
            report.skipped += 1;
            continue;
        }

        let kind = FileKind::from_filename(&filename);
        if !kind.is_supported() {
            warn!(file = %filename, "unsupported file type, skipping");
            report.skipped += 1;
            continue;
        }

        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(file = %filename, error = %e, "unreadable file, skipping");
                report.skipped += 1;
                continue;
            }
        };

        let text = extract_text(&bytes, kind, &filename);
        let chunks = chunk_words(&filename, &text, chunking.chunk_size, chunking.chunk_overlap)?;

        let mut points = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            let (vector, degraded) =
                embed_or_degraded(engine.gateway(), &chunk.text, engine.dimension()).await;

            let mut payload = base_payload(tenant, &chunk.filename, &bytes, &text);
            payload.content = chunk.text.clone();
            payload.chunk_index = Some(chunk.index as i64);
            payload.degraded = degraded;
            if degraded {
                report.degraded += 1;
            }

            points.push(PointRecord {
                id: Uuid::new_v4().to_string(),
                vector,
                payload,
            });
        }

        engine.upsert(&points).await?;
        report.files += 1;
        report.points += points.len();
        info!(file = %filename, chunks = points.len(), "ingested file");
    }

    Ok(report)
}

/// Store a single file as one whole-document point and return its id.
///
/// The stored content is a bounded preview of the extracted text; the
/// embedding covers the (middle-elided) full text. Caller metadata lands in
/// the open payload map.
pub async fn add_file(
    engine: &RetrievalEngine,
    tenant: &str,
    bytes: &[u8],
    filename: &str,
    extra: BTreeMap<String, serde_json::Value>,
) -> Result<String> {
    let kind = FileKind::from_filename(filename);
    let text = extract_text(bytes, kind, filename);

    let (vector, degraded) = embed_or_degraded(engine.gateway(), &text, engine.dimension()).await;

    let mut payload = base_payload(tenant, filename, bytes, &text);
    payload.content = content_preview(&text);
    payload.degraded = degraded;
    // Metadata may not shadow schema fields (ownership included).
    payload.extra = extra
        .into_iter()
        .filter(|(key, _)| {
            if PointPayload::is_reserved_field(key) {
                warn!(field = %key, "dropping reserved metadata key");
                false
            } else {
                true
            }
        })
        .collect();

    let id = Uuid::new_v4().to_string();
    engine
        .upsert(&[PointRecord {
            id: id.clone(),
            vector,
            payload,
        }])
        .await?;

    info!(file = %filename, point = %id, degraded, "added file");
    Ok(id)
}
