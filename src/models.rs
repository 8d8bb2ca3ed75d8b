//! Core data models used throughout docvault.
//!
//! These types represent the documents, chunks, stored points, and search
//! results that flow through the ingestion and retrieval pipeline.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Payload field used for tenant isolation. Every tenant-scoped search or
/// mutation filters on this field.
pub const TENANT_FIELD: &str = "tenant_id";

/// Document kind resolved once from the filename extension.
///
/// Extraction dispatches on this closed set instead of branching on raw
/// extension strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Plain-text-like files (txt, md, csv, xml, html).
    PlainText,
    /// PDF documents.
    Pdf,
    /// Word-processor documents (docx, doc).
    WordDoc,
    /// Spreadsheets (xlsx, xls).
    Spreadsheet,
    /// Structured data re-serialized to canonical text (json).
    StructuredData,
    /// Anything else; extraction yields a placeholder.
    Unknown,
}

impl FileKind {
    /// Resolve the kind from a filename's extension (case-insensitive).
    pub fn from_filename(filename: &str) -> Self {
        let ext = filename
            .rsplit_once('.')
            .map(|(_, e)| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "txt" | "md" | "csv" | "xml" | "html" | "htm" => FileKind::PlainText,
            "pdf" => FileKind::Pdf,
            "docx" | "doc" => FileKind::WordDoc,
            "xlsx" | "xls" => FileKind::Spreadsheet,
            "json" => FileKind::StructuredData,
            _ => FileKind::Unknown,
        }
    }

    /// Whether folder ingestion should process files of this kind.
    pub fn is_supported(&self) -> bool {
        !matches!(self, FileKind::Unknown)
    }
}

/// An overlapping word-window slice of a document's extracted text.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub filename: String,
    pub index: usize,
    pub text: String,
}

/// Metadata attached to a stored point.
///
/// Required fields are typed; caller-supplied metadata lands in `extra`.
/// Serializes flat, so stores see one open field map with the schema fields
/// at the top level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointPayload {
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub filename: String,
    /// Chunk text (folder ingestion) or a bounded content preview (file add).
    #[serde(default)]
    pub content: String,
    /// Sequence index of the chunk within its source file; `None` for
    /// whole-file points.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<i64>,
    #[serde(default)]
    pub file_hash: String,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default)]
    pub file_type: String,
    /// ISO-8601 upload timestamp.
    #[serde(default)]
    pub uploaded_at: String,
    /// Character count of the full extracted text.
    #[serde(default)]
    pub text_length: u64,
    /// Set when the embedding gateway failed and a zero vector was stored.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub degraded: bool,
    /// Caller-supplied metadata, merged flat into the stored payload.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl PointPayload {
    /// Whether a payload key belongs to the typed schema. Caller-supplied
    /// metadata may not use these names: the flattened extension map would
    /// otherwise shadow the typed field in the serialized form.
    pub fn is_reserved_field(name: &str) -> bool {
        matches!(
            name,
            "tenant_id"
                | "filename"
                | "content"
                | "chunk_index"
                | "file_hash"
                | "file_size"
                | "file_type"
                | "uploaded_at"
                | "text_length"
                | "degraded"
        )
    }

    /// Serialize to the flat JSON object shape stored in the backend.
    /// Reserved keys smuggled into the extension map are dropped so they can
    /// never shadow the typed fields.
    #[allow(dead_code)]
    pub fn to_value(&self) -> serde_json::Value {
        let mut clean = self.clone();
        clean.extra.retain(|k, _| !Self::is_reserved_field(k));
        serde_json::to_value(&clean).unwrap_or_else(|_| serde_json::json!({}))
    }

    /// Rebuild from a stored payload object. Unknown fields collect in
    /// `extra`; missing schema fields fall back to empty defaults so a
    /// foreign payload never aborts a read path.
    #[allow(dead_code)]
    pub fn from_value(value: serde_json::Value) -> Self {
        serde_json::from_value(value).unwrap_or_else(|_| PointPayload::empty())
    }

    pub fn empty() -> Self {
        PointPayload {
            tenant_id: String::new(),
            filename: String::new(),
            content: String::new(),
            chunk_index: None,
            file_hash: String::new(),
            file_size: 0,
            file_type: String::new(),
            uploaded_at: String::new(),
            text_length: 0,
            degraded: false,
            extra: BTreeMap::new(),
        }
    }

    /// Look up a payload field by name, schema fields first, then `extra`.
    /// Used for exact-match filter evaluation.
    pub fn field(&self, name: &str) -> Option<serde_json::Value> {
        match name {
            "tenant_id" => Some(serde_json::Value::String(self.tenant_id.clone())),
            "filename" => Some(serde_json::Value::String(self.filename.clone())),
            "content" => Some(serde_json::Value::String(self.content.clone())),
            "chunk_index" => self.chunk_index.map(|i| serde_json::json!(i)),
            "file_hash" => Some(serde_json::Value::String(self.file_hash.clone())),
            "file_size" => Some(serde_json::json!(self.file_size)),
            "file_type" => Some(serde_json::Value::String(self.file_type.clone())),
            "uploaded_at" => Some(serde_json::Value::String(self.uploaded_at.clone())),
            "text_length" => Some(serde_json::json!(self.text_length)),
            "degraded" => Some(serde_json::Value::Bool(self.degraded)),
            other => self.extra.get(other).cloned(),
        }
    }
}

/// The persisted unit: id, embedding vector, and payload.
#[derive(Debug, Clone, PartialEq)]
pub struct PointRecord {
    /// Opaque unique token generated at insert time (UUID v4).
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: PointPayload,
}

/// A retrieved point paired with a similarity score.
///
/// Enumeration results (scroll) carry a score of `0.0`.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: String,
    pub score: f32,
    pub payload: PointPayload,
}

/// Counters reported after a folder ingestion run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    /// Files read and processed.
    pub files: usize,
    /// Points written to the store.
    pub points: usize,
    /// Points stored with a zero vector after an embedding failure.
    pub degraded: usize,
    /// Directory entries skipped (subdirectories, unsupported kinds,
    /// unreadable files).
    pub skipped: usize,
}

/// Outcome of an ownership-checked mutation.
///
/// `NotFoundOrDenied` deliberately does not distinguish a missing point from
/// one owned by another tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    Applied,
    NotFoundOrDenied,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_kind_from_filename() {
        assert_eq!(FileKind::from_filename("notes.txt"), FileKind::PlainText);
        assert_eq!(FileKind::from_filename("README.MD"), FileKind::PlainText);
        assert_eq!(FileKind::from_filename("report.pdf"), FileKind::Pdf);
        assert_eq!(FileKind::from_filename("letter.docx"), FileKind::WordDoc);
        assert_eq!(FileKind::from_filename("sheet.xlsx"), FileKind::Spreadsheet);
        assert_eq!(FileKind::from_filename("data.json"), FileKind::StructuredData);
        assert_eq!(FileKind::from_filename("archive.tar.gz"), FileKind::Unknown);
        assert_eq!(FileKind::from_filename("no_extension"), FileKind::Unknown);
    }

    #[test]
    fn test_payload_roundtrip_with_extra() {
        let mut extra = BTreeMap::new();
        extra.insert("course".to_string(), serde_json::json!("physics"));

        let payload = PointPayload {
            tenant_id: "user-1".to_string(),
            filename: "notes.txt".to_string(),
            content: "hello".to_string(),
            chunk_index: Some(2),
            file_hash: "abc".to_string(),
            file_size: 5,
            file_type: "txt".to_string(),
            uploaded_at: "2024-01-01T00:00:00Z".to_string(),
            text_length: 5,
            degraded: false,
            extra,
        };

        let value = payload.to_value();
        // Extension map serializes flat
        assert_eq!(value["course"], serde_json::json!("physics"));
        assert_eq!(value["tenant_id"], serde_json::json!("user-1"));

        let restored = PointPayload::from_value(value);
        assert_eq!(restored, payload);
    }

    #[test]
    fn test_payload_field_lookup() {
        let mut payload = PointPayload::empty();
        payload.tenant_id = "t".to_string();
        payload
            .extra
            .insert("grade".to_string(), serde_json::json!(7));

        assert_eq!(payload.field("tenant_id"), Some(serde_json::json!("t")));
        assert_eq!(payload.field("grade"), Some(serde_json::json!(7)));
        assert_eq!(payload.field("chunk_index"), None);
        assert_eq!(payload.field("missing"), None);
    }

    #[test]
    fn test_extension_map_cannot_shadow_schema_fields() {
        let mut payload = PointPayload::empty();
        payload.tenant_id = "alice".to_string();
        payload.filename = "notes.txt".to_string();
        payload
            .extra
            .insert("tenant_id".to_string(), serde_json::json!("bob"));
        payload
            .extra
            .insert("degraded".to_string(), serde_json::json!(true));
        payload
            .extra
            .insert("course".to_string(), serde_json::json!("math"));

        let value = payload.to_value();
        assert_eq!(value["tenant_id"], serde_json::json!("alice"));
        assert_eq!(value["filename"], serde_json::json!("notes.txt"));
        assert_eq!(value.get("degraded"), None);
        assert_eq!(value["course"], serde_json::json!("math"));
    }

    #[test]
    fn test_reserved_field_names() {
        assert!(PointPayload::is_reserved_field("tenant_id"));
        assert!(PointPayload::is_reserved_field("chunk_index"));
        assert!(!PointPayload::is_reserved_field("course"));
    }

    #[test]
    fn test_payload_from_foreign_value_never_panics() {
        let restored = PointPayload::from_value(serde_json::json!({"weird": [1, 2]}));
        assert_eq!(restored.tenant_id, "");
        assert_eq!(restored.extra.get("weird"), Some(&serde_json::json!([1, 2])));
    }
}
