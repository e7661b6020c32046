//! Helpers for constructing and hashing Qdrant payloads.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use uuid::Uuid;

/// Derive a deterministic Qdrant point id from an entry identifier.
///
/// Qdrant only accepts integers or UUIDs as point ids, so the human-readable
/// `{source_file}::{record_id}` entry id is hashed into a stable UUID. The
/// same entry always maps to the same point, making re-indexing an in-place
/// overwrite.
pub fn point_id_for_entry(entry_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(entry_id.as_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes).to_string()
}

/// Compute a deterministic SHA-256 hash of record text.
pub fn compute_content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Build the payload object stored alongside each indexed record.
pub fn build_payload(
    entry_id: &str,
    text: &str,
    source_file: &str,
    record_id: usize,
    timestamp_rfc3339: &str,
) -> Value {
    let mut payload = Map::new();
    payload.insert("entry_id".into(), Value::String(entry_id.to_string()));
    payload.insert("text".into(), Value::String(text.to_string()));
    payload.insert(
        "source_file".into(),
        Value::String(source_file.to_string()),
    );
    payload.insert("record_id".into(), Value::from(record_id as u64));
    payload.insert(
        "content_hash".into(),
        Value::String(compute_content_hash(text)),
    );
    payload.insert(
        "indexed_at".into(),
        Value::String(timestamp_rfc3339.to_string()),
    );
    Value::Object(payload)
}

/// Current timestamp formatted for payload storage.
pub(crate) fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}
