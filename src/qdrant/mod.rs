//! Qdrant integration: HTTP client, payload helpers, and shared types.

mod client;
mod payload;
mod types;

pub use client::QdrantService;
pub use payload::{build_payload, compute_content_hash, point_id_for_entry};
pub use types::{PointUpsert, QdrantError, ScoredPoint};
