//! The four retrieval strategies, each a thin composition over
//! `GraphStore`, `VectorStore`, and `LlmClient`, grounded on spec §4.J
//! and the teacher's `graphs/analytics.rs` (a flat `Self::compute_*`
//! helper style reused here as `Self::`-free free functions per
//! strategy module).

pub mod garag;
pub mod graphrag;
pub mod naive_graphrag;
pub mod naive_rag;

pub use garag::{garag, garag_default};
pub use graphrag::{graphrag, graphrag_default};
pub use naive_graphrag::{naive_graphrag, naive_graphrag_default};
pub use naive_rag::{naive_rag, naive_rag_default};

use std::collections::HashMap;

use crate::model::RetrievalRecord;
use crate::vector::ScoredEmbedding;

/// Default minimum similarity score for `NaiveRAG`/`NaiveGraphRAG`/`GARAG`.
pub const CONFIDENCE_CUTOFF: f32 = 0.04;
/// Default minimum confidence (0..100) for `GraphRAG`'s LLM-judged hits.
pub const GRAPHRAG_CONFIDENCE_CUTOFF: f32 = 40.0;

fn payload_get<'a>(payload: &'a HashMap<String, String>, key: &str) -> &'a str {
    payload.get(key).map(String::as_str).unwrap_or("")
}

/// Builds the uniform record shape every strategy returns from a chunk
/// embedding hit.
pub fn record_from_chunk(hit: &ScoredEmbedding) -> RetrievalRecord {
    let payload = &hit.embedding.payload;
    RetrievalRecord {
        name: payload_get(payload, "file_key").to_string(),
        category: "chunk".to_string(),
        path: payload_get(payload, "file_key").to_string(),
        record_type: "chunk".to_string(),
        matched_content: payload_get(payload, "text").to_string(),
        surrounding_content: payload_get(payload, "heading_path").to_string(),
        links: Vec::new(),
    }
}

/// Builds the uniform record shape from a community-summary embedding
/// hit.
pub fn record_from_community(hit: &ScoredEmbedding) -> RetrievalRecord {
    let payload = &hit.embedding.payload;
    RetrievalRecord {
        name: payload_get(payload, "community_key").to_string(),
        category: "community".to_string(),
        path: payload_get(payload, "community_key").to_string(),
        record_type: "community_summary".to_string(),
        matched_content: payload_get(payload, "content").to_string(),
        surrounding_content: String::new(),
        links: Vec::new(),
    }
}
