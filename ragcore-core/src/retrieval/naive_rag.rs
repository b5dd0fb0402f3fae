//! Plain kNN over chunk embeddings (spec §4.J's "NaiveRAG").

use crate::error::CoreError;
use crate::model::RetrievalRecord;
use crate::vector::VectorStore;

use super::{record_from_chunk, CONFIDENCE_CUTOFF};

/// `num_candidates = max(64, 1.5·k)`, filtered by `score ≥ confidence_cutoff`.
pub fn naive_rag(vectors: &dyn VectorStore, query_vector: &[f32], top_k: usize, confidence_cutoff: f32) -> Result<Vec<RetrievalRecord>, CoreError> {
    let num_candidates = ((top_k as f64 * 1.5).ceil() as usize).max(64);
    let hits = vectors.knn(query_vector, num_candidates)?;
    Ok(hits
        .iter()
        .filter(|hit| hit.score >= confidence_cutoff)
        .take(top_k)
        .map(record_from_chunk)
        .collect())
}

/// `naive_rag` with the spec's default cutoff (`0.04`).
pub fn naive_rag_default(vectors: &dyn VectorStore, query_vector: &[f32], top_k: usize) -> Result<Vec<RetrievalRecord>, CoreError> {
    naive_rag(vectors, query_vector, top_k, CONFIDENCE_CUTOFF)
}
