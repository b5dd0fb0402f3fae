//! Plain kNN over the community-summary vector index (spec §4.J's
//! "NaiveGraphRAG" — identical algorithm to `naive_rag`, different index).

use crate::error::CoreError;
use crate::model::RetrievalRecord;
use crate::vector::VectorStore;

use super::{record_from_community, CONFIDENCE_CUTOFF};

pub fn naive_graphrag(vectors: &dyn VectorStore, query_vector: &[f32], top_k: usize, confidence_cutoff: f32) -> Result<Vec<RetrievalRecord>, CoreError> {
    let num_candidates = ((top_k as f64 * 1.5).ceil() as usize).max(64);
    let hits = vectors.knn(query_vector, num_candidates)?;
    Ok(hits
        .iter()
        .filter(|hit| hit.score >= confidence_cutoff)
        .take(top_k)
        .map(record_from_community)
        .collect())
}

pub fn naive_graphrag_default(vectors: &dyn VectorStore, query_vector: &[f32], top_k: usize) -> Result<Vec<RetrievalRecord>, CoreError> {
    naive_graphrag(vectors, query_vector, top_k, CONFIDENCE_CUTOFF)
}
