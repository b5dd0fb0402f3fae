//! GARAG: kNN over community summaries, reweighted onto the files
//! those summaries' member entities were sourced from (spec §4.J).

use std::collections::HashMap;

use crate::error::CoreError;
use crate::graph::GraphStore;
use crate::model::RetrievalRecord;
use crate::vector::VectorStore;

use super::CONFIDENCE_CUTOFF;

/// For each community-summary hit above `confidence_cutoff`, walks its
/// `source_ref` map (excluding `_total`) and accumulates
/// `score · count / total` into a per-file score; returns the
/// highest-scored files, up to `max_matches`, with the best-matching
/// chunk from `chunk_vectors` (if any) as the matched content.
pub fn garag(
    community_vectors: &dyn VectorStore,
    chunk_vectors: &dyn VectorStore,
    store: &dyn GraphStore,
    query_vector: &[f32],
    top_k: usize,
    max_matches: usize,
    confidence_cutoff: f32,
) -> Result<Vec<RetrievalRecord>, CoreError> {
    let hits = community_vectors.knn(query_vector, 2 * top_k)?;

    let mut file_scores: HashMap<String, f64> = HashMap::new();
    for hit in hits.iter().filter(|hit| hit.score >= confidence_cutoff) {
        let Some(source_ref_json) = hit.embedding.payload.get("source_ref") else {
            continue;
        };
        let Ok(source_ref) = serde_json::from_str::<HashMap<String, u64>>(source_ref_json) else {
            continue;
        };
        let total = source_ref.get("_total").copied().unwrap_or(0).max(1) as f64;
        for (source, &count) in &source_ref {
            if source == "_total" {
                continue;
            }
            *file_scores.entry(source.clone()).or_insert(0.0) += hit.score as f64 * (count as f64 / total);
        }
    }

    let mut ranked: Vec<(String, f64)> = file_scores.into_iter().collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    ranked.truncate(max_matches);

    let chunk_hits = chunk_vectors.knn(query_vector, (top_k * 4).max(64))?;

    let mut records = Vec::with_capacity(ranked.len());
    for (file_key, score) in ranked {
        let file = store.get_file(&file_key)?;
        let label = file.as_ref().map(|f| f.label.clone()).unwrap_or_else(|| file_key.clone());

        let matched_content = chunk_hits
            .iter()
            .filter(|hit| hit.embedding.payload.get("file_key").map(String::as_str) == Some(file_key.as_str()))
            .max_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal))
            .map(|hit| hit.embedding.payload.get("text").cloned().unwrap_or_default())
            .unwrap_or_default();

        records.push(RetrievalRecord {
            name: label,
            category: "file".to_string(),
            path: file_key,
            record_type: "garag".to_string(),
            matched_content,
            surrounding_content: format!("score={score:.4}"),
            links: Vec::new(),
        });
    }

    Ok(records)
}

pub fn garag_default(
    community_vectors: &dyn VectorStore,
    chunk_vectors: &dyn VectorStore,
    store: &dyn GraphStore,
    query_vector: &[f32],
    top_k: usize,
    max_matches: usize,
) -> Result<Vec<RetrievalRecord>, CoreError> {
    garag(community_vectors, chunk_vectors, store, query_vector, top_k, max_matches, CONFIDENCE_CUTOFF)
}
