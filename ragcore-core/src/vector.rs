//! A small vector-store abstraction for embedding-backed retrieval.
//!
//! Grounded on the same "trait + one in-memory reference impl" shape
//! as `graph::store`; production ANN backends are out of scope.

use std::collections::HashMap;
use std::sync::Mutex;

use uuid::Uuid;

use crate::error::CoreError;

#[derive(Debug, Clone)]
pub struct Embedding {
    pub id: Uuid,
    pub vector: Vec<f32>,
    /// Free-form payload carried alongside the vector: chunk text,
    /// file key, node label, whatever the caller indexed.
    pub payload: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct ScoredEmbedding {
    pub embedding: Embedding,
    pub score: f32,
}

pub trait VectorStore: Send + Sync {
    fn upsert(&self, embedding: Embedding) -> Result<(), CoreError>;

    /// Returns the `k` nearest embeddings to `query` by cosine
    /// similarity, highest score first.
    fn knn(&self, query: &[f32], k: usize) -> Result<Vec<ScoredEmbedding>, CoreError>;
}

#[derive(Default)]
pub struct InMemoryVectorStore {
    inner: Mutex<Vec<Embedding>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

impl VectorStore for InMemoryVectorStore {
    fn upsert(&self, embedding: Embedding) -> Result<(), CoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(existing) = inner.iter_mut().find(|e| e.id == embedding.id) {
            *existing = embedding;
        } else {
            inner.push(embedding);
        }
        Ok(())
    }

    fn knn(&self, query: &[f32], k: usize) -> Result<Vec<ScoredEmbedding>, CoreError> {
        let inner = self.inner.lock().unwrap();
        let mut scored: Vec<ScoredEmbedding> = inner
            .iter()
            .map(|e| ScoredEmbedding {
                embedding: e.clone(),
                score: cosine(query, &e.vector),
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }
}
