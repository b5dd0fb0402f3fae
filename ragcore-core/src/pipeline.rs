//! Orchestrates the full indexing pipeline end to end (components D
//! through I) and exposes the four retrieval strategies (component J)
//! against its result, joining each stage the way spec §5 requires:
//! "the graph must be fully written before summarisation begins."
//!
//! Grounded on the teacher's `processor.rs::DocumentProcessor`
//! multi-stage orchestration shape; `StepProfiler`'s `println!`-based
//! stage timing is replaced by `tracing` spans/fields per DESIGN.md.

use std::path::Path;
use std::sync::Mutex;

use rayon::prelude::*;

use crate::chunker::DEFAULT_MAX_CHUNK_SIZE;
use crate::community;
use crate::error::CoreError;
use crate::graph::GraphStore;
use crate::kg;
use crate::leiden::LeidenRng;
use crate::llm::LlmClient;
use crate::loader::{LoadStats, Loader};
use crate::model::RetrievalRecord;
use crate::retrieval;
use crate::vector::VectorStore;

#[derive(Debug, Default, Clone, Copy)]
pub struct IndexStats {
    pub load: LoadStats,
    pub chunks_processed: usize,
    pub kg_failures: usize,
}

/// Runs the indexing pipeline over every file under `root`: load and
/// chunk (D), extract the knowledge graph (E), post-process it (F),
/// partition it hierarchically (G), materialise (H) and summarise (I)
/// the community hierarchy. `max_chunk_size = 0` uses the spec
/// default; `parallel_limit` bounds every stage's worker pool.
pub fn index(
    root: &Path,
    graph: &dyn GraphStore,
    chunk_vectors: &dyn VectorStore,
    community_vectors: &dyn VectorStore,
    llm: &dyn LlmClient,
    parallel_limit: usize,
    max_chunk_size: usize,
) -> Result<IndexStats, CoreError> {
    let max_chunk_size = if max_chunk_size == 0 { DEFAULT_MAX_CHUNK_SIZE } else { max_chunk_size };
    let parallel_limit = parallel_limit.max(1);

    let loader = Loader::new(graph, chunk_vectors, llm, max_chunk_size);
    let load_result = loader.load_path(root, parallel_limit)?;
    tracing::info!(
        files_loaded = load_result.stats.files_loaded,
        files_failed = load_result.stats.files_failed,
        chunks = load_result.chunks.len(),
        "loader finished"
    );

    let write_gate = Mutex::new(());
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(parallel_limit)
        .build()
        .map_err(|e| CoreError::Input(e.to_string()))?;

    let outcomes: Vec<Result<(), CoreError>> = pool.install(|| {
        load_result
            .chunks
            .par_iter()
            .map(|chunk| {
                let _gate = write_gate.lock().unwrap();
                kg::process_chunk(chunk, llm, graph)
            })
            .collect()
    });
    let kg_failures = outcomes.iter().filter(|r| r.is_err()).count();
    for outcome in &outcomes {
        if let Err(err) = outcome {
            tracing::warn!(%err, "KG extraction failed for a chunk, skipping");
        }
    }
    tracing::info!(chunks_processed = load_result.chunks.len(), kg_failures, "KG builder finished");

    kg::postprocess(graph)?;
    tracing::info!("KG post-processing finished");

    let mut rng = LeidenRng::seeded();
    community::build(graph, &mut rng)?;
    tracing::info!("community hierarchy built");

    community::summarise(graph, llm, community_vectors, &mut rng)?;
    tracing::info!("community summarisation finished");

    Ok(IndexStats {
        load: load_result.stats,
        chunks_processed: load_result.chunks.len(),
        kg_failures,
    })
}

/// The four retrieval strategies from spec §4.J, selectable by name so
/// the CLI and config (`[GARAG]`, `[GraphRAG]`, `[NaiveGraphRAG]`,
/// `[NaiveRAG]` sections) can dispatch on a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    NaiveRag,
    NaiveGraphRag,
    Garag,
    GraphRag,
}

impl Strategy {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "NaiveRAG" => Some(Strategy::NaiveRag),
            "NaiveGraphRAG" => Some(Strategy::NaiveGraphRag),
            "GARAG" => Some(Strategy::Garag),
            "GraphRAG" => Some(Strategy::GraphRag),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetrievalParams {
    pub top_k: usize,
    pub max_matches: usize,
    pub community_degree: u32,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        RetrievalParams {
            top_k: 10,
            max_matches: 10,
            community_degree: 0,
        }
    }
}

/// Runs `strategy` for `question` against the already-indexed store.
pub fn retrieve(
    strategy: Strategy,
    question: &str,
    graph: &dyn GraphStore,
    chunk_vectors: &dyn VectorStore,
    community_vectors: &dyn VectorStore,
    llm: &dyn LlmClient,
    params: &RetrievalParams,
) -> Result<Vec<RetrievalRecord>, CoreError> {
    match strategy {
        Strategy::NaiveRag => {
            let query_vector = llm.embed(question)?;
            retrieval::naive_rag_default(chunk_vectors, &query_vector, params.top_k)
        }
        Strategy::NaiveGraphRag => {
            let query_vector = llm.embed(question)?;
            retrieval::naive_graphrag_default(community_vectors, &query_vector, params.top_k)
        }
        Strategy::Garag => {
            let query_vector = llm.embed(question)?;
            retrieval::garag_default(community_vectors, chunk_vectors, graph, &query_vector, params.top_k, params.max_matches)
        }
        Strategy::GraphRag => {
            let mut rng = LeidenRng::seeded();
            retrieval::graphrag_default(graph, llm, &mut rng, question, params.community_degree, params.max_matches)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::graph::InMemoryGraphStore;
    use crate::llm::LlmClient;
    use crate::vector::InMemoryVectorStore;

    /// A test-only stand-in that recognises which of the three fixed
    /// system prompts (spec §6) it was asked to answer and returns a
    /// valid canned response for it, so pipeline tests exercise the
    /// real tolerant parsers instead of `EchoLlmClient`'s one shape.
    struct FixedLlm;

    impl LlmClient for FixedLlm {
        fn generate(&self, system: &str, _prompt: &str, _format: Option<&str>) -> Result<String, CoreError> {
            if system.contains("entities and relations") {
                Ok(r#"[{"From":"Alice","To":"Bob","Relation":"works_with"},
                       {"From":"Bob","To":"Carol","Relation":"manages"},
                       {"From":"Alice","To":"Acme","Relation":"founded"}]"#
                    .to_string())
            } else if system.contains("label") {
                Ok(r#"{"label": "People", "description": "A small group of colleagues and the company they founded."}"#.to_string())
            } else {
                Ok(r#"{"information": "relevant", "confidence": 80}"#.to_string())
            }
        }

        fn embed(&self, text: &str) -> Result<Vec<f32>, CoreError> {
            use sha2::{Digest, Sha256};
            let digest = Sha256::digest(text.as_bytes());
            Ok(digest.iter().take(16).map(|b| *b as f32 / 255.0).collect())
        }
    }

    #[test]
    fn index_then_retrieve_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("doc.txt"),
            "Alice works with Bob. Bob manages Carol. Alice founded Acme.",
        )
        .unwrap();

        let graph = InMemoryGraphStore::new();
        let chunk_vectors = InMemoryVectorStore::new();
        let community_vectors = InMemoryVectorStore::new();
        let llm = FixedLlm;

        let stats = index(dir.path(), &graph, &chunk_vectors, &community_vectors, &llm, 2, 4096).unwrap();
        assert_eq!(stats.load.files_loaded, 1);
        assert!(!graph.all_nodes().unwrap().is_empty());

        let records = retrieve(
            Strategy::NaiveRag,
            "Who does Alice work with?",
            &graph,
            &chunk_vectors,
            &community_vectors,
            &llm,
            &RetrievalParams::default(),
        )
        .unwrap();
        assert!(!records.is_empty());
    }

    #[test]
    fn strategy_parse_rejects_unknown_names() {
        assert_eq!(Strategy::parse("NaiveRAG"), Some(Strategy::NaiveRag));
        assert_eq!(Strategy::parse("VectorGR"), None);
    }
}
