//! GraphRAG: stitches community summaries into token-budget buckets
//! and asks the LLM to judge each bucket's relevance (spec §4.J).

use serde::Deserialize;

use crate::error::CoreError;
use crate::graph::GraphStore;
use crate::leiden::LeidenRng;
use crate::llm::LlmClient;
use crate::model::{CommunityNode, RetrievalRecord};

use super::GRAPHRAG_CONFIDENCE_CUTOFF;

const BUCKET_CHAR_BUDGET: usize = 4096;
const MAX_ATTEMPTS: u32 = 10;

const SYSTEM_PROMPT: &str = "You judge whether the provided community summaries are relevant to the \
user's question. Respond only with JSON: {\"information\": ..., \"confidence\": 0..100}.";

#[derive(Deserialize)]
struct Judgement {
    information: String,
    confidence: f64,
}

/// Gathers every non-leaf, non-copy community at `degree ≤
/// community_degree`, shuffles them, stitches into `≤4096`-char
/// buckets (never splitting a community across buckets), asks the LLM
/// to judge each, and returns the judged hits sorted by confidence,
/// truncated at `confidence_cutoff` and `max_matches`.
pub fn graphrag(
    store: &dyn GraphStore,
    llm: &dyn LlmClient,
    rng: &mut LeidenRng,
    question: &str,
    community_degree: u32,
    max_matches: usize,
    confidence_cutoff: f32,
) -> Result<Vec<RetrievalRecord>, CoreError> {
    let mut candidates: Vec<CommunityNode> = store
        .all_community_nodes()?
        .into_iter()
        .filter(|node| node.community_degree <= community_degree && !node.is_leaf && !node.is_copy && node.content != "_")
        .collect();

    let order = rng.shuffled((0..candidates.len()).collect());
    candidates = order.into_iter().map(|i| candidates[i].clone()).collect();

    let buckets = stitch_buckets(&candidates);

    let mut hits = Vec::new();
    for bucket in &buckets {
        if let Some((information, confidence)) = judge_bucket(llm, question, bucket)? {
            if confidence >= confidence_cutoff {
                hits.push((confidence, information, bucket.clone()));
            }
        }
    }

    hits.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    hits.truncate(max_matches);

    Ok(hits
        .into_iter()
        .map(|(confidence, information, bucket)| RetrievalRecord {
            name: bucket.first().map(|n| n.label.clone()).unwrap_or_default(),
            category: "community".to_string(),
            path: bucket.iter().map(|n| n.community_key.clone()).collect::<Vec<_>>().join(","),
            record_type: "graphrag".to_string(),
            matched_content: information,
            surrounding_content: format!("confidence={confidence:.1}"),
            links: Vec::new(),
        })
        .collect())
}

pub fn graphrag_default(
    store: &dyn GraphStore,
    llm: &dyn LlmClient,
    rng: &mut LeidenRng,
    question: &str,
    community_degree: u32,
    max_matches: usize,
) -> Result<Vec<RetrievalRecord>, CoreError> {
    graphrag(store, llm, rng, question, community_degree, max_matches, GRAPHRAG_CONFIDENCE_CUTOFF)
}

fn stitch_buckets(candidates: &[CommunityNode]) -> Vec<Vec<CommunityNode>> {
    let mut buckets: Vec<Vec<CommunityNode>> = Vec::new();
    let mut current: Vec<CommunityNode> = Vec::new();
    let mut current_len = 0usize;

    for node in candidates {
        let entry_len = node.label.len() + node.content.len() + 2;
        if current_len + entry_len > BUCKET_CHAR_BUDGET && !current.is_empty() {
            buckets.push(std::mem::take(&mut current));
            current_len = 0;
        }
        current_len += entry_len;
        current.push(node.clone());
    }
    if !current.is_empty() {
        buckets.push(current);
    }
    buckets
}

fn bucket_excerpt(bucket: &[CommunityNode]) -> String {
    bucket.iter().map(|node| format!("{}: {}\n", node.label, node.content)).collect()
}

fn judge_bucket(llm: &dyn LlmClient, question: &str, bucket: &[CommunityNode]) -> Result<Option<(String, f32)>, CoreError> {
    let excerpt = bucket_excerpt(bucket);
    let prompt = format!("Question: {question}\n\nCommunity summaries:\n{excerpt}");

    for _ in 0..MAX_ATTEMPTS {
        let response = llm.generate(SYSTEM_PROMPT, &prompt, Some("json"))?;
        if let Ok(judgement) = serde_json::from_str::<Judgement>(&response) {
            if (0.0..=100.0).contains(&judgement.confidence) {
                return Ok(Some((judgement.information, judgement.confidence as f32)));
            }
        }
    }
    Ok(None)
}
