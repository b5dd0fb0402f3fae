//! The data model shared across every pipeline stage.
//!
//! Generalises the teacher's `DocumentNode`/`DocumentGraph` arena (see
//! `types.rs`) from "one tree per document" to the five collections
//! this system accumulates across a whole corpus: files, knowledge
//! graph nodes and relations, `mentionedIn` edges, and the community
//! hierarchy built on top.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A source document that has been loaded and chunked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct File {
    /// Stable key, derived from the file's content hash — this is what
    /// `source_ref` maps and `mentionedIn` edges key on.
    pub key: String,
    pub path: String,
    pub label: String,
    pub loaded_at: DateTime<Utc>,
    pub chunk_count: usize,
}

/// A single chunk produced by the chunker, still attached to its file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub file_key: String,
    pub index: usize,
    pub heading_path: Vec<String>,
    pub text: String,
    pub pages: Vec<u32>,
}

/// A knowledge-graph entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: Uuid,
    pub label: String,
    pub node_type: String,
    /// Additive per-source occurrence counts, keyed by `File::key`,
    /// with a `_total` pseudo-key tracking the running sum — mirrors
    /// the original's `source_ref` accumulator.
    pub source_ref: BTreeMap<String, u64>,
    /// Weight assigned by the KG post-processor's inverse-source
    /// reweighting pass; `0.0` until that stage has run.
    pub weight: f64,
}

impl Node {
    pub fn new(label: impl Into<String>, node_type: impl Into<String>) -> Self {
        Node {
            id: Uuid::new_v4(),
            label: label.into(),
            node_type: node_type.into(),
            source_ref: BTreeMap::new(),
            weight: 0.0,
        }
    }

    /// Records an additional mention of this node in `source`, bumping
    /// both the per-source count and the `_total` counter.
    pub fn record_mention(&mut self, source: &str) {
        *self.source_ref.entry(source.to_string()).or_insert(0) += 1;
        *self.source_ref.entry("_total".to_string()).or_insert(0) += 1;
    }

    pub fn total_mentions(&self) -> u64 {
        self.source_ref.get("_total").copied().unwrap_or(0)
    }
}

/// A directed, labelled edge between two `Node`s.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relation {
    pub from: Uuid,
    pub to: Uuid,
    pub label: String,
    pub source_ref: BTreeMap<String, u64>,
}

/// An edge connecting a `Node` to the `File` it was first observed to
/// not already be reachable from, with the weight of that observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MentionedIn {
    pub node_id: Uuid,
    pub file_key: String,
    pub weight: u64,
    pub label: String,
}

impl MentionedIn {
    pub fn new(node_id: Uuid, file_key: impl Into<String>, weight: u64) -> Self {
        MentionedIn {
            node_id,
            file_key: file_key.into(),
            weight,
            label: "is mentioned in".to_string(),
        }
    }
}

/// A node of the community hierarchy built on top of the knowledge
/// graph by the Leiden partitioner and the community builder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunityNode {
    /// `"{degree:05}/{index:05}"`, unique within the community graph.
    pub community_key: String,
    pub community_degree: u32,
    pub community_index: u32,
    /// Sorted, disjoint (within a degree) member vertex ids.
    pub vertices: Vec<Uuid>,
    /// Ids of every `Relation` edge incident to any member vertex.
    pub edges: Vec<usize>,
    pub label: String,
    /// `"_"` until the summariser has produced a real description.
    pub content: String,
    pub is_leaf: bool,
    pub is_copy: bool,
    pub weight: f64,
    pub source: BTreeMap<String, u64>,
    pub source_ref: BTreeMap<String, u64>,
    pub document: BTreeMap<String, u64>,
}

/// A parent→child edge in the community hierarchy graph, one layer
/// apart. `weight` is `1` for a copy edge (child identical to parent)
/// or the count of original-graph edges crossing the child/rest-of-
/// parent boundary otherwise. The root pseudo-edge (from the full
/// vertex set to every depth-0 community) is modelled the same way
/// with `from_key` equal to the sentinel `ROOT_KEY`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunityEdge {
    pub from_key: String,
    pub to_key: String,
    pub kind: CommunityEdgeKind,
    pub weight: u64,
}

pub const ROOT_KEY: &str = "root";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommunityEdgeKind {
    Contains,
}

/// The uniform shape every retrieval strategy returns records in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalRecord {
    pub name: String,
    pub category: String,
    pub path: String,
    pub record_type: String,
    pub matched_content: String,
    pub surrounding_content: String,
    pub links: Vec<String>,
}
