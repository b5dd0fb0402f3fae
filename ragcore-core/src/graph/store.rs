use uuid::Uuid;

use crate::error::CoreError;
use crate::model::{CommunityEdge, CommunityNode, File, MentionedIn, Node, Relation};

/// Declares which vertex collections an edge collection is allowed to
/// connect, mirroring the `(from_collections, to_collections)` shape
/// the original graph store's edge-collection creation takes.
#[derive(Debug, Clone)]
pub struct EdgeDefinition {
    pub name: String,
    pub from: Vec<String>,
    pub to: Vec<String>,
}

/// Storage-agnostic interface over the property graph this pipeline
/// builds: `File`/`Node`/`Relation`/`MentionedIn`/community
/// collections. Production backends (ArangoDB, Neo4j, ...) are out of
/// scope; this trait is the seam a real deployment would implement it
/// behind.
pub trait GraphStore: Send + Sync {
    fn upsert_file(&self, file: File) -> Result<(), CoreError>;
    fn get_file(&self, key: &str) -> Result<Option<File>, CoreError>;
    fn all_files(&self) -> Result<Vec<File>, CoreError>;

    /// Inserts a new node and returns its id, or merges `node`'s
    /// `source_ref` counts into an existing node with the same label
    /// and type and returns that node's id instead. This is the
    /// additive upsert semantics the knowledge-graph builder relies on.
    fn upsert_node(&self, node: Node) -> Result<Uuid, CoreError>;
    fn get_node(&self, id: Uuid) -> Result<Option<Node>, CoreError>;
    fn update_node(&self, node: Node) -> Result<(), CoreError>;
    fn all_nodes(&self) -> Result<Vec<Node>, CoreError>;
    fn find_node_by_label(&self, label: &str, node_type: &str) -> Result<Option<Node>, CoreError>;

    /// Inserts a relation, or merges its `source_ref` into an existing
    /// relation with the same `(from, to, label)` key.
    fn upsert_relation(&self, relation: Relation) -> Result<(), CoreError>;
    fn relations_from(&self, node_id: Uuid) -> Result<Vec<Relation>, CoreError>;
    fn all_relations(&self) -> Result<Vec<Relation>, CoreError>;

    fn add_mentioned_in(&self, edge: MentionedIn) -> Result<(), CoreError>;
    fn all_mentioned_in(&self) -> Result<Vec<MentionedIn>, CoreError>;
    fn truncate_mentioned_in(&self) -> Result<(), CoreError>;

    /// Enumerates every distinct node id reachable from `node_id`
    /// within `max_hops` traversing only `Relation` edges, in either
    /// direction, deduplicated by path as the original traversal does
    /// (`uniqueVertices: "path"`).
    fn reachable_within(&self, node_id: Uuid, max_hops: u32) -> Result<Vec<Uuid>, CoreError>;

    fn upsert_community_node(&self, node: CommunityNode) -> Result<(), CoreError>;
    fn get_community_node(&self, key: &str) -> Result<Option<CommunityNode>, CoreError>;
    fn all_community_nodes(&self) -> Result<Vec<CommunityNode>, CoreError>;
    fn truncate_community_nodes(&self) -> Result<(), CoreError>;

    fn add_community_edge(&self, edge: CommunityEdge) -> Result<(), CoreError>;
    fn children_of(&self, community_key: &str) -> Result<Vec<CommunityNode>, CoreError>;
    fn truncate_community_edges(&self) -> Result<(), CoreError>;
}
