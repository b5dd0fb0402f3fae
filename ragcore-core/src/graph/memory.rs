use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use uuid::Uuid;

use crate::error::CoreError;
use crate::model::{CommunityEdge, CommunityEdgeKind, CommunityNode, File, MentionedIn, Node, Relation};

use super::store::GraphStore;

/// A single-process, in-memory `GraphStore`. The only concrete graph
/// backend this crate ships; production deployments implement
/// `GraphStore` against their own store.
#[derive(Default)]
pub struct InMemoryGraphStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    files: HashMap<String, File>,
    nodes: HashMap<Uuid, Node>,
    relations: Vec<Relation>,
    mentioned_in: Vec<MentionedIn>,
    community_nodes: HashMap<String, CommunityNode>,
    community_edges: Vec<CommunityEdge>,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GraphStore for InMemoryGraphStore {
    fn upsert_file(&self, file: File) -> Result<(), CoreError> {
        self.inner.lock().unwrap().files.insert(file.key.clone(), file);
        Ok(())
    }

    fn get_file(&self, key: &str) -> Result<Option<File>, CoreError> {
        Ok(self.inner.lock().unwrap().files.get(key).cloned())
    }

    fn all_files(&self) -> Result<Vec<File>, CoreError> {
        Ok(self.inner.lock().unwrap().files.values().cloned().collect())
    }

    fn upsert_node(&self, node: Node) -> Result<Uuid, CoreError> {
        let mut inner = self.inner.lock().unwrap();
        let existing = inner
            .nodes
            .values_mut()
            .find(|n| n.label == node.label && n.node_type == node.node_type);
        if let Some(existing) = existing {
            for (source, count) in &node.source_ref {
                *existing.source_ref.entry(source.clone()).or_insert(0) += count;
            }
            return Ok(existing.id);
        }
        let id = node.id;
        inner.nodes.insert(id, node);
        Ok(id)
    }

    fn get_node(&self, id: Uuid) -> Result<Option<Node>, CoreError> {
        Ok(self.inner.lock().unwrap().nodes.get(&id).cloned())
    }

    fn update_node(&self, node: Node) -> Result<(), CoreError> {
        self.inner.lock().unwrap().nodes.insert(node.id, node);
        Ok(())
    }

    fn all_nodes(&self) -> Result<Vec<Node>, CoreError> {
        Ok(self.inner.lock().unwrap().nodes.values().cloned().collect())
    }

    fn find_node_by_label(&self, label: &str, node_type: &str) -> Result<Option<Node>, CoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .nodes
            .values()
            .find(|n| n.label == label && n.node_type == node_type)
            .cloned())
    }

    fn upsert_relation(&self, relation: Relation) -> Result<(), CoreError> {
        let mut inner = self.inner.lock().unwrap();
        let existing = inner
            .relations
            .iter_mut()
            .find(|r| r.from == relation.from && r.to == relation.to && r.label == relation.label);
        if let Some(existing) = existing {
            for (source, count) in &relation.source_ref {
                *existing.source_ref.entry(source.clone()).or_insert(0) += count;
            }
        } else {
            inner.relations.push(relation);
        }
        Ok(())
    }

    fn relations_from(&self, node_id: Uuid) -> Result<Vec<Relation>, CoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .relations
            .iter()
            .filter(|r| r.from == node_id || r.to == node_id)
            .cloned()
            .collect())
    }

    fn all_relations(&self) -> Result<Vec<Relation>, CoreError> {
        Ok(self.inner.lock().unwrap().relations.clone())
    }

    fn add_mentioned_in(&self, edge: MentionedIn) -> Result<(), CoreError> {
        self.inner.lock().unwrap().mentioned_in.push(edge);
        Ok(())
    }

    fn all_mentioned_in(&self) -> Result<Vec<MentionedIn>, CoreError> {
        Ok(self.inner.lock().unwrap().mentioned_in.clone())
    }

    fn truncate_mentioned_in(&self) -> Result<(), CoreError> {
        self.inner.lock().unwrap().mentioned_in.clear();
        Ok(())
    }

    fn reachable_within(&self, node_id: Uuid, max_hops: u32) -> Result<Vec<Uuid>, CoreError> {
        let inner = self.inner.lock().unwrap();
        let mut visited = HashSet::new();
        visited.insert(node_id);
        let mut frontier = VecDeque::new();
        frontier.push_back((node_id, 0u32));
        let mut reached = Vec::new();

        while let Some((current, depth)) = frontier.pop_front() {
            if depth >= max_hops {
                continue;
            }
            for relation in &inner.relations {
                let neighbor = if relation.from == current {
                    Some(relation.to)
                } else if relation.to == current {
                    Some(relation.from)
                } else {
                    None
                };
                if let Some(neighbor) = neighbor {
                    if visited.insert(neighbor) {
                        reached.push(neighbor);
                        frontier.push_back((neighbor, depth + 1));
                    }
                }
            }
        }
        Ok(reached)
    }

    fn upsert_community_node(&self, node: CommunityNode) -> Result<(), CoreError> {
        self.inner
            .lock()
            .unwrap()
            .community_nodes
            .insert(node.community_key.clone(), node);
        Ok(())
    }

    fn get_community_node(&self, key: &str) -> Result<Option<CommunityNode>, CoreError> {
        Ok(self.inner.lock().unwrap().community_nodes.get(key).cloned())
    }

    fn all_community_nodes(&self) -> Result<Vec<CommunityNode>, CoreError> {
        Ok(self.inner.lock().unwrap().community_nodes.values().cloned().collect())
    }

    fn truncate_community_nodes(&self) -> Result<(), CoreError> {
        self.inner.lock().unwrap().community_nodes.clear();
        Ok(())
    }

    fn add_community_edge(&self, edge: CommunityEdge) -> Result<(), CoreError> {
        self.inner.lock().unwrap().community_edges.push(edge);
        Ok(())
    }

    fn children_of(&self, community_key: &str) -> Result<Vec<CommunityNode>, CoreError> {
        let inner = self.inner.lock().unwrap();
        let child_keys: Vec<&str> = inner
            .community_edges
            .iter()
            .filter(|e| e.from_key == community_key && e.kind == CommunityEdgeKind::Contains)
            .map(|e| e.to_key.as_str())
            .collect();
        Ok(child_keys
            .into_iter()
            .filter_map(|k| inner.community_nodes.get(k).cloned())
            .collect())
    }

    fn truncate_community_edges(&self) -> Result<(), CoreError> {
        self.inner.lock().unwrap().community_edges.clear();
        Ok(())
    }
}
