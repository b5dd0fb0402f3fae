//! Materialises the community hierarchy graph into `CommunityNode`/
//! `CommunityEdge` records, grounded on
//! `examples/original_source/raglib/graphrag/index/KG_4_InitLeidenCommunities.py`.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use uuid::Uuid;

use crate::error::CoreError;
use crate::graph::GraphStore;
use crate::leiden::{build_community_graph, hierarchical_leiden, CommunityGraph, Graph, LeidenRng};
use crate::model::{CommunityEdge, CommunityEdgeKind, CommunityNode, File, MentionedIn, Node, Relation, ROOT_KEY};

/// Namespace used to derive a stable `Uuid` for a `File` vertex from
/// its `File::key`, so the Leiden graph's vertex space can be the
/// union of `Node` and `File` ids without widening `CommunityNode`'s
/// `vertices: Vec<Uuid>` field.
const FILE_VERTEX_NAMESPACE: Uuid = Uuid::from_bytes([
    0x2b, 0x15, 0x9e, 0x0d, 0x8a, 0x6b, 0x4c, 0x2e, 0x9b, 0x3e, 0x4a, 0x7f, 0x1d, 0x6c, 0x8e, 0x02,
]);

fn file_vertex_id(key: &str) -> Uuid {
    Uuid::new_v5(&FILE_VERTEX_NAMESPACE, key.as_bytes())
}

/// One edge of either the `Relation` or `mentionedIn` collection, kept
/// around after the Leiden graph is built so `materialise_nodes` can
/// recover incident-edge sets and leaf descriptions without re-walking
/// the store.
struct EdgeRecord {
    from: usize,
    to: usize,
    label: String,
}

/// Runs the Leiden partitioner over the union of `Node`/`File`
/// vertices and `Relation`/`mentionedIn` edges currently in `store`
/// (both edge collections bidirectional, per
/// `G_LeidenAlgorithm.py::build_graph_from_arangoDB`) and rebuilds the
/// community hierarchy from scratch, carrying forward any
/// non-placeholder summary whose `(vertices, edges)` identity is
/// unchanged (spec §4.H's dedup-by-identity rule).
pub fn build(store: &dyn GraphStore, rng: &mut LeidenRng) -> Result<(), CoreError> {
    let nodes = store.all_nodes()?;
    let files = store.all_files()?;
    let relations = store.all_relations()?;
    let mentioned_in = store.all_mentioned_in()?;

    let mut vertex_ids: Vec<Uuid> = Vec::with_capacity(nodes.len() + files.len());
    let mut vertex_labels: Vec<String> = Vec::with_capacity(nodes.len() + files.len());
    let mut vertex_index: HashMap<Uuid, usize> = HashMap::with_capacity(nodes.len() + files.len());

    for node in &nodes {
        vertex_index.insert(node.id, vertex_ids.len());
        vertex_ids.push(node.id);
        vertex_labels.push(node.label.clone());
    }
    for file in &files {
        let fid = file_vertex_id(&file.key);
        vertex_index.insert(fid, vertex_ids.len());
        vertex_ids.push(fid);
        vertex_labels.push(file.label.clone());
    }

    let mut graph = Graph::new(vertex_ids.len());
    let mut edge_records: Vec<EdgeRecord> = Vec::new();
    let mut incident_edges: Vec<Vec<usize>> = vec![Vec::new(); vertex_ids.len()];

    for rel in &relations {
        if let (Some(&u), Some(&v)) = (vertex_index.get(&rel.from), vertex_index.get(&rel.to)) {
            let weight = rel.source_ref.get("_total").copied().unwrap_or(1) as f64;
            graph.add_edge(u, v, weight);
            let edge_id = edge_records.len();
            edge_records.push(EdgeRecord { from: u, to: v, label: rel.label.clone() });
            incident_edges[u].push(edge_id);
            incident_edges[v].push(edge_id);
        }
    }
    for mention in &mentioned_in {
        let fid = file_vertex_id(&mention.file_key);
        if let (Some(&u), Some(&v)) = (vertex_index.get(&mention.node_id), vertex_index.get(&fid)) {
            graph.add_edge(u, v, mention.weight as f64);
            let edge_id = edge_records.len();
            edge_records.push(EdgeRecord { from: u, to: v, label: mention.label.clone() });
            incident_edges[u].push(edge_id);
            incident_edges[v].push(edge_id);
        }
    }

    let old_nodes = store.all_community_nodes()?;
    let mut carry_forward: HashMap<(Vec<Uuid>, Vec<usize>), CommunityNode> = HashMap::new();
    for old in old_nodes {
        if old.content != "_" {
            carry_forward.insert((old.vertices.clone(), old.edges.clone()), old);
        }
    }

    let result = hierarchical_leiden(&graph, rng);
    let community_graph = build_community_graph(&graph, &result);

    store.truncate_community_nodes()?;
    store.truncate_community_edges()?;

    let keys = materialise_nodes(
        store,
        &community_graph,
        &vertex_ids,
        &vertex_labels,
        &nodes,
        &edge_records,
        &incident_edges,
        &carry_forward,
    )?;
    materialise_edges(store, &community_graph, &keys)?;

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn materialise_nodes(
    store: &dyn GraphStore,
    community_graph: &CommunityGraph,
    vertex_ids: &[Uuid],
    vertex_labels: &[String],
    nodes: &[Node],
    edge_records: &[EdgeRecord],
    incident_edges: &[Vec<usize>],
    carry_forward: &HashMap<(Vec<Uuid>, Vec<usize>), CommunityNode>,
) -> Result<Vec<Vec<String>>, CoreError> {
    let node_by_vertex: HashMap<Uuid, &Node> = nodes.iter().map(|n| (n.id, n)).collect();
    let mut keys: Vec<Vec<String>> = Vec::with_capacity(community_graph.layers.len());

    for (degree, layer) in community_graph.layers.iter().enumerate() {
        let mut layer_keys = Vec::with_capacity(layer.len());

        for (idx, community) in layer.iter().enumerate() {
            let community_key = format!("{:05}/{:05}", degree, idx);

            let mut vertices: Vec<Uuid> = community.vertices.iter().map(|&vi| vertex_ids[vi]).collect();
            vertices.sort();

            let mut edge_set: BTreeSet<usize> = BTreeSet::new();
            for &vi in &community.vertices {
                edge_set.extend(incident_edges[vi].iter().copied());
            }
            let edge_ids: Vec<usize> = edge_set.into_iter().collect();

            let mut source_ref: BTreeMap<String, u64> = BTreeMap::new();
            for &vi in &community.vertices {
                if let Some(node) = node_by_vertex.get(&vertex_ids[vi]) {
                    for (source, &count) in &node.source_ref {
                        *source_ref.entry(source.clone()).or_insert(0) += count;
                    }
                }
            }

            let signature = (vertices.clone(), edge_ids.clone());
            let community_node = if let Some(old) = carry_forward.get(&signature) {
                CommunityNode {
                    community_key: community_key.clone(),
                    community_degree: degree as u32,
                    community_index: idx as u32,
                    vertices,
                    edges: edge_ids,
                    label: old.label.clone(),
                    content: old.content.clone(),
                    is_leaf: community.is_leaf,
                    is_copy: old.is_copy,
                    weight: old.weight,
                    source: source_ref.clone(),
                    source_ref,
                    document: BTreeMap::new(),
                }
            } else if community.is_leaf && community.vertices.len() == 1 {
                let vi = community.vertices[0];
                let label = vertex_labels[vi].clone();
                let content = describe_leaf(vi, &label, edge_records, vertex_labels);
                let weight = node_by_vertex.get(&vertex_ids[vi]).map(|n| n.weight).unwrap_or(1.0);
                CommunityNode {
                    community_key: community_key.clone(),
                    community_degree: degree as u32,
                    community_index: idx as u32,
                    vertices,
                    edges: edge_ids,
                    label,
                    content,
                    is_leaf: true,
                    is_copy: false,
                    weight,
                    source: source_ref.clone(),
                    source_ref,
                    document: BTreeMap::new(),
                }
            } else {
                CommunityNode {
                    community_key: community_key.clone(),
                    community_degree: degree as u32,
                    community_index: idx as u32,
                    vertices,
                    edges: edge_ids,
                    label: "_".to_string(),
                    content: "_".to_string(),
                    is_leaf: community.is_leaf,
                    is_copy: false,
                    weight: 0.0,
                    source: source_ref.clone(),
                    source_ref,
                    document: BTreeMap::new(),
                }
            };

            store.upsert_community_node(community_node)?;
            layer_keys.push(community_key);
        }
        keys.push(layer_keys);
    }

    Ok(keys)
}

fn materialise_edges(store: &dyn GraphStore, community_graph: &CommunityGraph, keys: &[Vec<String>]) -> Result<(), CoreError> {
    for edge in &community_graph.edges {
        store.add_community_edge(CommunityEdge {
            from_key: keys[edge.parent_layer][edge.parent_index].clone(),
            to_key: keys[edge.child_layer][edge.child_index].clone(),
            kind: CommunityEdgeKind::Contains,
            weight: edge.weight,
        })?;
    }

    if let Some(top_layer) = keys.first() {
        for key in top_layer {
            store.add_community_edge(CommunityEdge {
                from_key: ROOT_KEY.to_string(),
                to_key: key.clone(),
                kind: CommunityEdgeKind::Contains,
                weight: 1,
            })?;
        }
    }

    Ok(())
}

/// One sentence per `(edge-label, direction)` bucket, each listing up
/// to five neighbour labels, matching spec §4.H's leaf-description
/// rule. Walks both `Relation` and `mentionedIn` edges alike, since
/// both are "graph edge collections" in the original's description
/// routine and a leaf vertex may be either a `Node` or a `File`.
fn describe_leaf(vertex: usize, label: &str, edges: &[EdgeRecord], vertex_labels: &[String]) -> String {
    let mut outgoing: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    let mut incoming: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

    for edge in edges {
        if edge.from == vertex && edge.to != vertex {
            let bucket = outgoing.entry(edge.label.as_str()).or_default();
            if bucket.len() < 5 {
                bucket.push(vertex_labels[edge.to].as_str());
            }
        } else if edge.to == vertex && edge.from != vertex {
            let bucket = incoming.entry(edge.label.as_str()).or_default();
            if bucket.len() < 5 {
                bucket.push(vertex_labels[edge.from].as_str());
            }
        }
    }

    let mut sentences = Vec::new();
    for (edge_label, neighbours) in &outgoing {
        sentences.push(format!("{} {} {}.", label, edge_label.replace('_', " "), neighbours.join(", ")));
    }
    for (edge_label, neighbours) in &incoming {
        sentences.push(format!("{} is the target of \"{}\" from {}.", label, edge_label.replace('_', " "), neighbours.join(", ")));
    }

    if sentences.is_empty() {
        format!("{label} has no recorded relations.")
    } else {
        sentences.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::InMemoryGraphStore;

    #[test]
    fn includes_file_vertices_and_mentioned_in_edges_in_the_leiden_graph() {
        let store = InMemoryGraphStore::new();
        let mut rng = LeidenRng::from_seed(1);

        let mut a = Node::new("Alpha", "Concept");
        a.record_mention("doc-1");
        let mut b = Node::new("Beta", "Concept");
        b.record_mention("doc-1");
        let a_id = store.upsert_node(a).unwrap();
        let b_id = store.upsert_node(b).unwrap();

        store
            .upsert_relation(Relation {
                from: a_id,
                to: b_id,
                label: "relates_to".to_string(),
                source_ref: BTreeMap::from([("doc-1".to_string(), 3), ("_total".to_string(), 3)]),
            })
            .unwrap();

        store
            .upsert_file(File {
                key: "doc-1".to_string(),
                path: "/tmp/doc-1.pdf".to_string(),
                label: "doc-1".to_string(),
                loaded_at: chrono::Utc::now(),
                chunk_count: 1,
            })
            .unwrap();
        store.add_mentioned_in(MentionedIn::new(a_id, "doc-1", 1)).unwrap();
        store.add_mentioned_in(MentionedIn::new(b_id, "doc-1", 1)).unwrap();

        build(&store, &mut rng).unwrap();

        let file_vertex = file_vertex_id("doc-1");
        let all = store.all_community_nodes().unwrap();
        assert!(all.iter().any(|c| c.vertices.contains(&file_vertex)), "File vertex should appear in some community");
        assert!(
            all.iter().any(|c| c.vertices.contains(&a_id) && c.vertices.contains(&file_vertex)),
            "a node and its file should share a community once mentionedIn edges are wired in"
        );
    }
}
