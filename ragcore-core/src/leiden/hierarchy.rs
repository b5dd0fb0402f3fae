//! Hierarchical wrapping (oversized communities recurse with
//! `γ ← γ·2`, one depth consumed per level) and the community-
//! hierarchy-graph flattening into ordered layers, matching the
//! original's `get_hierarchical_leiden`/`get_community_graph`.

use std::collections::HashMap;

use super::algorithm::{default_gamma, leiden_flat, GAMMA_MULTIPLIER, MAX_CLUSTER_SIZE, MAX_DEPTH};
use super::graph::Graph;
use super::partition::Community;
use super::rng::LeidenRng;

pub struct HierarchicalResult {
    /// The depth-0 communities, each a (possibly further-nested) tree.
    pub roots: Vec<Community>,
    /// `1 + max` nesting depth across every root.
    pub depth: u32,
}

/// Runs the flat Leiden pass, then recursively wraps every community
/// larger than `MAX_CLUSTER_SIZE` (while depth budget remains) into a
/// nested sub-partition, per spec §4.G's "Hierarchical wrapping".
pub fn hierarchical_leiden(graph: &Graph, rng: &mut LeidenRng) -> HierarchicalResult {
    let gamma = default_gamma(graph.n.max(1));
    let flat = leiden_flat(graph, gamma, rng);
    let roots: Vec<Community> = flat
        .into_iter()
        .map(|members| wrap_community(graph, &members, gamma, MAX_DEPTH, rng))
        .collect();
    let depth = roots.iter().map(Community::depth).max().unwrap_or(0) as u32;
    HierarchicalResult { roots, depth }
}

fn wrap_community(graph: &Graph, members: &[usize], gamma: f64, depth_budget: u32, rng: &mut LeidenRng) -> Community {
    if members.len() <= MAX_CLUSTER_SIZE || depth_budget == 0 {
        let mut sorted = members.to_vec();
        sorted.sort_unstable();
        return Community::Internal(sorted.into_iter().map(Community::Leaf).collect());
    }
    let sub = graph.induced_subgraph(members);
    let sub_gamma = gamma * GAMMA_MULTIPLIER;
    let sub_flat = leiden_flat(&sub, sub_gamma, rng);
    if sub_flat.len() <= 1 {
        let mut sorted = members.to_vec();
        sorted.sort_unstable();
        return Community::Internal(sorted.into_iter().map(Community::Leaf).collect());
    }
    let children = sub_flat
        .into_iter()
        .map(|local_members| {
            let global_members: Vec<usize> = local_members.iter().map(|&i| members[i]).collect();
            wrap_community(graph, &global_members, sub_gamma, depth_budget - 1, rng)
        })
        .collect();
    Community::Internal(children)
}

/// One materialised layer entry: the community's flattened original
/// vertex ids and whether it is a singleton at the deepest layer.
pub struct LayerCommunity {
    pub vertices: Vec<usize>,
    pub is_leaf: bool,
}

/// A parent→child edge between adjacent layers.
pub struct LayerEdge {
    pub parent_layer: usize,
    pub parent_index: usize,
    pub child_layer: usize,
    pub child_index: usize,
    pub is_copy: bool,
    pub weight: u64,
}

pub struct CommunityGraph {
    /// `layers[d]` holds every community at degree `d`.
    pub layers: Vec<Vec<LayerCommunity>>,
    pub edges: Vec<LayerEdge>,
}

/// Flattens the nested partition into `D+1` ordered layers (layer 0 =
/// the top-level flat communities = degree 0, deepest = refined
/// leaves), with containment edges between adjacent layers, plus a
/// root pseudo-edge handled separately by the caller (it has no
/// `parent_layer`, so it isn't represented as a `LayerEdge`).
pub fn build_community_graph(graph: &Graph, result: &HierarchicalResult) -> CommunityGraph {
    let mut layers: Vec<Vec<LayerCommunity>> = vec![Vec::new(); (result.depth as usize) + 1];
    let mut edges = Vec::new();

    for root in &result.roots {
        let root_index = layers[0].len();
        layers[0].push(LayerCommunity {
            vertices: {
                let mut v = root.flatten();
                v.sort_unstable();
                v
            },
            is_leaf: matches!(root, Community::Internal(children) if children.len() == 1 && matches!(children[0], Community::Leaf(_))),
        });
        place_children(graph, root, 0, root_index, &mut layers, &mut edges);
    }

    CommunityGraph { layers, edges }
}

fn place_children(
    graph: &Graph,
    node: &Community,
    layer: usize,
    index: usize,
    layers: &mut Vec<Vec<LayerCommunity>>,
    edges: &mut Vec<LayerEdge>,
) {
    let Community::Internal(children) = node else {
        return;
    };
    let parent_vertices: Vec<usize> = {
        let mut v = node.flatten();
        v.sort_unstable();
        v
    };
    let next_layer = layer + 1;
    if next_layer >= layers.len() {
        return;
    }

    for child in children {
        let child_index = layers[next_layer].len();
        let mut child_vertices = child.flatten();
        child_vertices.sort_unstable();
        let is_copy = children.len() == 1 && child_vertices == parent_vertices;
        let is_leaf = matches!(child, Community::Leaf(_))
            || matches!(child, Community::Internal(grandchildren) if grandchildren.len() == 1 && matches!(grandchildren[0], Community::Leaf(_)));

        layers[next_layer].push(LayerCommunity {
            vertices: child_vertices.clone(),
            is_leaf,
        });

        let weight = if is_copy {
            1
        } else {
            crossing_weight(graph, &child_vertices, &parent_vertices)
        };
        edges.push(LayerEdge {
            parent_layer: layer,
            parent_index: index,
            child_layer: next_layer,
            child_index,
            is_copy,
            weight,
        });

        place_children(graph, child, next_layer, child_index, layers, edges);
    }
}

/// Count of original-graph edges crossing the boundary between
/// `child` and `parent \ child` (spec §3's community-edge weight
/// rule for the non-copy case).
fn crossing_weight(graph: &Graph, child: &[usize], parent: &[usize]) -> u64 {
    let child_set: HashMap<usize, ()> = child.iter().map(|&v| (v, ())).collect();
    let parent_set: HashMap<usize, ()> = parent.iter().map(|&v| (v, ())).collect();
    let mut count = 0u64;
    for &v in child {
        for (u, _) in graph.neighbors(v) {
            if parent_set.contains_key(&u) && !child_set.contains_key(&u) {
                count += 1;
            }
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::rng::LeidenRng;

    fn path_graph(n: usize) -> Graph {
        let mut g = Graph::new(n);
        for i in 0..n - 1 {
            g.add_edge(i, i + 1, 1.0);
        }
        g
    }

    #[test]
    fn long_path_splits_into_several_top_level_communities() {
        let graph = path_graph(100);
        let mut rng = LeidenRng::seeded();
        let result = hierarchical_leiden(&graph, &mut rng);
        assert!(
            result.roots.len() >= 2,
            "a 100-vertex path should not collapse into a single top-level community, got {}",
            result.roots.len()
        );
    }

    #[test]
    fn hierarchy_covers_every_vertex_exactly_once_at_the_top_layer() {
        let graph = path_graph(100);
        let mut rng = LeidenRng::seeded();
        let result = hierarchical_leiden(&graph, &mut rng);
        let mut covered: Vec<usize> = result.roots.iter().flat_map(Community::flatten).collect();
        covered.sort_unstable();
        assert_eq!(covered, (0..graph.n).collect::<Vec<_>>());
    }

    #[test]
    fn community_graph_layer_keys_are_unique_and_vertices_sorted() {
        let graph = path_graph(100);
        let mut rng = LeidenRng::seeded();
        let result = hierarchical_leiden(&graph, &mut rng);
        let community_graph = build_community_graph(&graph, &result);

        for layer in &community_graph.layers {
            for community in layer {
                let mut sorted = community.vertices.clone();
                sorted.sort_unstable();
                assert_eq!(community.vertices, sorted, "layer community vertices must already be sorted");
            }
            // Within one degree, every community's member set is disjoint from every other's.
            let mut seen = std::collections::HashSet::new();
            for community in layer {
                for &v in &community.vertices {
                    assert!(seen.insert(v), "vertex {v} appears in two communities at the same degree");
                }
            }
        }
    }
}
