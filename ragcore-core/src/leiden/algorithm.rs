//! The CPM Leiden core: `move_nodes`, `refine_partition`,
//! `merge_nodes_subset`, `aggregate_graph`, and the CPM/Δ-CPM formulas,
//! grounded file-for-file on
//! `examples/original_source/raglib/graphrag/index/G_LeidenAlgorithm.py`.

use std::collections::{HashMap, HashSet, VecDeque};

use super::graph::Graph;
use super::partition::Partition;
use super::rng::LeidenRng;

/// Refinement randomness (spec §4.G).
pub const THETA: f64 = 0.1;
pub const MAX_CLUSTER_SIZE: usize = 20;
pub const MAX_DEPTH: u32 = 6;
pub const GAMMA_MULTIPLIER: f64 = 2.0;
/// `709` saturates `f64::exp`; scaled by `THETA` as spec §4.G specifies.
pub const MAX_EXP: f64 = 709.0 * THETA;

/// `γ = 2.75/|V| + 0.0025`.
pub fn default_gamma(n: usize) -> f64 {
    2.75 / (n.max(1) as f64) + 0.0025
}

/// `f(c, n) = 0.5·n·(1−n) − n·c`, the CPM size term used by both the
/// flat objective and the Δ-CPM move formula.
fn f(c: f64, n: f64) -> f64 {
    0.5 * n * (1.0 - n) - n * c
}

/// `H(G,P) = Σ_C [ in(C) − γ·C(|C|,2) ]` evaluated directly on the
/// original graph: `communities` are original-vertex-id groups (after
/// flattening any aggregation), so this function also serves as the
/// ground truth for the Leiden-monotonicity test property.
pub fn cpm_objective(graph: &Graph, communities: &[Vec<usize>], gamma: f64) -> f64 {
    let mut membership = vec![usize::MAX; graph.n];
    for (ci, members) in communities.iter().enumerate() {
        for &v in members {
            membership[v] = ci;
        }
    }
    let mut in_weight = vec![0.0; communities.len()];
    for v in 0..graph.n {
        for (u, w) in graph.neighbors(v) {
            if u > v && membership[v] != usize::MAX && membership[v] == membership[u] {
                in_weight[membership[v]] += w;
            }
        }
    }
    communities
        .iter()
        .enumerate()
        .map(|(ci, members)| {
            let size: f64 = members.iter().map(|&v| graph.sizes[v]).sum();
            in_weight[ci] - gamma * size * (size - 1.0) / 2.0
        })
        .sum()
}

/// Local-move phase: repeatedly pops a vertex, evaluates moving it to
/// an empty singleton or to each neighbouring community, and applies
/// the best strictly-positive-Δ move. Returns whether anything moved.
pub fn move_nodes(graph: &Graph, partition: &mut Partition, gamma: f64, rng: &mut LeidenRng) -> bool {
    let n = graph.n;
    let mut comm_size: HashMap<usize, f64> = HashMap::new();
    for v in 0..n {
        *comm_size.entry(partition.community_of[v]).or_insert(0.0) += graph.sizes[v];
    }

    let mut queue: VecDeque<usize> = rng.shuffled((0..n).collect()).into();
    let mut queued: Vec<bool> = vec![true; n];
    let mut any_move = false;

    while let Some(v) = queue.pop_front() {
        queued[v] = false;
        let cur_comm = partition.community_of[v];
        let n_v = graph.sizes[v];

        let mut to_comm: HashMap<usize, f64> = HashMap::new();
        for (u, w) in graph.neighbors(v) {
            if u == v {
                continue;
            }
            *to_comm.entry(partition.community_of[u]).or_insert(0.0) += w;
        }

        let cur_size_excl = (comm_size.get(&cur_comm).copied().unwrap_or(n_v) - n_v).max(0.0);
        let edges_to_cur = to_comm.get(&cur_comm).copied().unwrap_or(0.0);

        // Option (a): move to an empty singleton.
        let mut best_delta = -edges_to_cur + gamma * (f(0.0, n_v) - f(cur_size_excl, n_v));
        let mut best_comm: Option<usize> = None;

        // Option (b): move to each neighbouring existing community.
        for (&comm, &edges_to_target) in &to_comm {
            if comm == cur_comm {
                continue;
            }
            let target_size = comm_size.get(&comm).copied().unwrap_or(0.0);
            let delta = edges_to_target - edges_to_cur + gamma * (f(target_size, n_v) - f(cur_size_excl, n_v));
            if delta > best_delta {
                best_delta = delta;
                best_comm = Some(comm);
            }
        }

        if best_delta > 1e-9 {
            any_move = true;
            let new_comm = best_comm.unwrap_or(v);

            *comm_size.entry(cur_comm).or_insert(0.0) -= n_v;
            if comm_size.get(&cur_comm).copied().unwrap_or(0.0) <= 1e-9 {
                comm_size.remove(&cur_comm);
            }
            *comm_size.entry(new_comm).or_insert(0.0) += n_v;
            partition.community_of[v] = new_comm;

            for (u, _) in graph.neighbors(v) {
                if partition.community_of[u] != new_comm && !queued[u] {
                    queued[u] = true;
                    queue.push_back(u);
                }
            }
        }
    }
    any_move
}

/// Refinement phase: seeds a fresh singleton partition, then runs
/// `merge_nodes_subset` independently within each community of the
/// outer partition.
pub fn refine_partition(graph: &Graph, outer: &Partition, gamma: f64, rng: &mut LeidenRng) -> Partition {
    let mut refined = Partition::singleton(graph.n);
    for (_, members) in outer.members_by_community() {
        merge_nodes_subset(graph, &members, &mut refined, gamma, rng);
    }
    refined
}

/// Merges well-connected singletons of `subset` into well-connected
/// candidate sub-communities already present in `refined`, sampling
/// among positive-Δ candidates with probability `∝ exp(Δ/θ)`.
fn merge_nodes_subset(graph: &Graph, subset: &[usize], refined: &mut Partition, gamma: f64, rng: &mut LeidenRng) {
    let subset_set: HashSet<usize> = subset.iter().copied().collect();
    let total_size: f64 = subset.iter().map(|&v| graph.sizes[v]).sum();

    let edges_out = |members: &HashSet<usize>| -> f64 {
        members
            .iter()
            .flat_map(|&u| graph.neighbors(u))
            .filter(|(w, _)| subset_set.contains(w) && !members.contains(w))
            .map(|(_, wt)| wt)
            .sum()
    };

    let well_connected = |v: usize| -> bool {
        let n_v = graph.sizes[v];
        let singleton: HashSet<usize> = std::iter::once(v).collect();
        edges_out(&singleton) >= gamma * n_v * (total_size - n_v)
    };

    for v in rng.shuffled(subset.to_vec()) {
        if refined.community_of[v] != v || !well_connected(v) {
            continue; // already merged elsewhere, or not well-connected
        }

        let candidate_ids: HashSet<usize> = subset.iter().map(|&u| refined.community_of[u]).collect();
        let mut deltas: Vec<(usize, f64)> = Vec::new();

        for &comm in &candidate_ids {
            if comm == v {
                continue;
            }
            let comm_members: HashSet<usize> = subset.iter().filter(|&&u| refined.community_of[u] == comm).copied().collect();
            let comm_size: f64 = comm_members.iter().map(|&u| graph.sizes[u]).sum();
            if edges_out(&comm_members) < gamma * comm_size * (total_size - comm_size) {
                continue; // candidate sub-community itself not well-connected
            }
            let edges_v_comm: f64 = graph.neighbors(v).filter(|(u, _)| comm_members.contains(u)).map(|(_, w)| w).sum();
            let n_v = graph.sizes[v];
            let delta = edges_v_comm + gamma * (f(comm_size, n_v) - f(0.0, n_v));
            if delta >= 0.0 {
                deltas.push((comm, delta));
            }
        }

        if deltas.is_empty() {
            continue;
        }
        let weights: Vec<f64> = deltas
            .iter()
            .map(|&(_, d)| {
                let x = d / THETA;
                if x >= MAX_EXP {
                    MAX_EXP.exp()
                } else {
                    x.exp()
                }
            })
            .collect();
        if let Some(idx) = rng.weighted_choice(&weights) {
            refined.community_of[v] = deltas[idx].0;
        }
    }
}

/// Collapses the refined partition's communities into super-vertices.
/// `members_in[v]` gives the original (global) vertex ids vertex `v`
/// of `graph` already represents; the result's `members` composes
/// that mapping one level deeper. Returns the aggregated graph, the
/// new members table, and refined-community-id -> super-vertex-index.
pub fn aggregate_graph(
    graph: &Graph,
    refined: &Partition,
    members_in: &[Vec<usize>],
) -> (Graph, Vec<Vec<usize>>, HashMap<usize, usize>) {
    let mut comm_ids: Vec<usize> = refined.community_of.iter().copied().collect::<HashSet<_>>().into_iter().collect();
    comm_ids.sort_unstable();
    let index: HashMap<usize, usize> = comm_ids.iter().enumerate().map(|(i, &c)| (c, i)).collect();
    let m = comm_ids.len();

    let mut new_members = vec![Vec::new(); m];
    let mut sizes = vec![0.0; m];
    for v in 0..graph.n {
        let s = index[&refined.community_of[v]];
        sizes[s] += graph.sizes[v];
        new_members[s].extend(members_in[v].iter().copied());
    }

    let mut new_graph = Graph::new(m);
    new_graph.sizes = sizes;
    new_graph.total_weight = graph.total_weight;

    let mut edge_acc: HashMap<(usize, usize), f64> = HashMap::new();
    for v in 0..graph.n {
        let sv = index[&refined.community_of[v]];
        for (u, w) in graph.neighbors(v) {
            if u <= v {
                continue;
            }
            let su = index[&refined.community_of[u]];
            if su == sv {
                continue;
            }
            let key = (sv.min(su), sv.max(su));
            *edge_acc.entry(key).or_insert(0.0) += w;
        }
    }
    for ((a, b), w) in edge_acc {
        new_graph.add_edge(a, b, w);
    }

    (new_graph, new_members, index)
}

/// Runs one flat (non-hierarchical) Leiden pass to convergence:
/// alternates local-move and refine+aggregate until the number of
/// communities found equals the number of super-vertices aggregated
/// (spec §4.G's "Iteration" stopping rule). Returns the final
/// communities as groups of original `graph` vertex ids.
pub fn leiden_flat(graph: &Graph, gamma: f64, rng: &mut LeidenRng) -> Vec<Vec<usize>> {
    if graph.n == 0 {
        return Vec::new();
    }
    if graph.n == 1 {
        return vec![vec![0]];
    }

    let mut cur_graph = graph.clone();
    let mut cur_members: Vec<Vec<usize>> = (0..graph.n).map(|v| vec![v]).collect();

    loop {
        let mut partition = Partition::singleton(cur_graph.n);
        move_nodes(&cur_graph, &mut partition, gamma, rng);
        let refined = refine_partition(&cur_graph, &partition, gamma, rng);
        let (agg_graph, agg_members, refined_to_super) = aggregate_graph(&cur_graph, &refined, &cur_members);

        let mut lifted = vec![0usize; agg_graph.n];
        for v in 0..cur_graph.n {
            let s = refined_to_super[&refined.community_of[v]];
            lifted[s] = partition.community_of[v];
        }
        let lifted_partition = Partition { community_of: lifted };
        let converged = lifted_partition.num_communities() == agg_graph.n;

        if converged {
            let mut groups: HashMap<usize, Vec<usize>> = HashMap::new();
            for s in 0..agg_graph.n {
                groups.entry(lifted_partition.community_of[s]).or_default().extend(agg_members[s].iter().copied());
            }
            let mut result: Vec<Vec<usize>> = groups.into_values().collect();
            for group in &mut result {
                group.sort_unstable();
            }
            result.sort_by_key(|g| g.first().copied().unwrap_or(0));
            return result;
        }

        cur_graph = agg_graph;
        cur_members = agg_members;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_disjoint_triangles() -> Graph {
        let mut g = Graph::new(6);
        for &(a, b) in &[(0, 1), (0, 2), (1, 2), (3, 4), (3, 5), (4, 5)] {
            g.add_edge(a, b, 1.0);
        }
        g
    }

    #[test]
    fn two_disjoint_triangles_stay_separate() {
        let graph = two_disjoint_triangles();
        let mut rng = LeidenRng::seeded();
        let mut communities = leiden_flat(&graph, 0.2, &mut rng);
        for c in &mut communities {
            c.sort_unstable();
        }
        communities.sort();
        assert_eq!(communities, vec![vec![0, 1, 2], vec![3, 4, 5]]);
    }

    #[test]
    fn twenty_vertex_clique_collapses_to_one_community() {
        let n = 20;
        let mut g = Graph::new(n);
        for i in 0..n {
            for j in (i + 1)..n {
                g.add_edge(i, j, 1.0);
            }
        }
        let gamma = default_gamma(n);
        let mut rng = LeidenRng::seeded();
        let communities = leiden_flat(&g, gamma, &mut rng);
        assert_eq!(communities.len(), 1);
        assert_eq!(communities[0].len(), n);
    }

    #[test]
    fn local_move_phase_never_decreases_the_cpm_objective() {
        let graph = two_disjoint_triangles();
        let gamma = 0.2;
        let singletons: Vec<Vec<usize>> = (0..graph.n).map(|v| vec![v]).collect();
        let before = cpm_objective(&graph, &singletons, gamma);

        let mut rng = LeidenRng::seeded();
        let communities = leiden_flat(&graph, gamma, &mut rng);
        let after = cpm_objective(&graph, &communities, gamma);

        assert!(after >= before, "leiden_flat regressed the CPM objective: {after} < {before}");
    }

    #[test]
    fn leiden_flat_partitions_every_vertex_exactly_once() {
        let graph = two_disjoint_triangles();
        let mut rng = LeidenRng::seeded();
        let communities = leiden_flat(&graph, 0.2, &mut rng);
        let mut seen: Vec<usize> = communities.into_iter().flatten().collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..graph.n).collect::<Vec<_>>());
    }
}
