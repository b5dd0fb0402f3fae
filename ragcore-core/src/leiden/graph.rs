//! The in-memory graph snapshot the partitioner operates on: compact
//! integer vertex ids, symmetric adjacency with O(1) neighbour-weight
//! lookup, and a per-vertex "size" (the flattened leaf count — 1.0 for
//! an original vertex, larger after aggregation), per spec §9's "arena
//! of vertex records... indices, not ids" guidance.

use std::collections::HashMap;

/// A vertex-indexed weighted undirected graph. Not literally a CSR
/// array (a `HashMap` per vertex is simpler and plenty fast at the
/// corpus sizes this partitioner targets), but it gives the same O(1)
/// neighbour-weight lookup a CSR layout buys.
#[derive(Clone)]
pub struct Graph {
    pub n: usize,
    pub sizes: Vec<f64>,
    adj: Vec<HashMap<usize, f64>>,
    pub total_weight: f64,
}

impl Graph {
    pub fn new(n: usize) -> Self {
        Graph {
            n,
            sizes: vec![1.0; n],
            adj: vec![HashMap::new(); n],
            total_weight: 0.0,
        }
    }

    /// Adds (or accumulates into) an undirected edge `u — v` with
    /// weight `w`, stored symmetrically per spec §9.
    pub fn add_edge(&mut self, u: usize, v: usize, w: f64) {
        if u == v || w == 0.0 {
            return;
        }
        *self.adj[u].entry(v).or_insert(0.0) += w;
        *self.adj[v].entry(u).or_insert(0.0) += w;
        self.total_weight += w;
    }

    pub fn neighbors(&self, v: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.adj[v].iter().map(|(&u, &w)| (u, w))
    }

    pub fn weight(&self, u: usize, v: usize) -> f64 {
        self.adj[u].get(&v).copied().unwrap_or(0.0)
    }

    pub fn is_connected(&self, u: usize, v: usize) -> bool {
        self.adj[u].contains_key(&v)
    }

    /// Builds the subgraph induced on `vertices`, renumbered to
    /// `0..vertices.len()`. Returns the subgraph plus the
    /// local-index -> original-index mapping (`vertices` itself,
    /// returned by value for caller convenience).
    pub fn induced_subgraph(&self, vertices: &[usize]) -> Graph {
        let index: HashMap<usize, usize> = vertices.iter().enumerate().map(|(i, &v)| (v, i)).collect();
        let mut sub = Graph::new(vertices.len());
        for (i, &v) in vertices.iter().enumerate() {
            sub.sizes[i] = self.sizes[v];
        }
        for (i, &v) in vertices.iter().enumerate() {
            for (u, w) in self.neighbors(v) {
                if let Some(&j) = index.get(&u) {
                    if j > i {
                        sub.add_edge(i, j, w);
                    }
                }
            }
        }
        sub
    }
}
