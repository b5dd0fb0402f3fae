//! Partition bookkeeping and the nested-community sum type.
//!
//! `Partition` is the flat working structure `move_nodes`/
//! `refine_partition` mutate during one level of optimisation.
//! `Community` is the typed sum variant spec §9 asks for
//! (`Leaf(vertex_id) | Internal(children)`) used to represent the
//! final hierarchical result, avoiding fragile hash-of-tuple identity
//! across aggregation rounds.

use std::collections::{HashMap, HashSet};

/// Vertex `v`'s community id. Ids are arbitrary (usually a
/// representative vertex index) and need not be contiguous.
#[derive(Clone)]
pub struct Partition {
    pub community_of: Vec<usize>,
}

impl Partition {
    pub fn singleton(n: usize) -> Self {
        Partition {
            community_of: (0..n).collect(),
        }
    }

    pub fn num_communities(&self) -> usize {
        self.community_of.iter().collect::<HashSet<_>>().len()
    }

    pub fn members_by_community(&self) -> HashMap<usize, Vec<usize>> {
        let mut groups: HashMap<usize, Vec<usize>> = HashMap::new();
        for (v, &c) in self.community_of.iter().enumerate() {
            groups.entry(c).or_default().push(v);
        }
        groups
    }
}

/// A node of the nested partition tree: either an original vertex, or
/// an internal community containing further-nested children.
#[derive(Debug, Clone)]
pub enum Community {
    Leaf(usize),
    Internal(Vec<Community>),
}

impl Community {
    pub fn flatten(&self) -> Vec<usize> {
        let mut out = Vec::new();
        self.flatten_into(&mut out);
        out
    }

    fn flatten_into(&self, out: &mut Vec<usize>) {
        match self {
            Community::Leaf(v) => out.push(*v),
            Community::Internal(children) => {
                for child in children {
                    child.flatten_into(out);
                }
            }
        }
    }

    /// `0` for a leaf; `1 + max(child depth)` for an internal node —
    /// matches spec §4.G's "depth returned is 1 + max depth of any
    /// nested child".
    pub fn depth(&self) -> usize {
        match self {
            Community::Leaf(_) => 0,
            Community::Internal(children) => 1 + children.iter().map(Community::depth).max().unwrap_or(0),
        }
    }
}
