//! Hierarchical Leiden community detection under the Constant Potts
//! Model, grounded on
//! `examples/original_source/raglib/graphrag/index/G_LeidenAlgorithm.py`.
//! `graph`/`partition`/`rng` are the building blocks; `algorithm` is
//! the flat per-level optimiser; `hierarchy` wraps oversized
//! communities recursively and flattens the result into the
//! community-hierarchy graph.

pub mod algorithm;
pub mod graph;
pub mod hierarchy;
pub mod partition;
pub mod rng;

pub use algorithm::{cpm_objective, default_gamma, leiden_flat};
pub use graph::Graph;
pub use hierarchy::{build_community_graph, hierarchical_leiden, CommunityGraph, HierarchicalResult, LayerCommunity, LayerEdge};
pub use partition::{Community, Partition};
pub use rng::LeidenRng;
