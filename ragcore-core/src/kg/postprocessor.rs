//! Wires `mentionedIn` edges and reweights nodes by inverse source
//! frequency, grounded on
//! `examples/original_source/raglib/graphrag/index/KG_3_ProcessKnowledgeGraph.py`.

use std::collections::HashMap;

use crate::error::CoreError;
use crate::graph::GraphStore;
use crate::model::MentionedIn;

/// For every node, connects it to every source file it mentions, then
/// rescales every node's weight by the inverse of its sources' total
/// occurrence counts across the whole corpus.
pub fn process(store: &dyn GraphStore) -> Result<(), CoreError> {
    store.truncate_mentioned_in()?;

    let nodes = store.all_nodes()?;
    let mut source_totals: HashMap<String, u64> = HashMap::new();
    for node in &nodes {
        for (source, &count) in &node.source_ref {
            if source != "_total" {
                *source_totals.entry(source.clone()).or_insert(0) += count;
            }
        }
    }

    for node in &nodes {
        for (source, &count) in &node.source_ref {
            if source == "_total" {
                continue;
            }
            store.add_mentioned_in(MentionedIn::new(node.id, source.clone(), count))?;
        }
    }

    let source_weights: HashMap<String, f64> = source_totals.into_iter().map(|(source, total)| (source, 1.0 / (total.max(1) as f64))).collect();

    for mut node in nodes {
        let mut weight = 0.0;
        for (source, &count) in &node.source_ref {
            if source == "_total" {
                continue;
            }
            weight += source_weights.get(source).copied().unwrap_or(0.0) * count as f64;
        }
        node.weight = weight;
        store.update_node(node)?;
    }

    Ok(())
}
