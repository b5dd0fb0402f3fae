//! Per-chunk NER/RE extraction into the knowledge graph, grounded on
//! `examples/original_source/raglib/graphrag/index/KG_2_ConvertTextsToGraph.py`.

use regex::Regex;
use std::sync::OnceLock;

use crate::error::CoreError;
use crate::graph::GraphStore;
use crate::llm::LlmClient;
use crate::model::{Chunk, Node, Relation};

use super::json_repair::{try_get_relations, RawRelation};

const MAX_ATTEMPTS: u32 = 8;

const SYSTEM_PROMPT: &str = "You extract entities and relations from text. \
Respond only with a JSON array of objects, each with exactly the keys \
\"From\", \"To\" and \"Relation\".";

fn user_prompt(information: &str) -> String {
    format!("Extract all entity relations from the following text:\n\n{information}")
}

fn sanitize_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"[^A-Za-z0-9_\-.@()+=;$!*%:,{}\[\]"]"#).expect("static pattern"))
}

/// Whitespace -> `_`, then strips every character outside the allowed
/// class (spec §4.E).
fn sanitize(field: &str) -> String {
    let underscored = field.replace(char::is_whitespace, "_");
    sanitize_pattern().replace_all(&underscored, "").into_owned()
}

fn sanitized(raw: &RawRelation) -> Option<(String, String, String)> {
    let from = sanitize(&raw.from);
    let to = sanitize(&raw.to);
    let relation = sanitize(&raw.relation);
    if from.is_empty() || to.is_empty() || relation.is_empty() || from == to {
        return None;
    }
    Some((from, to, relation))
}

/// Runs NER/RE extraction for one chunk, retrying the LLM call up to
/// `MAX_ATTEMPTS` times until a non-empty list of relation dicts is
/// produced, then upserts every sanitised relation into `store`.
/// Per spec §4.E, exhausting the attempt budget is not an error —
/// the chunk is simply skipped so the overall run keeps progressing.
pub fn process_chunk(chunk: &Chunk, llm: &dyn LlmClient, store: &dyn GraphStore) -> Result<(), CoreError> {
    let prompt = user_prompt(&chunk.text);

    let mut relations: Option<Vec<RawRelation>> = None;
    for _ in 0..MAX_ATTEMPTS {
        let response = llm.generate(SYSTEM_PROMPT, &prompt, Some("json"))?;
        if let Some(parsed) = try_get_relations(&response) {
            if !parsed.is_empty() {
                relations = Some(parsed);
                break;
            }
        }
    }

    let Some(relations) = relations else {
        return Ok(());
    };

    for raw in &relations {
        let Some((from_label, to_label, relation_label)) = sanitized(raw) else {
            continue;
        };

        let mut from_node = Node::new(from_label.replace('_', " "), "Entity");
        from_node.record_mention(&chunk.file_key);
        let from_id = store.upsert_node(from_node)?;

        let mut to_node = Node::new(to_label.replace('_', " "), "Entity");
        to_node.record_mention(&chunk.file_key);
        let to_id = store.upsert_node(to_node)?;

        let mut relation = Relation {
            from: from_id,
            to: to_id,
            label: relation_label,
            source_ref: Default::default(),
        };
        relation.source_ref.insert(chunk.file_key.clone(), 1);
        relation.source_ref.insert("_total".to_string(), 1);
        store.upsert_relation(relation)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_disallowed_characters_and_spaces() {
        assert_eq!(sanitize("Foo Bar!!"), "Foo_Bar!");
        assert_eq!(sanitize("a/b\\c"), "abc");
    }

    #[test]
    fn sanitized_rejects_self_loops_and_blank_fields() {
        let raw = RawRelation {
            from: "X".to_string(),
            to: "X".to_string(),
            relation: "knows".to_string(),
        };
        assert!(sanitized(&raw).is_none());

        let raw = RawRelation {
            from: "///".to_string(),
            to: "Bob".to_string(),
            relation: "knows".to_string(),
        };
        assert!(sanitized(&raw).is_none());
    }
}
