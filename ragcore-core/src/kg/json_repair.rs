//! Tolerant parsing of the KG-extraction LLM response into
//! `{From, To, Relation}` triples, grounded on
//! `examples/original_source/raglib/graphrag/index/KG_convert_to_relations.py`.
//!
//! Strict-first gate per spec §9: try canonical JSON decode, and only
//! fall back to the repair pipeline once. The repair pipeline itself
//! never iterates — each step runs exactly once, in the order the
//! original applies them.

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
pub struct RawRelation {
    #[serde(rename = "From")]
    pub from: String,
    #[serde(rename = "To")]
    pub to: String,
    #[serde(rename = "Relation")]
    pub relation: String,
}

/// Substitutes the handful of non-ASCII characters the original
/// `str.translate` table maps, plus `&` -> `and` (spec §4.E).
fn substitute_characters(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            '&' => "and".to_string(),
            '\u{C4}' => "Ae".to_string(),
            '\u{D6}' => "Oe".to_string(),
            '\u{DC}' => "Ue".to_string(),
            '\u{DF}' => "ss".to_string(),
            '\u{E4}' => "ae".to_string(),
            '\u{E9}' => "e".to_string(),
            '\u{F6}' => "oe".to_string(),
            '\u{FC}' => "ue".to_string(),
            other => other.to_string(),
        })
        .collect()
}

/// Inserts a missing opening quote before `"From":`, `"To":`, or
/// `"Relation":` occurrences that aren't already preceded by one.
fn repair_missing_quotes(text: &str) -> String {
    let mut out = text.to_string();
    for key in ["From\":", "To\":", "Relation\":"] {
        let pattern = Regex::new(&regex::escape(key)).expect("static pattern");
        let mut result = String::with_capacity(out.len());
        let mut last_end = 0;
        for m in pattern.find_iter(&out) {
            let preceded_by_quote = m.start() > 0 && out.as_bytes()[m.start() - 1] == b'"';
            result.push_str(&out[last_end..m.start()]);
            if !preceded_by_quote {
                result.push_str("\",\"");
            }
            result.push_str(&out[m.start()..m.end()]);
            last_end = m.end();
        }
        result.push_str(&out[last_end..]);
        out = result;
    }
    out
}

/// Splits a run of concatenated `{...}` triplets that lost their
/// separating `}, {` during cleanup, by looking for the third-from-
/// each `","` boundary the original indexes with `[2::3]`.
fn split_concatenated_dicts(text: &str) -> String {
    let sep = Regex::new("\",\"").expect("static pattern");
    let boundaries: Vec<usize> = sep.find_iter(text).map(|m| m.end()).skip(2).step_by(3).collect();
    if boundaries.is_empty() {
        return text.to_string();
    }
    let mut parts = Vec::new();
    let mut last = 0;
    for &b in &boundaries {
        parts.push(&text[last..b]);
        last = b;
    }
    parts.push(&text[last..]);
    parts.join("}, {")
}

/// Drops a duplicated key occurrence within a single `{...}` chunk by
/// splicing in a `#` separator at the second occurrence, matching the
/// original's crude de-dup.
fn dedup_keys_within_dict(text: &str) -> String {
    let keys = ["From", "To", "Relation"];
    text.split("}, {")
        .map(|part| {
            let mut locations: Vec<usize> = Vec::new();
            for key in keys {
                let mut start = 0;
                let mut found = Vec::new();
                while let Some(pos) = part[start..].find(key) {
                    found.push(start + pos);
                    start += pos + 1;
                }
                if found.len() > 1 {
                    locations.push(found[1]);
                }
            }
            let duplicated: usize = locations.iter().sum();
            if duplicated > 0 && duplicated < part.len() {
                format!("{}#{}", &part[..duplicated], &part[duplicated..])
            } else {
                part.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("}, {")
}

/// Best-effort extraction of `{...}` bodies when the response isn't
/// valid JSON up front, reassembled as a `[{...}]` array literal.
fn rebuild_as_array(cleaned: &str) -> String {
    let brace_pattern = Regex::new(r"\{([^{}]*)\}").expect("static pattern");
    let joined: String = brace_pattern
        .captures_iter(cleaned)
        .map(|c| c[1].to_string())
        .collect::<Vec<_>>()
        .join("");
    let body = joined.replace(":_", "\": \"").replace(",_", "\", \"");
    let body = format!("{}\"", body);
    let body = body.trim_end_matches("\",").to_string();
    format!("[{{\"{}}}]", body)
}

/// Attempts to interpret `text` as a list of `{From, To, Relation}`
/// relations, trying a direct decode first and falling back to the
/// repair pipeline exactly once on failure. Returns `None` when both
/// attempts fail.
pub fn try_get_relations(text: &str) -> Option<Vec<RawRelation>> {
    let substituted = substitute_characters(text);

    if let Ok(value) = serde_json::from_str::<Value>(&substituted) {
        if let Some(relations) = value_to_relations(&value) {
            return Some(relations);
        }
    }

    let rebuilt = rebuild_as_array(&substituted);
    let rebuilt = rebuilt.replace("\"\"", "\",\"");
    let rebuilt = repair_missing_quotes(&rebuilt);
    let split = split_concatenated_dicts(&rebuilt);
    let deduped = dedup_keys_within_dict(&split);

    serde_json::from_str::<Value>(&deduped).ok().and_then(|v| value_to_relations(&v))
}

fn value_to_relations(value: &Value) -> Option<Vec<RawRelation>> {
    let array = value.as_array()?;
    let mut out = Vec::with_capacity(array.len());
    for item in array {
        if let Value::Object(_) = item {
            if let Ok(rel) = serde_json::from_value::<RawRelation>(item.clone()) {
                out.push(rel);
            }
        }
    }
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_json_directly() {
        let input = r#"[{"From": "Alice", "To": "Bob", "Relation": "knows"}]"#;
        let relations = try_get_relations(input).expect("should parse");
        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].from, "Alice");
        assert_eq!(relations[0].to, "Bob");
        assert_eq!(relations[0].relation, "knows");
    }

    #[test]
    fn substitutes_ampersand_before_decoding() {
        let input = r#"[{"From": "Fish & Chips", "To": "Pub", "Relation": "sold_at"}]"#;
        let relations = try_get_relations(input).expect("should parse");
        assert_eq!(relations[0].from, "Fish and Chips");
    }

    #[test]
    fn gives_up_on_unsalvageable_garbage() {
        assert!(try_get_relations("not json at all, no braces").is_none());
    }
}
