//! Heading-level assignment from a font-size histogram, grounded
//! file-for-file on `_annotate_pages` in
//! `examples/original_source/raglib/utils/file_parsers/pdfParser.py`
//! and spec.md §4.B's "full fidelity required" heading-assignment
//! paragraph: a character-count-weighted histogram of font sizes,
//! walked ascending, escalating the heading level down from the
//! default (H4, body text) toward H1 each time the chars accumulated
//! since the last escalation exceed half of the running remainder and
//! the bucket that triggers it is itself more than 0.1% of the
//! document's total character count.

use std::collections::BTreeMap;

use super::layout::Block;

#[derive(Debug, Clone)]
pub enum LeveledBlock {
    Heading { level: u8, text: String },
    Paragraph(String),
    Table(super::layout::Table),
}

/// Assigns each paragraph a heading level (1-3) or leaves it as body
/// text (level 4, rendered with no prefix) by walking the document's
/// font-size histogram ascending. Tables pass through untouched.
pub fn assign_levels(blocks: Vec<Block>) -> Vec<LeveledBlock> {
    let levels = level_by_font_size(&blocks);

    blocks
        .into_iter()
        .map(|block| match block {
            Block::Paragraph(p) => {
                let level = levels.get(&quantize(p.font_size)).copied().unwrap_or(4);
                if level >= 4 {
                    LeveledBlock::Paragraph(p.text)
                } else {
                    LeveledBlock::Heading { level, text: p.text }
                }
            }
            Block::Table(t) => LeveledBlock::Table(t),
        })
        .collect()
}

fn quantize(font_size: f64) -> i64 {
    (font_size * 10.0).round() as i64
}

/// Walks the ascending `(font_size, char_count)` histogram, escalating
/// the heading level one step (minimum 1) whenever the chars
/// accumulated since the last escalation exceed half of the shrinking
/// running remainder and the triggering bucket itself exceeds 0.1% of
/// the document's total character count. Mirrors `_annotate_pages`'s
/// `header_lvl`/`char_count`/`total_chars` walk exactly, including its
/// check-before-accumulate order (a bucket's own chars are folded in
/// only after the escalation check for that bucket has run).
fn level_by_font_size(blocks: &[Block]) -> BTreeMap<i64, u8> {
    let mut char_counts: BTreeMap<i64, i64> = BTreeMap::new();
    let mut total_chars: i64 = 0;
    for block in blocks {
        if let Block::Paragraph(p) = block {
            let chars = p.text.chars().count() as i64;
            total_chars += chars;
            *char_counts.entry(quantize(p.font_size)).or_insert(0) += chars;
        }
    }

    let count_min = (total_chars as f64 * 0.001) as i64;
    let mut header_level: u8 = 4;
    let mut char_count: i64 = 0;
    let mut remaining_total = total_chars;
    let mut levels: BTreeMap<i64, u8> = BTreeMap::new();

    for (size, count) in char_counts {
        if count > count_min && (char_count as f64) > 0.5 * (remaining_total as f64) {
            header_level = header_level.saturating_sub(1).max(1);
            remaining_total -= char_count;
            char_count = 0;
        }
        char_count += count;
        levels.insert(size, header_level);
    }

    levels
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::layout::Paragraph;

    fn para(text: &str, font_size: f64) -> Block {
        Block::Paragraph(Paragraph {
            text: text.to_string(),
            font_size,
            bold: false,
        })
    }

    #[test]
    fn body_text_stays_unprefixed_paragraph() {
        let blocks = vec![para("Plain body text here.", 10.0)];
        let leveled = assign_levels(blocks);
        assert!(matches!(&leveled[0], LeveledBlock::Paragraph(t) if t == "Plain body text here."));
    }

    #[test]
    fn two_font_sizes_can_escalate_at_most_one_level() {
        // Only one ascending-bucket boundary exists with two distinct
        // sizes, so the larger size can escalate H4 -> H3 at most,
        // never reach H1 (see DESIGN.md's note on spec §8 scenario 4).
        let blocks = vec![para("Hello world.", 10.0), para("Title", 24.0)];
        let leveled = assign_levels(blocks);
        assert!(matches!(&leveled[0], LeveledBlock::Paragraph(t) if t == "Hello world."));
        assert!(matches!(&leveled[1], LeveledBlock::Heading { level: 3, text } if text == "Title"));
    }

    #[test]
    fn four_distinct_font_sizes_escalate_through_every_level() {
        // Each bucket below needs >0.1% of the (shrinking) total and
        // its predecessor's chars need to clear half of the running
        // remainder; padding every bucket out with enough repeated
        // body-weight text drives the walk through H4 -> H1.
        let body = "x".repeat(400);
        let h3 = "y".repeat(200);
        let h2 = "z".repeat(100);
        let h1 = "Title";
        let blocks = vec![para(&body, 10.0), para(&h3, 14.0), para(&h2, 18.0), para(h1, 24.0)];
        let leveled = assign_levels(blocks);
        assert!(matches!(&leveled[0], LeveledBlock::Paragraph(_)));
        assert!(matches!(&leveled[1], LeveledBlock::Heading { level: 3, .. }));
        assert!(matches!(&leveled[2], LeveledBlock::Heading { level: 2, .. }));
        assert!(matches!(&leveled[3], LeveledBlock::Heading { level: 1, text } if text == "Title"));
    }

    #[test]
    fn a_bucket_too_small_to_clear_the_0_1_percent_floor_does_not_escalate() {
        let body = "x".repeat(10_000);
        let tiny = "y".repeat(2);
        let blocks = vec![para(&body, 10.0), para(&tiny, 24.0)];
        let leveled = assign_levels(blocks);
        assert!(matches!(&leveled[1], LeveledBlock::Paragraph(t) if t == "yy"));
    }
}
