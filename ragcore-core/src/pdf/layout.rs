//! Layout inference: ruling-line-based sectioning, paragraph
//! reconstruction via a "lead graph" over line starts, reading order by
//! majority text orientation, and simple grid-based table detection.

use super::content::{ContentResult, RuleSegment, TextRun};

#[derive(Debug, Clone)]
pub struct Line {
    pub runs: Vec<TextRun>,
    pub y: f64,
    pub font_size: f64,
    pub bold: bool,
}

#[derive(Debug, Clone)]
pub struct Paragraph {
    pub text: String,
    pub font_size: f64,
    pub bold: bool,
}

#[derive(Debug, Clone)]
pub struct TableCell {
    pub row: usize,
    pub col: usize,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct Table {
    pub rows: usize,
    pub cols: usize,
    pub cells: Vec<TableCell>,
}

#[derive(Debug, Clone)]
pub enum Block {
    Paragraph(Paragraph),
    Table(Table),
}

/// Groups raw text runs into lines (runs sharing a y-coordinate band),
/// reorders by the dominant orientation, then joins lines into
/// paragraphs and detects ruling-line tables.
pub fn build_blocks(content: &ContentResult) -> Vec<Block> {
    let dominant_rotation = majority_rotation(&content.runs);
    let mut runs: Vec<&TextRun> = content.runs.iter().filter(|r| r.rotation == dominant_rotation).collect();
    runs.sort_by(|a, b| b.y.partial_cmp(&a.y).unwrap_or(std::cmp::Ordering::Equal).then(a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal)));

    let lines = group_into_lines(&runs);
    let tables = detect_tables(&lines, &content.rules);

    let mut blocks = Vec::new();
    let mut paragraph_lines: Vec<&Line> = Vec::new();
    let mut used_line_indices = std::collections::HashSet::new();
    for table in &tables {
        used_line_indices.extend(table.1.iter().copied());
    }

    for (i, line) in lines.iter().enumerate() {
        if used_line_indices.contains(&i) {
            flush_paragraph(&mut paragraph_lines, &mut blocks);
            if let Some(table) = tables.iter().find(|(_, idxs)| idxs.first() == Some(&i)) {
                blocks.push(Block::Table(table.0.clone()));
            }
            continue;
        }
        if let Some(prev) = paragraph_lines.last() {
            if should_start_new_paragraph(prev, line) {
                flush_paragraph(&mut paragraph_lines, &mut blocks);
            }
        }
        paragraph_lines.push(line);
    }
    flush_paragraph(&mut paragraph_lines, &mut blocks);
    blocks
}

fn majority_rotation(runs: &[TextRun]) -> i32 {
    use std::collections::HashMap;
    let mut counts: HashMap<i32, usize> = HashMap::new();
    for run in runs {
        *counts.entry(run.rotation).or_insert(0) += 1;
    }
    counts.into_iter().max_by_key(|(_, c)| *c).map(|(r, _)| r).unwrap_or(0)
}

fn group_into_lines(runs: &[&TextRun]) -> Vec<Line> {
    let mut lines: Vec<Line> = Vec::new();
    for run in runs {
        let band = lines.iter_mut().find(|l| (l.y - run.y).abs() < run.font_size.max(1.0) * 0.4);
        match band {
            Some(line) => {
                line.runs.push((*run).clone());
                line.font_size = line.font_size.max(run.font_size);
                line.bold = line.bold || run.bold;
            }
            None => lines.push(Line {
                runs: vec![(*run).clone()],
                y: run.y,
                font_size: run.font_size,
                bold: run.bold,
            }),
        }
    }
    lines
}

/// The "lead graph": a line starts a new paragraph when its leading
/// indentation jumps relative to the previous line, the font size
/// changes, or the vertical gap is larger than one line height —
/// otherwise it's treated as a wrapped continuation.
fn should_start_new_paragraph(prev: &Line, next: &Line) -> bool {
    let prev_indent = prev.runs.first().map(|r| r.x).unwrap_or(0.0);
    let next_indent = next.runs.first().map(|r| r.x).unwrap_or(0.0);
    let gap = prev.y - next.y;
    (next_indent - prev_indent).abs() > prev.font_size.max(1.0) * 1.5
        || (prev.font_size - next.font_size).abs() > 0.5
        || prev.bold != next.bold
        || gap > prev.font_size.max(1.0) * 1.8
}

fn flush_paragraph(lines: &mut Vec<&Line>, blocks: &mut Vec<Block>) {
    if lines.is_empty() {
        return;
    }
    let mut text = String::new();
    let mut font_size = 0.0f64;
    let mut bold = false;
    for (i, line) in lines.iter().enumerate() {
        let line_text: String = line.runs.iter().map(|r| r.text.as_str()).collect::<Vec<_>>().join(" ");
        if i > 0 && text.ends_with('-') {
            text.pop();
        } else if i > 0 {
            text.push(' ');
        }
        text.push_str(line_text.trim());
        font_size = font_size.max(line.font_size);
        bold = bold || line.bold;
    }
    blocks.push(Block::Paragraph(Paragraph {
        text: text.trim().to_string(),
        font_size,
        bold,
    }));
    lines.clear();
}

/// A coarse table detector: a cluster of ≥2 horizontal ruling lines
/// bracketing ≥2 vertical ruling lines, with text lines falling inside
/// the grid assigned to the nearest row/column.
fn detect_tables(lines: &[Line], rules: &[RuleSegment]) -> Vec<(Table, Vec<usize>)> {
    let h_lines: Vec<&RuleSegment> = rules.iter().filter(|r| r.horizontal).collect();
    let v_lines: Vec<&RuleSegment> = rules.iter().filter(|r| !r.horizontal).collect();
    if h_lines.len() < 2 || v_lines.len() < 2 {
        return Vec::new();
    }

    let mut row_ys: Vec<f64> = h_lines.iter().map(|r| r.y0).collect();
    row_ys.sort_by(|a, b| b.partial_cmp(a).unwrap());
    row_ys.dedup_by(|a, b| (*a - *b).abs() < 1.0);
    let mut col_xs: Vec<f64> = v_lines.iter().map(|r| r.x0).collect();
    col_xs.sort_by(|a, b| a.partial_cmp(b).unwrap());
    col_xs.dedup_by(|a, b| (*a - *b).abs() < 1.0);

    if row_ys.len() < 2 || col_xs.len() < 2 {
        return Vec::new();
    }

    let top = row_ys[0];
    let bottom = row_ys[row_ys.len() - 1];
    let left = col_xs[0];
    let right = col_xs[col_xs.len() - 1];

    let mut cells = Vec::new();
    let mut covered = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        let x = line.runs.first().map(|r| r.x).unwrap_or(0.0);
        if line.y > top || line.y < bottom || x < left || x > right {
            continue;
        }
        let row = row_ys.iter().rposition(|&ry| line.y <= ry).unwrap_or(0);
        let col = col_xs.iter().rposition(|&cx| x >= cx).unwrap_or(0);
        let text = line.runs.iter().map(|r| r.text.as_str()).collect::<Vec<_>>().join(" ");
        cells.push(TableCell { row, col, text });
        covered.push(i);
    }

    if cells.is_empty() {
        return Vec::new();
    }

    vec![(
        Table {
            rows: row_ys.len().saturating_sub(1),
            cols: col_xs.len().saturating_sub(1),
            cells,
        },
        covered,
    )]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(text: &str, x: f64, y: f64, font_size: f64, bold: bool) -> TextRun {
        TextRun {
            text: text.to_string(),
            x,
            y,
            font_size,
            bold,
            rotation: 0,
        }
    }

    #[test]
    fn single_heading_and_paragraph_become_two_blocks() {
        let content = ContentResult {
            runs: vec![
                run("Title", 72.0, 700.0, 24.0, true),
                run("Hello", 72.0, 650.0, 10.0, false),
                run("world.", 90.0, 650.0, 10.0, false),
            ],
            rules: Vec::new(),
        };
        let blocks = build_blocks(&content);
        assert_eq!(blocks.len(), 2);
        match &blocks[0] {
            Block::Paragraph(p) => {
                assert_eq!(p.text, "Title");
                assert!(p.bold);
            }
            _ => panic!("expected a paragraph block for the title line"),
        }
        match &blocks[1] {
            Block::Paragraph(p) => assert_eq!(p.text, "Hello world."),
            _ => panic!("expected a paragraph block for the body line"),
        }
    }

    #[test]
    fn wrapped_continuation_line_merges_into_one_paragraph() {
        let content = ContentResult {
            runs: vec![run("First line", 72.0, 700.0, 10.0, false), run("second line.", 72.0, 688.0, 10.0, false)],
            rules: Vec::new(),
        };
        let blocks = build_blocks(&content);
        assert_eq!(blocks.len(), 1);
        match &blocks[0] {
            Block::Paragraph(p) => assert_eq!(p.text, "First line second line."),
            _ => panic!("expected a single merged paragraph"),
        }
    }

    #[test]
    fn majority_rotation_excludes_sideways_text() {
        let mut sideways = run("ignored", 72.0, 600.0, 10.0, false);
        sideways.rotation = 90;
        let content = ContentResult {
            runs: vec![
                run("Body", 72.0, 700.0, 10.0, false),
                run("text", 90.0, 700.0, 10.0, false),
                sideways,
            ],
            rules: Vec::new(),
        };
        let blocks = build_blocks(&content);
        assert_eq!(blocks.len(), 1);
        match &blocks[0] {
            Block::Paragraph(p) => assert_eq!(p.text, "Body text"),
            _ => panic!("expected only the dominant-orientation paragraph"),
        }
    }
}
