//! Assembles a page's leveled blocks into Markdown text.

use super::heading::LeveledBlock;

pub fn render(blocks: &[LeveledBlock]) -> String {
    let mut out = String::new();
    for block in blocks {
        match block {
            LeveledBlock::Heading { level, text } => {
                if text.trim().is_empty() {
                    continue;
                }
                out.push_str(&"#".repeat((*level).into()));
                out.push(' ');
                out.push_str(text.trim());
                out.push_str("\n\n");
            }
            LeveledBlock::Paragraph(text) => {
                if text.trim().is_empty() {
                    continue;
                }
                out.push_str(text.trim());
                out.push_str("\n\n");
            }
            LeveledBlock::Table(table) => {
                out.push_str(&render_table(table));
                out.push('\n');
            }
        }
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::layout::{Table, TableCell};

    #[test]
    fn heading_and_paragraph_blocks_separate_with_a_blank_line() {
        let blocks = vec![
            LeveledBlock::Heading { level: 1, text: "Title".to_string() },
            LeveledBlock::Paragraph("Body text.".to_string()),
        ];
        assert_eq!(render(&blocks), "# Title\n\nBody text.");
    }

    #[test]
    fn blank_headings_and_paragraphs_are_skipped() {
        let blocks = vec![
            LeveledBlock::Heading { level: 2, text: "   ".to_string() },
            LeveledBlock::Paragraph("".to_string()),
            LeveledBlock::Paragraph("Kept.".to_string()),
        ];
        assert_eq!(render(&blocks), "Kept.");
    }

    #[test]
    fn table_renders_with_a_header_separator_row() {
        let table = Table {
            rows: 2,
            cols: 2,
            cells: vec![
                TableCell { row: 0, col: 0, text: "A".to_string() },
                TableCell { row: 0, col: 1, text: "B".to_string() },
                TableCell { row: 1, col: 0, text: "1".to_string() },
                TableCell { row: 1, col: 1, text: "2".to_string() },
            ],
        };
        let rendered = render(&[LeveledBlock::Table(table)]);
        assert_eq!(rendered, "| A | B |\n| --- | --- |\n| 1 | 2 |");
    }
}

fn render_table(table: &super::layout::Table) -> String {
    let mut grid = vec![vec![String::new(); table.cols.max(1)]; table.rows.max(1)];
    for cell in &table.cells {
        if cell.row < grid.len() && cell.col < grid[cell.row].len() {
            grid[cell.row][cell.col] = cell.text.clone();
        }
    }
    let mut out = String::new();
    for (i, row) in grid.iter().enumerate() {
        out.push_str("| ");
        out.push_str(&row.join(" | "));
        out.push_str(" |\n");
        if i == 0 {
            out.push('|');
            for _ in row {
                out.push_str(" --- |");
            }
            out.push('\n');
        }
    }
    out
}
