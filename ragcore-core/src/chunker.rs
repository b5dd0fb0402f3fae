//! Markdown-page chunker (component C): groups per-page Markdown into
//! bounded-size chunks carrying heading context, grounded on the
//! `(h1,h2,h3,body)` state machine spec.md §4.C describes and on the
//! teacher's `group_elements_into_chunks` linear-scan-with-flush shape
//! in `graphs/builder.rs`.

use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_CHUNK_SIZE: usize = 4096;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkOutput {
    pub heading_path: Vec<String>,
    pub body: String,
    pub pages: Vec<u32>,
    /// `"Page (n)"` or `"Pages (a-b)"`.
    pub page_hint: String,
    /// The body re-prefixed with its heading lines, ready to embed or
    /// feed to the KG builder.
    pub content: String,
}

#[derive(Default, Clone)]
struct HeadingState {
    h1: Option<String>,
    h2: Option<String>,
    h3: Option<String>,
}

impl HeadingState {
    fn path(&self) -> Vec<String> {
        [&self.h1, &self.h2, &self.h3]
            .into_iter()
            .flatten()
            .cloned()
            .collect()
    }
}

/// Splits a list of per-page Markdown strings into chunks bounded by
/// `max_chunk_size` characters of body text, flushing whenever a
/// heading transition occurs or the body would overflow.
pub fn chunk_pages(pages: &[String], max_chunk_size: usize) -> Vec<ChunkOutput> {
    let max_chunk_size = if max_chunk_size == 0 { DEFAULT_MAX_CHUNK_SIZE } else { max_chunk_size };
    let mut out = Vec::new();
    let mut heading = HeadingState::default();
    let mut body = String::new();
    let mut pages_in_chunk: Vec<u32> = Vec::new();
    let mut chunk_heading = heading.clone();

    for (page_index, page) in pages.iter().enumerate() {
        let page_no = page_index as u32 + 1;
        for line in page.lines() {
            let trimmed = line.trim_end();
            if let Some(level) = heading_level(trimmed) {
                let text = trimmed.trim_start_matches('#').trim().to_string();
                let is_transition = match level {
                    1 => heading.h1.as_deref() != Some(text.as_str()),
                    2 => heading.h2.as_deref() != Some(text.as_str()),
                    _ => heading.h3.as_deref() != Some(text.as_str()),
                };
                if is_transition && !body.trim().is_empty() {
                    flush(&mut out, &chunk_heading, &mut body, &mut pages_in_chunk);
                }
                match level {
                    1 => {
                        heading.h1 = Some(text);
                        heading.h2 = None;
                        heading.h3 = None;
                    }
                    2 => {
                        heading.h2 = Some(text);
                        heading.h3 = None;
                    }
                    _ => heading.h3 = Some(text),
                }
                chunk_heading = heading.clone();
                continue;
            }
            if trimmed.is_empty() {
                continue;
            }
            if body.len() + trimmed.len() + 1 > max_chunk_size && !body.trim().is_empty() {
                flush(&mut out, &chunk_heading, &mut body, &mut pages_in_chunk);
                chunk_heading = heading.clone();
            }
            if !body.is_empty() {
                body.push('\n');
            }
            body.push_str(trimmed);
            if !pages_in_chunk.last().is_some_and(|&p| p == page_no) {
                pages_in_chunk.push(page_no);
            }
        }
    }
    flush(&mut out, &chunk_heading, &mut body, &mut pages_in_chunk);
    out
}

fn heading_level(line: &str) -> Option<u8> {
    let hashes = line.chars().take_while(|&c| c == '#').count();
    if hashes == 0 || hashes > 4 {
        return None;
    }
    if line.as_bytes().get(hashes) != Some(&b' ') {
        return None;
    }
    Some((hashes as u8).min(3))
}

fn flush(out: &mut Vec<ChunkOutput>, heading: &HeadingState, body: &mut String, pages: &mut Vec<u32>) {
    if body.trim().is_empty() {
        body.clear();
        return;
    }
    let heading_path = heading.path();
    let page_hint = page_hint_string(pages);
    let mut content = String::new();
    if let Some(h1) = &heading.h1 {
        content.push_str("# ");
        content.push_str(h1);
        content.push('\n');
    }
    if let Some(h2) = &heading.h2 {
        content.push_str("## ");
        content.push_str(h2);
        content.push('\n');
    }
    if let Some(h3) = &heading.h3 {
        content.push_str("### ");
        content.push_str(h3);
        content.push('\n');
    }
    content.push('\n');
    content.push_str(body.trim());

    out.push(ChunkOutput {
        heading_path,
        body: body.trim().to_string(),
        pages: pages.clone(),
        page_hint,
        content,
    });
    body.clear();
    pages.clear();
}

fn page_hint_string(pages: &[u32]) -> String {
    match (pages.first(), pages.last()) {
        (Some(&a), Some(&b)) if a == b => format!("Page ({a})"),
        (Some(&a), Some(&b)) => format!("Pages ({a}-{b})"),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flushes_on_heading_transition() {
        let pages = vec!["# Intro\n\nHello world.\n\n# Methods\n\nSome body text.".to_string()];
        let chunks = chunk_pages(&pages, DEFAULT_MAX_CHUNK_SIZE);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].heading_path, vec!["Intro".to_string()]);
        assert_eq!(chunks[1].heading_path, vec!["Methods".to_string()]);
    }

    #[test]
    fn respects_max_chunk_size() {
        let body = "word ".repeat(2000);
        let pages = vec![format!("# Big\n\n{body}")];
        let chunks = chunk_pages(&pages, 4096);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.body.len() <= 4096);
        }
    }

    #[test]
    fn carries_page_hint_across_multiple_pages() {
        let pages = vec!["# Title\n\nPage one body.".to_string(), "Page two body, same section.".to_string()];
        let chunks = chunk_pages(&pages, DEFAULT_MAX_CHUNK_SIZE);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].page_hint, "Pages (1-2)");
    }
}
