//! Top-level entry point: `parse_to_pages` ties the xref loader, font
//! loader, content-stream interpreter, and layout/heading/markdown
//! passes together into the `bytes -> Vec<page markdown>` pipeline
//! spec.md §4.B describes.

use std::collections::HashMap;

use crate::error::CoreError;

use super::content::{self};
use super::fonts::{self, FontInfo};
use super::heading;
use super::layout;
use super::markdown;
use super::object::{resolve, resolve_dict_entry, ObjRef, PdfObject};
use super::xref;

/// Parses raw PDF bytes into an ordered list of per-page Markdown
/// strings. A page whose content stream uses an unrecognised filter
/// fails that page only (spec §4.B's "Failure semantics"); the
/// document itself only fails if it lacks a `%PDF-` header or the
/// `/Root`/`/Pages` tree cannot be resolved at all.
pub fn parse_to_pages(bytes: &[u8]) -> Result<Vec<String>, CoreError> {
    find_header(bytes)?;
    let doc = xref::load(bytes)?;

    let root = doc
        .trailer
        .get("Root")
        .and_then(|v| resolve(&doc.objects, v))
        .and_then(|v| v.as_dict())
        .cloned()
        .or_else(|| find_catalog(&doc.objects))
        .ok_or_else(|| CoreError::parse("pdf", "no /Root catalog found"))?;

    let pages_root = resolve_dict_entry(&doc.objects, &root, "Pages")
        .and_then(|v| v.as_dict())
        .cloned()
        .ok_or_else(|| CoreError::parse("pdf", "no /Pages tree found"))?;

    let mut leaves = Vec::new();
    collect_pages(&doc.objects, &pages_root, &Inherited::default(), &mut leaves, 0);

    let mut pages = Vec::with_capacity(leaves.len());
    for (page_dict, inherited) in &leaves {
        match render_page(&doc.objects, page_dict, inherited) {
            Ok(md) => pages.push(md),
            Err(err) => {
                tracing::warn!(%err, "skipping page with unrecoverable content");
                pages.push(String::new());
            }
        }
    }
    Ok(pages)
}

fn find_header(bytes: &[u8]) -> Result<(), CoreError> {
    let scan_window = &bytes[..bytes.len().min(1024)];
    if scan_window.windows(5).any(|w| w == b"%PDF-") {
        Ok(())
    } else {
        Err(CoreError::Input("missing %PDF- header".into()))
    }
}

/// Fallback root-finder for files whose trailer is missing or damaged:
/// scan every recovered object for a `/Type /Catalog` dict.
fn find_catalog(objects: &HashMap<ObjRef, PdfObject>) -> Option<HashMap<String, PdfObject>> {
    objects.values().find_map(|obj| {
        let dict = obj.as_dict()?;
        (dict.get("Type").and_then(|v| v.as_name()) == Some("Catalog")).then(|| dict.clone())
    })
}

#[derive(Clone, Default)]
struct Inherited {
    resources: Option<HashMap<String, PdfObject>>,
    media_box: Option<[f64; 4]>,
}

fn collect_pages<'a>(
    objects: &HashMap<ObjRef, PdfObject>,
    node: &HashMap<String, PdfObject>,
    parent: &Inherited,
    out: &mut Vec<(HashMap<String, PdfObject>, Inherited)>,
    depth: u32,
) {
    if depth > 64 {
        return; // malformed cyclic page tree
    }
    let mut inherited = parent.clone();
    if let Some(res) = resolve_dict_entry(objects, node, "Resources").and_then(|v| v.as_dict()) {
        inherited.resources = Some(res.clone());
    }
    if let Some(mb) = resolve_dict_entry(objects, node, "MediaBox").and_then(|v| v.as_array()) {
        if mb.len() == 4 {
            let vals: Vec<f64> = mb.iter().filter_map(|o| o.as_f64()).collect();
            if vals.len() == 4 {
                inherited.media_box = Some([vals[0], vals[1], vals[2], vals[3]]);
            }
        }
    }

    let node_type = node.get("Type").and_then(|v| v.as_name());
    if node_type == Some("Page") || (node_type.is_none() && !node.contains_key("Kids")) {
        out.push((node.clone(), inherited));
        return;
    }

    if let Some(kids) = resolve_dict_entry(objects, node, "Kids").and_then(|v| v.as_array()) {
        for kid in kids {
            if let Some(kid_dict) = resolve(objects, kid).and_then(|v| v.as_dict()) {
                collect_pages(objects, kid_dict, &inherited, out, depth + 1);
            }
        }
    }
}

fn render_page(
    objects: &HashMap<ObjRef, PdfObject>,
    page: &HashMap<String, PdfObject>,
    inherited: &Inherited,
) -> Result<String, CoreError> {
    let resources = resolve_dict_entry(objects, page, "Resources")
        .and_then(|v| v.as_dict())
        .cloned()
        .or_else(|| inherited.resources.clone())
        .unwrap_or_default();

    let fonts = load_page_fonts(objects, &resources);

    let content_bytes = read_content_bytes(objects, page)?;
    let interpreted = content::interpret(&content_bytes, &fonts, objects);
    let _media_box = inherited.media_box.unwrap_or([0.0, 0.0, 612.0, 792.0]);
    let blocks = layout::build_blocks(&interpreted);
    let leveled = heading::assign_levels(blocks);
    Ok(markdown::render(&leveled))
}

fn load_page_fonts(
    objects: &HashMap<ObjRef, PdfObject>,
    resources: &HashMap<String, PdfObject>,
) -> HashMap<String, FontInfo> {
    let mut out = HashMap::new();
    if let Some(font_dict) = resolve_dict_entry(objects, resources, "Font").and_then(|v| v.as_dict()) {
        for (name, value) in font_dict {
            if let Some(dict) = resolve(objects, value).and_then(|v| v.as_dict()) {
                out.insert(name.clone(), fonts::load_font(objects, dict));
            }
        }
    }
    out
}

/// Concatenates `/Contents` (a single stream or an array of streams,
/// each joined by whitespace) after running it through the stream
/// filter chain.
fn read_content_bytes(
    objects: &HashMap<ObjRef, PdfObject>,
    page: &HashMap<String, PdfObject>,
) -> Result<Vec<u8>, CoreError> {
    let contents = page
        .get("Contents")
        .and_then(|v| resolve(objects, v))
        .ok_or_else(|| CoreError::parse("pdf page", "missing /Contents"))?;

    let mut streams = Vec::new();
    match contents {
        PdfObject::Stream { .. } => streams.push(contents.clone()),
        PdfObject::Array(items) => {
            for item in items {
                if let Some(obj @ PdfObject::Stream { .. }) = resolve(objects, item) {
                    streams.push(obj.clone());
                }
            }
        }
        _ => {}
    }

    let mut out = Vec::new();
    for stream in streams {
        if let PdfObject::Stream { dict, data } = stream {
            out.extend(super::filters::decode_stream(&dict, &data)?);
            out.push(b'\n');
        }
    }
    Ok(out)
}
