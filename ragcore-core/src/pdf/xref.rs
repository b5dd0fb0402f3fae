//! Cross-reference table/stream parsing: classic tables, xref streams
//! (with type-2 compressed-object entries), `/Prev` chains, and the
//! scan-back-from-EOF fallback for files with a damaged `startxref`.

use std::collections::HashMap;

use crate::error::CoreError;

use super::filters::decode_stream;
use super::lexer::{Lexer, Token};
use super::object::{ObjRef, ObjectParser, PdfObject};

pub struct LoadedDocument {
    pub objects: HashMap<ObjRef, PdfObject>,
    pub trailer: HashMap<String, PdfObject>,
}

pub fn load(data: &[u8]) -> Result<LoadedDocument, CoreError> {
    let mut objects = HashMap::new();
    let mut trailer = HashMap::new();
    let mut visited_offsets = std::collections::HashSet::new();
    let mut pending: Vec<(ObjRef, u32, u32)> = Vec::new();

    let start = match find_startxref(data) {
        Some(offset) => offset,
        None => {
            scan_all_objects(data, &mut objects);
            return Ok(LoadedDocument { objects, trailer });
        }
    };

    let mut next = Some(start);
    while let Some(offset) = next {
        if !visited_offsets.insert(offset) || offset >= data.len() {
            break;
        }
        match load_xref_section(data, offset, &mut objects) {
            Ok(section) => {
                for (k, v) in section.trailer {
                    trailer.entry(k).or_insert(v);
                }
                pending.extend(section.pending);
                next = section.prev;
            }
            Err(_) => break,
        }
    }

    // Resolve compressed (type-2) entries recorded across every
    // section of the `/Prev` chain: (stream_num, index_in_stream) ->
    // actual object.
    resolve_compressed_entries(data, pending, &mut objects)?;

    if objects.is_empty() {
        scan_all_objects(data, &mut objects);
    }

    Ok(LoadedDocument { objects, trailer })
}

fn find_startxref(data: &[u8]) -> Option<usize> {
    let tail_start = data.len().saturating_sub(2048);
    let tail = &data[tail_start..];
    let marker = b"startxref";
    let pos = tail.windows(marker.len()).rposition(|w| w == marker)?;
    let mut lexer = Lexer::at(data, tail_start + pos + marker.len());
    match lexer.next_token() {
        Token::Int(n) if n >= 0 => Some(n as usize),
        _ => None,
    }
}

struct Section {
    trailer: HashMap<String, PdfObject>,
    prev: Option<usize>,
    /// Compressed (type-2) and deferred-direct entries recorded while
    /// parsing this one xref-stream section: `(objref, stream_num or
    /// u32::MAX, index_in_stream or byte_offset)`. Empty for a classic
    /// table section.
    pending: Vec<(ObjRef, u32, u32)>,
}

fn load_xref_section(
    data: &[u8],
    offset: usize,
    objects: &mut HashMap<ObjRef, PdfObject>,
) -> Result<Section, CoreError> {
    let mut lexer = Lexer::at(data, offset);
    let save = lexer.pos();
    match lexer.next_token() {
        Token::Keyword(kw) if kw == "xref" => load_classic_table(data, lexer.pos(), objects),
        _ => {
            let mut lexer = Lexer::at(data, save);
            // `num gen obj` header in front of an xref stream object.
            let _ = lexer.next_token(); // num
            let _ = lexer.next_token(); // gen
            if let Token::Keyword(kw) = lexer.next_token() {
                if kw != "obj" {
                    return Err(CoreError::parse("xref", "expected obj header"));
                }
            }
            let mut parser = ObjectParser::new(data, lexer.pos());
            let obj = parser
                .parse_indirect_body()
                .ok_or_else(|| CoreError::parse("xref", "malformed xref stream object"))?;
            load_xref_stream(obj)
        }
    }
}

fn load_classic_table(
    data: &[u8],
    mut pos: usize,
    objects: &mut HashMap<ObjRef, PdfObject>,
) -> Result<Section, CoreError> {
    loop {
        let mut lexer = Lexer::at(data, pos);
        let save = lexer.pos();
        let first = lexer.next_token();
        let Token::Int(start_num) = first else {
            pos = save;
            break;
        };
        let Token::Int(count) = lexer.next_token() else {
            return Err(CoreError::parse("xref", "malformed subsection header"));
        };
        pos = lexer.pos();
        for i in 0..count {
            let mut entry_lexer = Lexer::at(data, pos);
            let offset_tok = entry_lexer.next_token();
            let gen_tok = entry_lexer.next_token();
            let kind_tok = entry_lexer.next_token();
            pos = entry_lexer.pos();
            if let (Token::Int(off), Token::Int(gen), Token::Keyword(kind)) = (offset_tok, gen_tok, kind_tok) {
                if kind == "n" {
                    let num = (start_num + i) as u32;
                    let oref = ObjRef { num, gen: gen as u16 };
                    objects.entry(oref).or_insert_with(|| parse_object_at(data, off as usize));
                }
            }
        }
    }

    let mut lexer = Lexer::at(data, pos);
    match lexer.next_token() {
        Token::Keyword(kw) if kw == "trailer" => {
            let mut parser = ObjectParser::new(data, lexer.pos());
            let trailer = parser.parse_value().and_then(|o| match o {
                PdfObject::Dict(d) => Some(d),
                _ => None,
            });
            let trailer = trailer.unwrap_or_default();
            let prev = trailer.get("Prev").and_then(|v| v.as_int()).map(|n| n as usize);
            Ok(Section { trailer, prev, pending: Vec::new() })
        }
        _ => Ok(Section {
            trailer: HashMap::new(),
            prev: None,
            pending: Vec::new(),
        }),
    }
}

fn load_xref_stream(obj: PdfObject) -> Result<Section, CoreError> {
    let PdfObject::Stream { dict, data: raw } = obj else {
        return Err(CoreError::parse("xref", "xref entry is not a stream"));
    };
    let decoded = decode_stream(&dict, &raw)?;
    let widths: Vec<usize> = dict
        .get("W")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|o| o.as_int()).map(|n| n as usize).collect())
        .unwrap_or_else(|| vec![1, 1, 1]);
    let size = dict.get("Size").and_then(|v| v.as_int()).unwrap_or(0);
    let index: Vec<i64> = dict
        .get("Index")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|o| o.as_int()).collect())
        .unwrap_or_else(|| vec![0, size]);

    let (w0, w1, w2) = (widths.first().copied().unwrap_or(1), widths.get(1).copied().unwrap_or(1), widths.get(2).copied().unwrap_or(1));
    let entry_len = w0 + w1 + w2;
    let mut cursor = 0usize;
    let mut pending: Vec<(ObjRef, u32, u32)> = Vec::new();

    for pair in index.chunks(2) {
        let [start, count] = [pair.first().copied().unwrap_or(0), pair.get(1).copied().unwrap_or(0)];
        for i in 0..count {
            if cursor + entry_len > decoded.len() {
                break;
            }
            let entry = &decoded[cursor..cursor + entry_len];
            cursor += entry_len;
            let field = |off: usize, len: usize| -> u64 {
                entry[off..off + len].iter().fold(0u64, |acc, b| (acc << 8) | *b as u64)
            };
            let kind = if w0 == 0 { 1 } else { field(0, w0) };
            let f2 = field(w0, w1);
            let f3 = field(w0 + w1, w2);
            let num = (start + i) as u32;
            match kind {
                1 => {
                    // direct offset entries are resolved lazily by the
                    // caller via `parse_object_at`
                    pending.push((ObjRef { num, gen: f3 as u16 }, u32::MAX, f2 as u32));
                }
                2 => {
                    pending.push((ObjRef { num, gen: 0 }, f2 as u32, f3 as u32));
                }
                _ => {}
            }
        }
    }

    let prev = dict.get("Prev").and_then(|v| v.as_int()).map(|n| n as usize);
    Ok(Section { trailer: dict, prev, pending })
}

fn resolve_compressed_entries(data: &[u8], pending: Vec<(ObjRef, u32, u32)>, objects: &mut HashMap<ObjRef, PdfObject>) -> Result<(), CoreError> {
    let mut stream_cache: HashMap<u32, Vec<(u32, u32)>> = HashMap::new();
    let mut stream_data_cache: HashMap<u32, Vec<u8>> = HashMap::new();

    for (oref, stream_num, index_or_offset) in pending {
        if objects.contains_key(&oref) {
            continue;
        }
        if stream_num == u32::MAX {
            objects.insert(oref, parse_object_at(data, index_or_offset as usize));
            continue;
        }
        if !stream_cache.contains_key(&stream_num) {
            let stream_ref = ObjRef { num: stream_num, gen: 0 };
            if let Some(PdfObject::Stream { dict, data: raw }) = objects.get(&stream_ref) {
                let decoded = decode_stream(dict, raw)?;
                let n = dict.get("N").and_then(|v| v.as_int()).unwrap_or(0);
                let first = dict.get("First").and_then(|v| v.as_int()).unwrap_or(0) as usize;
                let mut header_lexer = Lexer::at(&decoded, 0);
                let mut header = Vec::new();
                for _ in 0..n {
                    let (Token::Int(num), Token::Int(off)) = (header_lexer.next_token(), header_lexer.next_token()) else {
                        break;
                    };
                    header.push((num as u32, off as u32));
                }
                stream_cache.insert(stream_num, header);
                stream_data_cache.insert(stream_num, decoded[first..].to_vec());
            }
        }
        if let (Some(header), Some(body)) = (stream_cache.get(&stream_num), stream_data_cache.get(&stream_num)) {
            if let Some(&(_, off)) = header.get(index_or_offset as usize) {
                let mut parser = ObjectParser::new(body, off as usize);
                if let Some(value) = parser.parse_value() {
                    objects.insert(oref, value);
                }
            }
        }
    }
    Ok(())
}

fn parse_object_at(data: &[u8], offset: usize) -> PdfObject {
    let mut lexer = Lexer::at(data, offset);
    let _ = lexer.next_token(); // num
    let _ = lexer.next_token(); // gen
    let _ = lexer.next_token(); // "obj"
    let mut parser = ObjectParser::new(data, lexer.pos());
    parser.parse_indirect_body().unwrap_or(PdfObject::Null)
}

/// Fallback for files with no usable xref at all: scan for every
/// `num gen obj` header in the byte stream and parse each in place.
fn scan_all_objects(data: &[u8], objects: &mut HashMap<ObjRef, PdfObject>) {
    let marker = b" obj";
    let mut search_from = 0;
    while let Some(rel) = data[search_from..].windows(marker.len()).position(|w| w == marker) {
        let obj_pos = search_from + rel;
        // Walk backward over "num gen" before " obj".
        let header_start = data[..obj_pos].iter().rposition(|&b| b == b'\n' || b == b'\r').map(|p| p + 1).unwrap_or(0);
        let mut lexer = Lexer::at(data, header_start);
        if let (Token::Int(num), Token::Int(gen)) = (lexer.next_token(), lexer.next_token()) {
            if num >= 0 && gen >= 0 {
                let oref = ObjRef { num: num as u32, gen: gen as u16 };
                let mut body_lexer = Lexer::at(data, obj_pos + marker.len());
                let body_start = body_lexer.pos();
                let mut parser = ObjectParser::new(data, body_start);
                if let Some(value) = parser.parse_indirect_body() {
                    objects.insert(oref, value);
                }
            }
        }
        search_from = obj_pos + marker.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds an unfiltered xref-stream object with `W = [1, 2, 1]`
    /// (kind, 2-byte stream_num, 1-byte index_in_stream) holding a
    /// single type-2 compressed entry for `obj_num` pointing at
    /// `(stream_num, index_in_stream)`.
    fn compressed_entry_stream(obj_num: u32, stream_num: u16, index_in_stream: u8) -> PdfObject {
        let mut dict = HashMap::new();
        dict.insert("W".to_string(), PdfObject::Array(vec![PdfObject::Int(1), PdfObject::Int(2), PdfObject::Int(1)]));
        dict.insert("Index".to_string(), PdfObject::Array(vec![PdfObject::Int(obj_num as i64), PdfObject::Int(1)]));
        dict.insert("Size".to_string(), PdfObject::Int(obj_num as i64 + 1));
        let entry = vec![2u8, (stream_num >> 8) as u8, (stream_num & 0xff) as u8, index_in_stream];
        PdfObject::Stream { dict, data: entry }
    }

    #[test]
    fn each_xref_stream_section_reports_its_own_pending_entries() {
        let section = load_xref_stream(compressed_entry_stream(0, 10, 0)).unwrap();
        assert_eq!(section.pending, vec![(ObjRef { num: 0, gen: 0 }, 10, 0)]);
        assert!(section.prev.is_none());
    }

    /// Two `/Prev`-chain sections, each contributing one compressed
    /// entry: both must still be present after accumulating them the
    /// way `load` does, rather than the later section's parse wiping
    /// out the earlier section's entries.
    #[test]
    fn pending_entries_from_two_prev_chain_sections_both_survive_accumulation() {
        let section_a = load_xref_stream(compressed_entry_stream(0, 10, 0)).unwrap();
        let section_b = load_xref_stream(compressed_entry_stream(5, 20, 1)).unwrap();

        let mut pending = Vec::new();
        pending.extend(section_a.pending);
        pending.extend(section_b.pending);

        assert_eq!(
            pending,
            vec![(ObjRef { num: 0, gen: 0 }, 10, 0), (ObjRef { num: 5, gen: 0 }, 20, 1)]
        );
    }
}
