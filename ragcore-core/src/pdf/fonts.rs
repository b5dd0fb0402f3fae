//! Font decoding: simple-font built-in encodings (WinAnsi/MacRoman)
//! with `/Differences` overlays, and Type0/CID fonts via `/ToUnicode`
//! CMaps. Only what's needed to turn character codes in a content
//! stream into readable text — glyph outlines are out of scope.

use std::collections::HashMap;

use super::lexer::{Lexer, Token};
use super::object::{resolve, resolve_dict_entry, ObjRef, PdfObject};

#[derive(Debug, Clone)]
pub struct FontInfo {
    pub is_cid: bool,
    /// code -> Unicode string, built from the base encoding plus any
    /// `/Differences` or `/ToUnicode` CMap override.
    pub code_to_unicode: HashMap<u32, String>,
    pub widths: HashMap<u32, f64>,
    pub default_width: f64,
    pub is_bold: bool,
    /// Number of bytes per character code: 1 for simple fonts, 2 for
    /// most Type0/CID fonts (the common Identity-H/V case).
    pub bytes_per_code: u8,
}

impl Default for FontInfo {
    fn default() -> Self {
        FontInfo {
            is_cid: false,
            code_to_unicode: winansi_table(),
            widths: HashMap::new(),
            default_width: 500.0,
            is_bold: false,
            bytes_per_code: 1,
        }
    }
}

pub fn load_font(objects: &HashMap<ObjRef, PdfObject>, dict: &HashMap<String, PdfObject>) -> FontInfo {
    let subtype = dict.get("Subtype").and_then(|v| v.as_name()).unwrap_or("");
    if subtype == "Type0" {
        return load_type0_font(objects, dict);
    }
    load_simple_font(objects, dict)
}

fn load_simple_font(objects: &HashMap<ObjRef, PdfObject>, dict: &HashMap<String, PdfObject>) -> FontInfo {
    let mut info = FontInfo::default();

    let base_font = dict.get("BaseFont").and_then(|v| v.as_name()).unwrap_or("");
    info.is_bold = base_font.to_ascii_lowercase().contains("bold");

    if let Some(PdfObject::Name(name)) = resolve_dict_entry(objects, dict, "Encoding") {
        if name == "MacRomanEncoding" {
            info.code_to_unicode = macroman_table();
        }
    }
    if let Some(PdfObject::Dict(enc_dict)) = resolve_dict_entry(objects, dict, "Encoding") {
        if let Some(PdfObject::Name(base)) = enc_dict.get("BaseEncoding") {
            if base == "MacRomanEncoding" {
                info.code_to_unicode = macroman_table();
            }
        }
        if let Some(PdfObject::Array(diffs)) = resolve_dict_entry(objects, enc_dict, "Differences") {
            apply_differences(&mut info.code_to_unicode, diffs);
        }
    }

    if let Some(PdfObject::Stream { dict: tu_dict, data }) = resolve_dict_entry(objects, dict, "ToUnicode") {
        let decoded = super::filters::decode_stream(tu_dict, data).unwrap_or_default();
        parse_tounicode_cmap(&decoded, &mut info.code_to_unicode);
    }

    let first_char = resolve_dict_entry(objects, dict, "FirstChar").and_then(|v| v.as_int()).unwrap_or(0);
    if let Some(PdfObject::Array(widths)) = resolve_dict_entry(objects, dict, "Widths") {
        for (i, w) in widths.iter().enumerate() {
            if let Some(w) = resolve(objects, w).and_then(|v| v.as_f64()) {
                info.widths.insert((first_char as i64 + i as i64).max(0) as u32, w);
            }
        }
    }
    info
}

fn load_type0_font(objects: &HashMap<ObjRef, PdfObject>, dict: &HashMap<String, PdfObject>) -> FontInfo {
    let mut info = FontInfo {
        is_cid: true,
        bytes_per_code: 2,
        code_to_unicode: HashMap::new(),
        ..FontInfo::default()
    };

    if let Some(PdfObject::Stream { dict: tu_dict, data }) = resolve_dict_entry(objects, dict, "ToUnicode") {
        let decoded = super::filters::decode_stream(tu_dict, data).unwrap_or_default();
        parse_tounicode_cmap(&decoded, &mut info.code_to_unicode);
    }

    if let Some(descendants) = resolve_dict_entry(objects, dict, "DescendantFonts").and_then(|v| v.as_array()) {
        if let Some(desc) = descendants.first().and_then(|v| resolve(objects, v)).and_then(|v| v.as_dict()) {
            info.default_width = resolve_dict_entry(objects, desc, "DW").and_then(|v| v.as_f64()).unwrap_or(1000.0);
            if let Some(w_array) = resolve_dict_entry(objects, desc, "W").and_then(|v| v.as_array()) {
                parse_cid_widths(objects, w_array, &mut info.widths);
            }
        }
    }

    let base_font = dict.get("BaseFont").and_then(|v| v.as_name()).unwrap_or("");
    info.is_bold = base_font.to_ascii_lowercase().contains("bold");
    info
}

/// `/W` arrays alternate between `c [w1 w2 ...]` runs and
/// `c_first c_last w` ranges.
fn parse_cid_widths(objects: &HashMap<ObjRef, PdfObject>, items: &[PdfObject], out: &mut HashMap<u32, f64>) {
    let mut i = 0;
    while i < items.len() {
        let Some(first) = resolve(objects, &items[i]).and_then(|v| v.as_int()) else {
            break;
        };
        i += 1;
        if i >= items.len() {
            break;
        }
        match resolve(objects, &items[i]) {
            Some(PdfObject::Array(widths)) => {
                for (j, w) in widths.iter().enumerate() {
                    if let Some(w) = resolve(objects, w).and_then(|v| v.as_f64()) {
                        out.insert((first + j as i64).max(0) as u32, w);
                    }
                }
                i += 1;
            }
            Some(obj) => {
                let last = obj.as_int().unwrap_or(first);
                i += 1;
                if i < items.len() {
                    if let Some(w) = resolve(objects, &items[i]).and_then(|v| v.as_f64()) {
                        for c in first..=last {
                            out.insert(c.max(0) as u32, w);
                        }
                    }
                    i += 1;
                }
            }
            None => break,
        }
    }
}

fn apply_differences(table: &mut HashMap<u32, String>, diffs: &[PdfObject]) {
    let mut code = 0u32;
    for item in diffs {
        match item {
            PdfObject::Int(n) => code = *n as u32,
            PdfObject::Name(name) => {
                if let Some(ch) = glyph_name_to_unicode(name) {
                    table.insert(code, ch);
                }
                code += 1;
            }
            _ => {}
        }
    }
}

fn glyph_name_to_unicode(name: &str) -> Option<String> {
    if let Some(hex) = name.strip_prefix("uni") {
        if let Ok(code) = u32::from_str_radix(hex, 16) {
            return char::from_u32(code).map(String::from);
        }
    }
    ADOBE_GLYPH_NAMES
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, ch)| ch.to_string())
        .or_else(|| (name.chars().count() == 1).then(|| name.to_string()))
}

const ADOBE_GLYPH_NAMES: &[(&str, char)] = &[
    ("space", ' '),
    ("quoteright", '\''),
    ("quoteleft", '\''),
    ("bullet", '\u{2022}'),
    ("endash", '\u{2013}'),
    ("emdash", '\u{2014}'),
    ("quotedblleft", '\u{201C}'),
    ("quotedblright", '\u{201D}'),
    ("fi", '\u{FB01}'),
    ("fl", '\u{FB02}'),
];

/// Parses a `/ToUnicode` CMap's `begincodespacerange`/`beginbfchar`/
/// `beginbfrange` sections, supporting both the literal-array and
/// numeric-range `beginbfrange` forms.
fn parse_tounicode_cmap(data: &[u8], out: &mut HashMap<u32, String>) {
    let mut lexer = Lexer::at(data, 0);
    loop {
        match lexer.next_token() {
            Token::Keyword(kw) if kw == "beginbfchar" => {
                loop {
                    let src = match lexer.next_token() {
                        Token::HexString(bytes) => bytes_to_code(&bytes),
                        Token::Keyword(kw) if kw == "endbfchar" => break,
                        Token::Eof => return,
                        _ => continue,
                    };
                    match lexer.next_token() {
                        Token::HexString(bytes) => {
                            out.insert(src, hex_to_unicode(&bytes));
                        }
                        Token::Keyword(kw) if kw == "endbfchar" => break,
                        _ => {}
                    }
                }
            }
            Token::Keyword(kw) if kw == "beginbfrange" => {
                loop {
                    let lo = match lexer.next_token() {
                        Token::HexString(bytes) => bytes_to_code(&bytes),
                        Token::Keyword(kw) if kw == "endbfrange" => break,
                        Token::Eof => return,
                        _ => continue,
                    };
                    let hi = match lexer.next_token() {
                        Token::HexString(bytes) => bytes_to_code(&bytes),
                        _ => continue,
                    };
                    match lexer.next_token() {
                        Token::HexString(bytes) => {
                            let base = bytes_to_code(&bytes);
                            for (offset, code) in (lo..=hi).enumerate() {
                                if let Some(ch) = char::from_u32(base + offset as u32) {
                                    out.insert(code, ch.to_string());
                                }
                            }
                        }
                        Token::ArrayStart => {
                            let mut code = lo;
                            loop {
                                match lexer.next_token() {
                                    Token::HexString(bytes) => {
                                        out.insert(code, hex_to_unicode(&bytes));
                                        code += 1;
                                    }
                                    Token::ArrayEnd | Token::Eof => break,
                                    _ => {}
                                }
                            }
                        }
                        _ => {}
                    }
                }
            }
            Token::Eof => break,
            _ => {}
        }
    }
}

fn bytes_to_code(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |acc, b| (acc << 8) | *b as u32)
}

fn hex_to_unicode(bytes: &[u8]) -> String {
    bytes
        .chunks(2)
        .filter_map(|pair| {
            let code = bytes_to_code(pair);
            char::from_u32(code)
        })
        .collect()
}

fn winansi_table() -> HashMap<u32, String> {
    (0x20u32..0x7F).map(|c| (c, (c as u8 as char).to_string())).collect()
}

fn macroman_table() -> HashMap<u32, String> {
    // Identical to WinAnsi in the printable-ASCII range this decoder
    // relies on; the high range differs but is rarely load-bearing for
    // body text extraction.
    winansi_table()
}
