//! The PDF object model: the handful of value types every other part
//! of the decoder resolves down to.

use std::collections::HashMap;

use super::lexer::{Lexer, Token};

/// An indirect object reference, `num gen R`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjRef {
    pub num: u32,
    pub gen: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PdfObject {
    Null,
    Bool(bool),
    Int(i64),
    Real(f64),
    /// A literal or hex string, already unescaped/decoded to raw bytes.
    String(Vec<u8>),
    Name(String),
    Array(Vec<PdfObject>),
    Dict(HashMap<String, PdfObject>),
    Stream {
        dict: HashMap<String, PdfObject>,
        data: Vec<u8>,
    },
    Reference(ObjRef),
}

impl PdfObject {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            PdfObject::Int(n) => Some(*n),
            PdfObject::Real(r) => Some(*r as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PdfObject::Int(n) => Some(*n as f64),
            PdfObject::Real(r) => Some(*r),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            PdfObject::Name(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[PdfObject]> {
        match self {
            PdfObject::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&HashMap<String, PdfObject>> {
        match self {
            PdfObject::Dict(d) => Some(d),
            PdfObject::Stream { dict, .. } => Some(dict),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<ObjRef> {
        match self {
            PdfObject::Reference(r) => Some(*r),
            _ => None,
        }
    }
}

/// Resolves a chain of indirect references to a concrete object.
/// `depth` guards against reference cycles in malformed files.
pub fn resolve<'a>(
    objects: &'a HashMap<ObjRef, PdfObject>,
    obj: &'a PdfObject,
) -> Option<&'a PdfObject> {
    let mut current = obj;
    for _ in 0..32 {
        match current {
            PdfObject::Reference(r) => match objects.get(r) {
                Some(next) => current = next,
                None => return None,
            },
            other => return Some(other),
        }
    }
    None
}

pub fn resolve_dict_entry<'a>(
    objects: &'a HashMap<ObjRef, PdfObject>,
    dict: &'a HashMap<String, PdfObject>,
    key: &str,
) -> Option<&'a PdfObject> {
    dict.get(key).and_then(|v| resolve(objects, v))
}

/// Parses one PDF object starting at `lexer`'s current position,
/// using a one-token lookahead to recognise `num gen R` references and
/// `num gen obj ... endobj ... stream ... endstream` wrappers.
pub struct ObjectParser<'a> {
    lexer: Lexer<'a>,
    data: &'a [u8],
}

impl<'a> ObjectParser<'a> {
    pub fn new(data: &'a [u8], pos: usize) -> Self {
        ObjectParser {
            lexer: Lexer::at(data, pos),
            data,
        }
    }

    pub fn pos(&self) -> usize {
        self.lexer.pos()
    }

    /// Parses the body of an indirect object (after the `num gen obj`
    /// header has already been consumed by the caller), including a
    /// trailing stream if a `/Length`-bearing dict is followed by the
    /// `stream` keyword.
    pub fn parse_indirect_body(&mut self) -> Option<PdfObject> {
        let value = self.parse_value()?;
        if let PdfObject::Dict(dict) = &value {
            let save = self.lexer.pos();
            if let Token::Keyword(kw) = self.lexer.next_token() {
                if kw == "stream" {
                    return Some(self.read_stream(dict.clone()));
                }
            }
            self.lexer = Lexer::at(self.data, save);
        }
        Some(value)
    }

    fn read_stream(&mut self, dict: HashMap<String, PdfObject>) -> PdfObject {
        let mut pos = self.lexer.pos();
        // `stream` is followed by CRLF or LF, never a bare CR.
        if self.data.get(pos) == Some(&b'\r') {
            pos += 1;
        }
        if self.data.get(pos) == Some(&b'\n') {
            pos += 1;
        }
        let length = dict.get("Length").and_then(|v| v.as_int()).unwrap_or(0).max(0) as usize;
        let end = (pos + length).min(self.data.len());
        let data = self.data[pos..end].to_vec();
        let mut after = Lexer::at(self.data, end);
        // Skip to `endstream` regardless of whether /Length matched
        // exactly, tolerating off-by-a-few malformed lengths.
        loop {
            match after.next_token() {
                Token::Keyword(kw) if kw == "endstream" => break,
                Token::Eof => break,
                _ => {}
            }
        }
        self.lexer = after;
        PdfObject::Stream { dict, data }
    }

    pub fn parse_value(&mut self) -> Option<PdfObject> {
        let save = self.lexer.pos();
        match self.lexer.next_token() {
            Token::Int(n) => {
                // Lookahead for `gen R` forming an indirect reference.
                let save2 = self.lexer.pos();
                if let Token::Int(gen) = self.lexer.next_token() {
                    if let Token::Keyword(kw) = self.lexer.next_token() {
                        if kw == "R" {
                            return Some(PdfObject::Reference(ObjRef {
                                num: n.max(0) as u32,
                                gen: gen.max(0) as u16,
                            }));
                        }
                    }
                }
                self.lexer = Lexer::at(self.data, save2);
                Some(PdfObject::Int(n))
            }
            Token::Real(r) => Some(PdfObject::Real(r)),
            Token::Name(n) => Some(PdfObject::Name(n)),
            Token::LiteralString(s) | Token::HexString(s) => Some(PdfObject::String(s)),
            Token::ArrayStart => {
                let mut items = Vec::new();
                loop {
                    let before = self.lexer.pos();
                    match self.lexer.next_token() {
                        Token::ArrayEnd | Token::Eof => break,
                        _ => {
                            self.lexer = Lexer::at(self.data, before);
                            match self.parse_value() {
                                Some(v) => items.push(v),
                                None => break,
                            }
                        }
                    }
                }
                Some(PdfObject::Array(items))
            }
            Token::DictStart => {
                let mut map = HashMap::new();
                loop {
                    match self.lexer.next_token() {
                        Token::DictEnd | Token::Eof => break,
                        Token::Name(key) => {
                            if let Some(value) = self.parse_value() {
                                map.insert(key, value);
                            }
                        }
                        _ => {}
                    }
                }
                Some(PdfObject::Dict(map))
            }
            Token::Keyword(kw) if kw == "true" => Some(PdfObject::Bool(true)),
            Token::Keyword(kw) if kw == "false" => Some(PdfObject::Bool(false)),
            Token::Keyword(kw) if kw == "null" => Some(PdfObject::Null),
            Token::Eof => {
                self.lexer = Lexer::at(self.data, save);
                None
            }
            _ => None,
        }
    }
}
