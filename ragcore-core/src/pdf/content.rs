//! The content-stream operator/operand machine: graphics state stack,
//! CTM, path construction (for ruling-line detection), and text
//! state/positioning producing a flat list of positioned text runs.

use std::collections::HashMap;

use super::fonts::FontInfo;
use super::lexer::{Lexer, Token};
use super::object::{ObjRef, PdfObject};

#[derive(Debug, Clone, Copy)]
pub struct Matrix(pub [f64; 6]);

impl Matrix {
    pub fn identity() -> Self {
        Matrix([1.0, 0.0, 0.0, 1.0, 0.0, 0.0])
    }

    pub fn multiply(&self, other: &Matrix) -> Matrix {
        let a = self.0;
        let b = other.0;
        Matrix([
            a[0] * b[0] + a[1] * b[2],
            a[0] * b[1] + a[1] * b[3],
            a[2] * b[0] + a[3] * b[2],
            a[2] * b[1] + a[3] * b[3],
            a[4] * b[0] + a[5] * b[2] + b[4],
            a[4] * b[1] + a[5] * b[3] + b[5],
        ])
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        let m = self.0;
        (m[0] * x + m[2] * y + m[4], m[1] * x + m[3] * y + m[5])
    }
}

/// A straight line segment from a path-construction operator,
/// classified by orientation; used by `layout` to find ruling lines
/// that mark section boundaries and table borders.
#[derive(Debug, Clone)]
pub struct RuleSegment {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
    pub horizontal: bool,
}

#[derive(Debug, Clone)]
pub struct TextRun {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub font_size: f64,
    pub bold: bool,
    /// Orientation in degrees, `0` for normal left-to-right horizontal
    /// text; used for majority-orientation reading-order detection.
    pub rotation: i32,
}

#[derive(Clone)]
struct GraphicsState {
    ctm: Matrix,
}

struct TextState {
    font: Option<FontInfo>,
    font_size: f64,
    matrix: Matrix,
    line_matrix: Matrix,
    char_spacing: f64,
    word_spacing: f64,
    leading: f64,
    horizontal_scale: f64,
}

impl Default for TextState {
    fn default() -> Self {
        TextState {
            font: None,
            font_size: 0.0,
            matrix: Matrix::identity(),
            line_matrix: Matrix::identity(),
            char_spacing: 0.0,
            word_spacing: 0.0,
            leading: 0.0,
            horizontal_scale: 1.0,
        }
    }
}

pub struct ContentResult {
    pub runs: Vec<TextRun>,
    pub rules: Vec<RuleSegment>,
}

pub fn interpret(
    content: &[u8],
    fonts: &HashMap<String, FontInfo>,
    _objects: &HashMap<ObjRef, PdfObject>,
) -> ContentResult {
    let mut lexer = Lexer::at(content, 0);
    let mut operands: Vec<PdfObject> = Vec::new();
    let mut gs_stack: Vec<GraphicsState> = vec![GraphicsState { ctm: Matrix::identity() }];
    let mut text = TextState::default();
    let mut in_text = false;
    let mut runs = Vec::new();
    let mut rules = Vec::new();
    let mut path_start = (0.0, 0.0);
    let mut path_current = (0.0, 0.0);

    loop {
        let save = lexer.pos();
        match lexer.next_token() {
            Token::Eof => break,
            Token::Int(n) => operands.push(PdfObject::Int(n)),
            Token::Real(r) => operands.push(PdfObject::Real(r)),
            Token::Name(n) => operands.push(PdfObject::Name(n)),
            Token::LiteralString(s) | Token::HexString(s) => operands.push(PdfObject::String(s)),
            Token::ArrayStart => {
                lexer = Lexer::at(content, save);
                let mut parser = super::object::ObjectParser::new(content, save);
                if let Some(v) = parser.parse_value() {
                    operands.push(v);
                }
                lexer = Lexer::at(content, parser.pos());
            }
            Token::Keyword(op) => {
                let top = gs_stack.last().cloned().unwrap_or(GraphicsState { ctm: Matrix::identity() });
                match op.as_str() {
                    "q" => gs_stack.push(top),
                    "Q" => {
                        if gs_stack.len() > 1 {
                            gs_stack.pop();
                        }
                    }
                    "cm" => {
                        if let Some(m) = matrix_from_operands(&operands) {
                            if let Some(state) = gs_stack.last_mut() {
                                state.ctm = m.multiply(&state.ctm);
                            }
                        }
                    }
                    "BT" => {
                        in_text = true;
                        text.matrix = Matrix::identity();
                        text.line_matrix = Matrix::identity();
                    }
                    "ET" => in_text = false,
                    "Tf" => {
                        if operands.len() >= 2 {
                            if let PdfObject::Name(name) = &operands[operands.len() - 2] {
                                text.font = fonts.get(name).cloned();
                            }
                            text.font_size = operands.last().and_then(|o| o.as_f64()).unwrap_or(text.font_size);
                        }
                    }
                    "Tc" => text.char_spacing = operands.first().and_then(|o| o.as_f64()).unwrap_or(0.0),
                    "Tw" => text.word_spacing = operands.first().and_then(|o| o.as_f64()).unwrap_or(0.0),
                    "TL" => text.leading = operands.first().and_then(|o| o.as_f64()).unwrap_or(0.0),
                    "Tz" => text.horizontal_scale = operands.first().and_then(|o| o.as_f64()).unwrap_or(100.0) / 100.0,
                    "Td" => {
                        if operands.len() >= 2 {
                            let tx = operands[operands.len() - 2].as_f64().unwrap_or(0.0);
                            let ty = operands[operands.len() - 1].as_f64().unwrap_or(0.0);
                            text.line_matrix = Matrix([1.0, 0.0, 0.0, 1.0, tx, ty]).multiply(&text.line_matrix);
                            text.matrix = text.line_matrix;
                        }
                    }
                    "TD" => {
                        if operands.len() >= 2 {
                            let tx = operands[operands.len() - 2].as_f64().unwrap_or(0.0);
                            let ty = operands[operands.len() - 1].as_f64().unwrap_or(0.0);
                            text.leading = -ty;
                            text.line_matrix = Matrix([1.0, 0.0, 0.0, 1.0, tx, ty]).multiply(&text.line_matrix);
                            text.matrix = text.line_matrix;
                        }
                    }
                    "Tm" => {
                        if let Some(m) = matrix_from_operands(&operands) {
                            text.line_matrix = m;
                            text.matrix = m;
                        }
                    }
                    "T*" => {
                        text.line_matrix = Matrix([1.0, 0.0, 0.0, 1.0, 0.0, -text.leading]).multiply(&text.line_matrix);
                        text.matrix = text.line_matrix;
                    }
                    "Tj" => {
                        if let Some(PdfObject::String(bytes)) = operands.last() {
                            emit_run(bytes, &mut text, &top.ctm, &mut runs);
                        }
                    }
                    "'" => {
                        text.line_matrix = Matrix([1.0, 0.0, 0.0, 1.0, 0.0, -text.leading]).multiply(&text.line_matrix);
                        text.matrix = text.line_matrix;
                        if let Some(PdfObject::String(bytes)) = operands.last() {
                            emit_run(bytes, &mut text, &top.ctm, &mut runs);
                        }
                    }
                    "TJ" => {
                        if let Some(PdfObject::Array(items)) = operands.last() {
                            for item in items {
                                match item {
                                    PdfObject::String(bytes) => emit_run(bytes, &mut text, &top.ctm, &mut runs),
                                    PdfObject::Int(_) | PdfObject::Real(_) => {
                                        let adjust = item.as_f64().unwrap_or(0.0);
                                        let dx = -adjust / 1000.0 * text.font_size * text.horizontal_scale;
                                        text.matrix = Matrix([1.0, 0.0, 0.0, 1.0, dx, 0.0]).multiply(&text.matrix);
                                    }
                                    _ => {}
                                }
                            }
                        }
                    }
                    "m" => {
                        if operands.len() >= 2 {
                            path_start = (
                                operands[operands.len() - 2].as_f64().unwrap_or(0.0),
                                operands[operands.len() - 1].as_f64().unwrap_or(0.0),
                            );
                            path_current = path_start;
                        }
                    }
                    "l" => {
                        if operands.len() >= 2 {
                            let next = (
                                operands[operands.len() - 2].as_f64().unwrap_or(0.0),
                                operands[operands.len() - 1].as_f64().unwrap_or(0.0),
                            );
                            let (x0, y0) = top.ctm.apply(path_current.0, path_current.1);
                            let (x1, y1) = top.ctm.apply(next.0, next.1);
                            let horizontal = (y1 - y0).abs() < (x1 - x0).abs() * 0.05;
                            let vertical = (x1 - x0).abs() < (y1 - y0).abs() * 0.05;
                            if horizontal || vertical {
                                rules.push(RuleSegment { x0, y0, x1, y1, horizontal });
                            }
                            path_current = next;
                        }
                    }
                    _ => {}
                }
                let _ = in_text;
                operands.clear();
            }
            _ => {
                operands.clear();
            }
        }
    }

    ContentResult { runs, rules }
}

fn emit_run(bytes: &[u8], text: &mut TextState, ctm: &Matrix, runs: &mut Vec<TextRun>) {
    let Some(font) = &text.font else { return };
    let step = font.bytes_per_code.max(1) as usize;
    let mut decoded = String::new();
    let mut advance = 0.0;
    for chunk in bytes.chunks(step) {
        let code = chunk.iter().fold(0u32, |acc, b| (acc << 8) | *b as u32);
        if let Some(s) = font.code_to_unicode.get(&code) {
            decoded.push_str(s);
        }
        let width = font.widths.get(&code).copied().unwrap_or(font.default_width) / 1000.0;
        advance += (width * text.font_size + text.char_spacing + if code == 32 { text.word_spacing } else { 0.0 })
            * text.horizontal_scale;
    }

    if !decoded.trim().is_empty() {
        let render_matrix = Matrix([text.font_size * text.horizontal_scale, 0.0, 0.0, text.font_size, 0.0, 0.0])
            .multiply(&text.matrix)
            .multiply(ctm);
        let (x, y) = (render_matrix.0[4], render_matrix.0[5]);
        let rotation = (text.matrix.0[1].atan2(text.matrix.0[0]).to_degrees().round() as i32).rem_euclid(360);
        runs.push(TextRun {
            text: decoded,
            x,
            y,
            font_size: text.font_size * ctm.0[3].abs().max(0.01),
            bold: font.is_bold,
            rotation,
        });
    }

    text.matrix = Matrix([1.0, 0.0, 0.0, 1.0, advance, 0.0]).multiply(&text.matrix);
}

fn matrix_from_operands(operands: &[PdfObject]) -> Option<Matrix> {
    if operands.len() < 6 {
        return None;
    }
    let base = operands.len() - 6;
    let mut values = [0.0; 6];
    for (i, value) in values.iter_mut().enumerate() {
        *value = operands[base + i].as_f64()?;
    }
    Some(Matrix(values))
}
