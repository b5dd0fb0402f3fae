//! A from-scratch PDF object/xref/stream decoder that produces
//! layout-aware Markdown, replacing the teacher's JNI/Tika-backed
//! preprocessor.
//!
//! ```text
//! bytes -> [xref] -> objects -> [content] -> text runs -> [layout]
//!       -> sections/paragraphs -> [heading] -> levels -> [markdown]
//! ```

pub mod content;
pub mod document;
pub mod filters;
pub mod fonts;
pub mod heading;
pub mod layout;
pub mod lexer;
pub mod markdown;
pub mod object;
pub mod xref;

pub use document::parse_to_pages;
pub use object::PdfObject;
