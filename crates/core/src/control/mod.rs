//! deb822 control documents.
//!
//! Parsing keeps every byte of the source: comment lines, blank lines,
//! continuation indentation and line terminators. Only fields whose values
//! are replaced are re-rendered.

pub mod document;
pub mod paragraph;

pub use document::ControlDocument;
pub use paragraph::{Field, Paragraph, ParagraphKey, DESCRIPTION};
