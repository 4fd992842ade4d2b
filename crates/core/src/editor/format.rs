//! File formats the edit engine knows how to parse and render.

use crate::control::ControlDocument;
use crate::errors::ControlError;
use crate::series::SeriesDocument;

/// A text format with an in-memory document model.
///
/// `serialize(parse(text))` need not reproduce `text`; the session detects
/// lossy formats and falls back to a three-way merge for them.
pub trait EditableFormat {
    type Document: Clone + PartialEq + std::fmt::Debug;

    /// Short name used in log messages.
    const NAME: &'static str;

    fn parse(text: &str) -> Result<Self::Document, ControlError>;

    fn serialize(document: &Self::Document) -> String;

    /// The document of a file that does not exist yet.
    fn empty() -> Self::Document;
}

/// deb822 paragraph files such as `debian/control`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ControlFormat;

impl EditableFormat for ControlFormat {
    type Document = ControlDocument;
    const NAME: &'static str = "control";

    fn parse(text: &str) -> Result<ControlDocument, ControlError> {
        ControlDocument::parse(text)
    }

    fn serialize(document: &ControlDocument) -> String {
        document.render()
    }

    fn empty() -> ControlDocument {
        ControlDocument::new()
    }
}

/// quilt `series` files.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeriesFormat;

impl EditableFormat for SeriesFormat {
    type Document = SeriesDocument;
    const NAME: &'static str = "series";

    fn parse(text: &str) -> Result<SeriesDocument, ControlError> {
        Ok(SeriesDocument::parse(text))
    }

    fn serialize(document: &SeriesDocument) -> String {
        document.render()
    }

    fn empty() -> SeriesDocument {
        SeriesDocument::default()
    }
}
