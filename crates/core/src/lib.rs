//! controledit core library.
//!
//! This crate provides the building blocks for editing Debian package
//! metadata without disturbing its formatting: version ordering, the
//! relation algebra, lossless control and series documents, the edit
//! engine, and template reconciliation for generated files.

pub mod config;
pub mod conflict;
pub mod control;
pub mod editor;
pub mod errors;
pub mod relations;
pub mod series;
pub mod template;
pub mod version;

// Re-exports for convenience.
pub use config::EditorConfig;
pub use control::{ControlDocument, Paragraph, ParagraphKey};
pub use editor::{update_control, CommitOutcome, ControlEditor, EditSession, SeriesEditor};
pub use errors::{ConfigError, ConflictError, ControlError, CoreError, EditError, RelationError};
pub use relations::{Clause, Relation, RelationExpression};
pub use series::SeriesDocument;
pub use version::Version;
