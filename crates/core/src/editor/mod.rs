//! The format-preserving edit engine.
//!
//! An [`EditSession`] reads a file, hands out its parsed document for
//! mutation, and on commit writes back only what changed. Generated files
//! are refused unless a template binding can take the edit instead.

pub mod control;
pub mod format;
pub mod generated;
pub mod series;
pub mod session;

pub use control::{update_control, ControlEditor, ParagraphCallback, DEFAULT_CONTROL_PATH};
pub use format::{ControlFormat, EditableFormat, SeriesFormat};
pub use generated::{GeneratedFileBinding, GeneratedMarkers, DEFAULT_MARKERS};
pub use series::{SeriesEditor, DEFAULT_SERIES_PATH};
pub use session::{CommitOutcome, EditSession, SessionOptions, SessionState};
