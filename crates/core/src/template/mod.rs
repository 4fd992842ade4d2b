//! Templates of generated files (`debian/control.in` and the like).
//!
//! - [`substitution`]: `@name@` placeholders and their values.
//! - [`changes`]: what an edit changed, paragraph by paragraph.
//! - [`reconciler`]: applies those changes to the template.

pub mod changes;
pub mod reconciler;
pub mod substitution;

pub use changes::{diff_documents, FieldChange, ParagraphChange};
pub use reconciler::TemplateReconciler;
pub use substitution::{is_placeholder, SubstitutionRule};
