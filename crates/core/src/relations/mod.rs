//! Relation fields: `Depends`, `Build-Depends` and friends.
//!
//! - [`parser`]: the lossless relation model and its text form.
//! - [`implication`]: whether one relation guarantees another.
//! - [`edit`]: text-in, text-out mutations that keep the field's layout.

pub mod edit;
pub mod implication;
pub mod layout;
pub mod parser;

pub use edit::{
    add_dependency, delete_from_list, drop_dependency, ensure_exact_version,
    ensure_minimum_version, ensure_relation, ensure_some_version, get_relation, iter_relations,
    RelationMatches,
};
pub use implication::{is_dep_implied, is_relation_implied};
pub use layout::Spaced;
pub use parser::{
    format_relations, parse_relations, Clause, Relation, RelationEntry, RelationExpression,
    VersionConstraint, VersionOperator,
};
