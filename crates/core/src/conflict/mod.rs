//! Three-way merging and conflict resolution.
//!
//! The conflict subsystem is responsible for:
//! 1. **Merging** -- the three-way merge primitive used for lossy formats
//!    and plain field values.
//! 2. **Resolution** -- deciding how a generated-file change lands in a
//!    template whose value differs.

pub mod merger;
pub mod resolver;

pub use merger::{
    ConflictMarker, MergeResult, MergeStrategy, Merger, Merger as DiffyMerger, NoMerge,
};
pub use resolver::{
    resolve_cdbs_conflict, CdbsResolver, ConflictResolver, FieldConflict, MergeResolver,
};
