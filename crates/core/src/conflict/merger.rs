//! Three-way merge primitive.
//!
//! Uses the `diffy` crate to merge two descendants of a common base line by
//! line. The edit engine uses it to carry a change onto text its format
//! cannot render losslessly; the template reconciler uses it for plain
//! field values.

use tracing::debug;

use crate::errors::ConflictError;

/// The result of a three-way merge attempt.
#[derive(Debug, Clone)]
pub struct MergeResult {
    /// Merged text, with conflict markers if `has_conflicts` is true.
    pub merged_content: String,
    pub has_conflicts: bool,
    pub conflict_markers: Vec<ConflictMarker>,
}

/// A conflict region within merged output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictMarker {
    /// First line (1-indexed) of the `<<<<<<<` block.
    pub start_line: usize,
    /// Last line (1-indexed) of the `>>>>>>>` block.
    pub end_line: usize,
}

/// Something that can merge `ours` and `theirs` given their common `base`.
pub trait MergeStrategy {
    fn merge(&self, base: &str, ours: &str, theirs: &str) -> Result<String, ConflictError>;
}

/// Line-based merge backed by `diffy`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Merger;

impl Merger {
    /// Attempt a three-way merge of `base`, `ours` and `theirs`.
    ///
    /// The result always carries merged content; on conflict it contains
    /// `<<<<<<<` / `=======` / `>>>>>>>` markers.
    pub fn three_way_merge(base: &str, ours: &str, theirs: &str) -> MergeResult {
        // Fast path: if either side is identical to base, the other wins.
        if ours == base || ours == theirs {
            debug!("ours matches base or theirs, taking theirs");
            return MergeResult::clean(theirs);
        }
        if theirs == base {
            debug!("theirs == base, taking ours");
            return MergeResult::clean(ours);
        }

        match diffy::merge(base, ours, theirs) {
            Ok(merged) => {
                debug!("clean three-way merge");
                MergeResult::clean(&merged)
            }
            Err(conflicted) => {
                let conflict_markers = find_conflict_markers(&conflicted);
                debug!(conflicts = conflict_markers.len(), "three-way merge conflicted");
                MergeResult {
                    merged_content: conflicted,
                    has_conflicts: true,
                    conflict_markers,
                }
            }
        }
    }
}

impl MergeResult {
    fn clean(content: &str) -> Self {
        Self {
            merged_content: content.to_string(),
            has_conflicts: false,
            conflict_markers: Vec::new(),
        }
    }
}

impl MergeStrategy for Merger {
    fn merge(&self, base: &str, ours: &str, theirs: &str) -> Result<String, ConflictError> {
        let result = Self::three_way_merge(base, ours, theirs);
        if result.has_conflicts {
            let lines: Vec<String> = result
                .conflict_markers
                .iter()
                .map(|m| format!("{}-{}", m.start_line, m.end_line))
                .collect();
            return Err(ConflictError::MergeFailed(format!(
                "{} conflicting region(s) at lines {}",
                result.conflict_markers.len(),
                lines.join(", ")
            )));
        }
        Ok(result.merged_content)
    }
}

/// Refuses every merge; for callers that want lossy formats to fail.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMerge;

impl MergeStrategy for NoMerge {
    fn merge(&self, _base: &str, _ours: &str, _theirs: &str) -> Result<String, ConflictError> {
        Err(ConflictError::MergeFailed(
            "three-way merging is disabled".to_string(),
        ))
    }
}

fn find_conflict_markers(text: &str) -> Vec<ConflictMarker> {
    let mut markers = Vec::new();
    let mut start = None;
    for (index, line) in text.lines().enumerate() {
        if line.starts_with("<<<<<<<") {
            start = Some(index + 1);
        } else if line.starts_with(">>>>>>>") {
            if let Some(start_line) = start.take() {
                markers.push(ConflictMarker {
                    start_line,
                    end_line: index + 1,
                });
            }
        }
    }
    markers
}
