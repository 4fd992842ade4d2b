//! Paragraph-level differences between two control documents.

use crate::control::{ControlDocument, Paragraph, ParagraphKey};

/// A field whose value differs. `None` means the field is absent on that
/// side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub field: String,
    pub old: Option<String>,
    pub new: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParagraphChange {
    /// Fields changed in the paragraph identified by `key` (its key before
    /// the edit).
    Modified {
        key: ParagraphKey,
        fields: Vec<FieldChange>,
    },
    Added(Paragraph),
    Removed { key: ParagraphKey },
}

/// Changes turning `old` into `new`.
///
/// Paragraphs are paired by key first, then by position. Empty paragraphs
/// are ignored.
pub fn diff_documents(old: &ControlDocument, new: &ControlDocument) -> Vec<ParagraphChange> {
    let old_paragraphs = old.paragraphs();
    let new_paragraphs = new.paragraphs();
    let mut used = vec![false; old_paragraphs.len()];
    let mut pairs: Vec<Option<usize>> = vec![None; new_paragraphs.len()];

    for (j, paragraph) in new_paragraphs.iter().enumerate() {
        let Some(key) = paragraph.key() else { continue };
        let found = old_paragraphs
            .iter()
            .enumerate()
            .position(|(i, p)| !used[i] && p.key().as_ref() == Some(&key));
        if let Some(i) = found {
            used[i] = true;
            pairs[j] = Some(i);
        }
    }
    for (j, paragraph) in new_paragraphs.iter().enumerate() {
        if pairs[j].is_some() || paragraph.is_empty() {
            continue;
        }
        if old_paragraphs.get(j).is_some_and(|p| !p.is_empty()) && !used[j] {
            used[j] = true;
            pairs[j] = Some(j);
        }
    }

    let mut changes = Vec::new();
    for (j, paragraph) in new_paragraphs.iter().enumerate() {
        match pairs[j] {
            Some(i) => {
                let fields = diff_fields(&old_paragraphs[i], paragraph);
                if fields.is_empty() {
                    continue;
                }
                if let Some(key) = old_paragraphs[i].key() {
                    changes.push(ParagraphChange::Modified { key, fields });
                }
            }
            None if !paragraph.is_empty() => {
                changes.push(ParagraphChange::Added(paragraph.clone()));
            }
            None => {}
        }
    }
    for (i, paragraph) in old_paragraphs.iter().enumerate() {
        if used[i] {
            continue;
        }
        if let Some(key) = paragraph.key() {
            changes.push(ParagraphChange::Removed { key });
        }
    }
    changes
}

fn diff_fields(old: &Paragraph, new: &Paragraph) -> Vec<FieldChange> {
    let mut changes: Vec<FieldChange> = old
        .iter()
        .filter(|(name, value)| new.get(name) != Some(*value))
        .map(|(name, value)| FieldChange {
            field: name.to_string(),
            old: Some(value.to_string()),
            new: new.get(name).map(str::to_string),
        })
        .collect();
    changes.extend(
        new.iter()
            .filter(|(name, _)| !old.contains(name))
            .map(|(name, value)| FieldChange {
                field: name.to_string(),
                old: None,
                new: Some(value.to_string()),
            }),
    );
    changes
}
