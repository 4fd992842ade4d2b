//! Carries edits of a generated control file back into its template.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::changes::{FieldChange, ParagraphChange};
use super::substitution::SubstitutionRule;
use crate::conflict::{
    CdbsResolver, ConflictResolver, FieldConflict, MergeResolver, MergeStrategy,
};
use crate::control::{ControlDocument, Paragraph, ParagraphKey};
use crate::errors::ConflictError;

pub struct TemplateReconciler {
    rule: SubstitutionRule,
    resolvers: Vec<Box<dyn ConflictResolver>>,
}

impl TemplateReconciler {
    pub fn new(rule: SubstitutionRule, resolvers: Vec<Box<dyn ConflictResolver>>) -> Self {
        Self { rule, resolvers }
    }

    /// The usual chain: the CDBS resolver for `relation_fields`, then a
    /// line merge of the field value.
    pub fn with_default_resolvers(
        rule: SubstitutionRule,
        relation_fields: Vec<String>,
        merger: Arc<dyn MergeStrategy>,
    ) -> Self {
        Self::new(
            rule,
            vec![
                Box::new(CdbsResolver::new(relation_fields)),
                Box::new(MergeResolver::new(merger)),
            ],
        )
    }

    pub fn rule(&self) -> &SubstitutionRule {
        &self.rule
    }

    /// Whether `generated` is what the template currently expands to.
    ///
    /// Templates with unknown placeholders cannot be checked and count as
    /// in sync.
    pub fn in_sync(&self, template: &str, generated: &str) -> bool {
        match self.rule.expand(template) {
            Some(expanded) if expanded != generated => {
                warn!("generated file is out of sync with its template; keeping the template");
                false
            }
            Some(_) => true,
            None => {
                debug!(
                    missing = ?self.rule.missing(template),
                    "template has placeholders without values, skipping sync check"
                );
                true
            }
        }
    }

    /// Apply `changes` (computed on the generated file) to `template`.
    ///
    /// On error `template` may be partly modified and must be discarded.
    pub fn apply(
        &self,
        template: &mut ControlDocument,
        changes: &[ParagraphChange],
    ) -> Result<(), ConflictError> {
        for change in changes {
            match change {
                ParagraphChange::Modified { key, fields } => {
                    let index = self.locate(template, key)?;
                    let paragraph = &mut template.paragraphs_mut()[index];
                    for field in fields {
                        self.apply_field(paragraph, key, field)?;
                    }
                }
                ParagraphChange::Added(paragraph) => {
                    debug!(paragraph = ?paragraph.key(), "adding paragraph to template");
                    template.push_paragraph(paragraph.clone());
                }
                ParagraphChange::Removed { key } => {
                    let index = self.locate(template, key)?;
                    debug!(paragraph = %key, "removing paragraph from template");
                    template.remove_paragraph(index);
                }
            }
        }
        info!(changes = changes.len(), "applied changes to template");
        Ok(())
    }

    /// Index of the template paragraph that generated `key`.
    fn locate(&self, template: &ControlDocument, key: &ParagraphKey) -> Result<usize, ConflictError> {
        template
            .paragraphs()
            .iter()
            .position(|p| {
                p.key().is_some_and(|k| {
                    k.name == key.name
                        && (k.value == key.value
                            || self.rule.expand(&k.value).as_deref() == Some(key.value.as_str()))
                })
            })
            .ok_or_else(|| ConflictError::Unresolvable {
                paragraph: key.to_string(),
                field: key.name.clone(),
                detail: "paragraph not found in template".to_string(),
            })
    }

    fn apply_field(
        &self,
        paragraph: &mut Paragraph,
        key: &ParagraphKey,
        change: &FieldChange,
    ) -> Result<(), ConflictError> {
        let current = paragraph.get(&change.field).map(str::to_string);

        if current == change.new {
            debug!(paragraph = %key, field = %change.field, "template already has new value");
            return Ok(());
        }
        if current == change.old {
            debug!(paragraph = %key, field = %change.field, "applying change to template");
            return write_field(paragraph, key, &change.field, change.new.as_deref());
        }

        let conflict = FieldConflict {
            paragraph: key,
            field: &change.field,
            old: change.old.as_deref().unwrap_or(""),
            template: current.as_deref().unwrap_or(""),
            new: change.new.as_deref().unwrap_or(""),
        };
        for resolver in &self.resolvers {
            if let Some(value) = resolver.resolve(&conflict)? {
                debug!(
                    paragraph = %key,
                    field = %change.field,
                    resolver = resolver.name(),
                    "resolved template conflict"
                );
                let value = (!value.is_empty() || change.new.is_some()).then_some(value);
                return write_field(paragraph, key, &change.field, value.as_deref());
            }
        }
        Err(ConflictError::Unresolvable {
            paragraph: key.to_string(),
            field: change.field.clone(),
            detail: "template value differs from the generated value".to_string(),
        })
    }
}

fn write_field(
    paragraph: &mut Paragraph,
    key: &ParagraphKey,
    field: &str,
    value: Option<&str>,
) -> Result<(), ConflictError> {
    match value {
        Some(value) => paragraph
            .set(field, value)
            .map_err(|e| ConflictError::Unresolvable {
                paragraph: key.to_string(),
                field: field.to_string(),
                detail: e.to_string(),
            }),
        None => {
            paragraph.remove(field);
            Ok(())
        }
    }
}
