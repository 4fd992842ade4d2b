//! Resolvers for field values that changed in the generated file while the
//! template holds something else.
//!
//! Resolvers are tried in order. Each either declines (`Ok(None)`), produces
//! the new template value, or fails the whole reconciliation.

use std::sync::Arc;

use tracing::{debug, info};

use super::merger::MergeStrategy;
use crate::control::ParagraphKey;
use crate::errors::ConflictError;
use crate::relations::layout;
use crate::relations::{parse_relations, Clause, RelationExpression};
use crate::template::is_placeholder;
use crate::template::SubstitutionRule;

/// One field whose template value differs from the generated value it
/// produced.
#[derive(Debug, Clone, Copy)]
pub struct FieldConflict<'a> {
    pub paragraph: &'a ParagraphKey,
    pub field: &'a str,
    /// Generated value before the edit.
    pub old: &'a str,
    /// Current template value.
    pub template: &'a str,
    /// Generated value after the edit.
    pub new: &'a str,
}

pub trait ConflictResolver {
    fn name(&self) -> &'static str;

    /// The new template value, or `None` if this resolver does not apply.
    fn resolve(&self, conflict: &FieldConflict<'_>) -> Result<Option<String>, ConflictError>;
}

// ---------------------------------------------------------------------------
// CDBS placeholder fields
// ---------------------------------------------------------------------------

/// Handles relation fields whose template value contains placeholders that
/// expand to more relations, e.g. `Build-Depends: @cdbs@, libc6`.
#[derive(Debug, Clone)]
pub struct CdbsResolver {
    relation_fields: Vec<String>,
}

impl CdbsResolver {
    pub fn new(relation_fields: Vec<String>) -> Self {
        Self { relation_fields }
    }
}

impl ConflictResolver for CdbsResolver {
    fn name(&self) -> &'static str {
        "cdbs"
    }

    fn resolve(&self, conflict: &FieldConflict<'_>) -> Result<Option<String>, ConflictError> {
        if !self.relation_fields.iter().any(|f| f == conflict.field)
            || SubstitutionRule::placeholders(conflict.template).is_empty()
        {
            return Ok(None);
        }
        let resolved =
            resolve_cdbs_conflict(conflict.field, conflict.old, conflict.template, conflict.new)?;
        info!(
            paragraph = %conflict.paragraph,
            field = conflict.field,
            "carried relation change into placeholder template"
        );
        Ok(Some(resolved))
    }
}

fn is_placeholder_clause(clause: &Clause) -> bool {
    clause
        .single()
        .is_some_and(|r| r.version.is_none() && is_placeholder(&r.name))
}

/// Apply the relation changes between `old` and `new` to `template`.
///
/// Clauses the template does not spell out are assumed to come from its
/// placeholders.
pub fn resolve_cdbs_conflict(
    field: &str,
    old: &str,
    template: &str,
    new: &str,
) -> Result<String, ConflictError> {
    let old = parse_relations(old)?;
    let new = parse_relations(new)?;
    let mut result = parse_relations(template)?;

    let added: Vec<Clause> = new
        .clauses()
        .filter(|(_, c)| !old.contains_clause(c))
        .map(|(_, c)| c.clone())
        .collect();
    let removed: Vec<Clause> = old
        .clauses()
        .filter(|(_, c)| !new.contains_clause(c))
        .map(|(_, c)| c.clone())
        .collect();

    for clause in &added {
        place_added(field, &mut result, clause)?;
    }

    for clause in &removed {
        let literal = result
            .clauses()
            .find(|(_, c)| !is_placeholder_clause(c) && *c == clause)
            .map(|(index, _)| index);
        match literal {
            Some(index) => {
                debug!(field, relation = %clause, "dropping relation from template");
                result.remove(index);
            }
            None => debug!(field, relation = %clause, "removed relation came from a placeholder"),
        }
    }

    Ok(layout::normalize(result.to_string()))
}

fn place_added(
    field: &str,
    template: &mut RelationExpression,
    clause: &Clause,
) -> Result<(), ConflictError> {
    if template.clauses().any(|(_, t)| clause.is_implied_by(t)) {
        debug!(field, relation = %clause, "template already implies relation");
        return Ok(());
    }

    let obsolete: Vec<usize> = template
        .clauses()
        .filter(|(_, t)| !is_placeholder_clause(t) && t.is_implied_by(clause))
        .map(|(index, _)| index)
        .collect();
    if let Some((&first, rest)) = obsolete.split_first() {
        debug!(field, relation = %clause, replaced = obsolete.len(), "replacing weaker relations");
        template.entries[first].value = clause.clone();
        for &index in rest.iter().rev() {
            template.remove(index);
        }
        return Ok(());
    }

    for alternative in clause.alternatives() {
        if template
            .clauses()
            .any(|(_, t)| t.len() > 1 && t.mentions(&alternative.name))
        {
            return Err(ConflictError::AmbiguousPlacement {
                field: field.to_string(),
                relation: clause.to_string(),
                detail: format!("'{}' already appears in an alternative group", alternative.name),
            });
        }
    }

    let last_literal = template
        .clauses()
        .enumerate()
        .filter(|(_, (_, c))| !is_placeholder_clause(c))
        .map(|(position, _)| position)
        .last();
    let position = match last_literal {
        Some(position) => position + 1,
        None => {
            let placeholders = template.clause_count();
            if placeholders > 1 {
                return Err(ConflictError::AmbiguousPlacement {
                    field: field.to_string(),
                    relation: clause.to_string(),
                    detail: "template has several placeholders and no literal relation".into(),
                });
            }
            placeholders
        }
    };
    debug!(field, relation = %clause, position, "adding relation to template");
    template.insert(position, clause.clone())?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Line merge
// ---------------------------------------------------------------------------

/// Falls back to a three-way merge of the field value.
pub struct MergeResolver {
    merger: Arc<dyn MergeStrategy>,
}

impl MergeResolver {
    pub fn new(merger: Arc<dyn MergeStrategy>) -> Self {
        Self { merger }
    }
}

impl ConflictResolver for MergeResolver {
    fn name(&self) -> &'static str {
        "merge"
    }

    fn resolve(&self, conflict: &FieldConflict<'_>) -> Result<Option<String>, ConflictError> {
        let line = |value: &str| format!("{value}\n");
        let merged = self.merger.merge(
            &line(conflict.old),
            &line(conflict.new),
            &line(conflict.template),
        )?;
        debug!(paragraph = %conflict.paragraph, field = conflict.field, "merged field value");
        Ok(Some(merged.trim_end_matches('\n').to_string()))
    }
}
