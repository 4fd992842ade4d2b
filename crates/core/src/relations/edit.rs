//! Text-in, text-out edits of relation fields.
//!
//! Every operation returns its input unchanged when nothing needs to
//! change. Otherwise the result keeps the field's separator and indentation
//! style and is normalised (see [`layout::normalize`]).

use tracing::debug;

use super::layout::{self, Spaced};
use super::parser::{
    parse_relations, Clause, Relation, RelationEntry, RelationExpression, VersionConstraint,
    VersionOperator,
};
use crate::errors::RelationError;
use crate::version::Version;

fn render_edited(expression: &RelationExpression) -> String {
    layout::normalize(expression.to_string())
}

/// Parse text that must hold exactly one clause.
fn parse_single_clause(text: &str) -> Result<Clause, RelationError> {
    let expression = parse_relations(text.trim())?;
    let mut clauses = expression.clauses();
    match (clauses.next(), clauses.next()) {
        (Some((_, clause)), None) => Ok(clause.clone()),
        _ => Err(RelationError::parse(text, "expected exactly one relation clause")),
    }
}

/// `9~` and `9` name the same floor.
fn release_floor(version: &str) -> &str {
    version.split('~').next().unwrap_or(version)
}

/// Upper bounds say nothing about a floor and are never rewritten.
fn is_upper_bound(constraint: Option<&VersionConstraint>) -> bool {
    constraint.is_some_and(|c| {
        matches!(
            c.operator,
            VersionOperator::StrictlyLess | VersionOperator::LessEqual
        )
    })
}

fn needs_new_floor(constraint: Option<&VersionConstraint>, minimum: &Version) -> bool {
    let Some(constraint) = constraint else {
        return true;
    };
    let Some(current) = constraint.parsed_version() else {
        return false;
    };
    current.compare(minimum).is_lt()
        && release_floor(&constraint.version) != release_floor(&minimum.to_string())
}

// ---------------------------------------------------------------------------
// Lookups
// ---------------------------------------------------------------------------

/// Entry index and alternatives of the first plain clause for `package`.
pub fn get_relation(text: &str, package: &str) -> Result<(usize, Vec<Relation>), RelationError> {
    let expression = parse_relations(text)?;
    let (index, clause) = expression
        .iter_relations(package)
        .next()
        .ok_or_else(|| RelationError::NotFound(package.to_string()))?;
    if clause.len() > 1 {
        return Err(RelationError::Ambiguous {
            package: package.to_string(),
            detail: format!("'{clause}' is an OR-group"),
        });
    }
    Ok((index, clause.alternatives().to_vec()))
}

/// Iterator over the clauses of an expression that mention a package.
#[derive(Debug, Clone)]
pub struct RelationMatches {
    entries: Vec<RelationEntry>,
    package: String,
    next: usize,
}

impl Iterator for RelationMatches {
    type Item = (usize, Vec<Relation>);

    fn next(&mut self) -> Option<Self::Item> {
        while self.next < self.entries.len() {
            let index = self.next;
            self.next += 1;
            let clause = &self.entries[index].value;
            if clause.mentions(&self.package) {
                return Some((index, clause.alternatives().to_vec()));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.entries.len() - self.next))
    }
}

/// Every `(entry index, alternatives)` whose clause mentions `package`.
pub fn iter_relations(text: &str, package: &str) -> Result<RelationMatches, RelationError> {
    Ok(RelationMatches {
        entries: parse_relations(text)?.entries,
        package: package.to_string(),
        next: 0,
    })
}

// ---------------------------------------------------------------------------
// Version requirements
// ---------------------------------------------------------------------------

/// Make sure `package` is required at `minimum` or later.
pub fn ensure_minimum_version(
    text: &str,
    package: &str,
    minimum: &str,
) -> Result<String, RelationError> {
    let minimum = Version::parse(minimum)?;
    let mut expression = parse_relations(text)?;
    let mut found = false;
    let mut changed = false;

    for entry in &mut expression.entries {
        let Some(relation) = entry.value.single_mut() else {
            continue;
        };
        if relation.name != package || is_upper_bound(relation.version.as_ref()) {
            continue;
        }
        found = true;
        if needs_new_floor(relation.version.as_ref(), &minimum) {
            debug!(package, minimum = %minimum, "raising version floor");
            relation.set_constraint(Some(VersionConstraint::new(
                VersionOperator::GreaterEqual,
                &minimum,
            )));
            changed = true;
        }
    }

    if !found {
        expression.push(Clause::from(Relation::new(package).with_constraint(
            VersionConstraint::new(VersionOperator::GreaterEqual, &minimum),
        )));
        changed = true;
    }

    Ok(if changed {
        render_edited(&expression)
    } else {
        text.to_string()
    })
}

/// Pin `package` to exactly `version`.
pub fn ensure_exact_version(
    text: &str,
    package: &str,
    version: &str,
) -> Result<String, RelationError> {
    let version = Version::parse(version)?;
    let mut expression = parse_relations(text)?;
    let mut found = false;
    let mut in_or_group = false;
    let mut changed = false;

    for entry in &mut expression.entries {
        if !entry.value.mentions(package) {
            continue;
        }
        let Some(relation) = entry.value.single_mut() else {
            in_or_group = true;
            continue;
        };
        found = true;
        let pinned = relation.version.as_ref().is_some_and(|c| {
            c.operator == VersionOperator::Equal
                && c.parsed_version().is_some_and(|v| v.compare(&version).is_eq())
        });
        if !pinned {
            relation.set_constraint(Some(VersionConstraint::new(VersionOperator::Equal, &version)));
            changed = true;
        }
    }

    if !found {
        if in_or_group {
            return Err(RelationError::Ambiguous {
                package: package.to_string(),
                detail: "only mentioned inside an OR-group".to_string(),
            });
        }
        expression.push(Clause::from(
            Relation::new(package)
                .with_constraint(VersionConstraint::new(VersionOperator::Equal, &version)),
        ));
        changed = true;
    }

    Ok(if changed {
        render_edited(&expression)
    } else {
        text.to_string()
    })
}

/// Make sure `package` is mentioned at all.
pub fn ensure_some_version(text: &str, package: &str) -> Result<String, RelationError> {
    let mut expression = parse_relations(text)?;
    let present = expression
        .clauses()
        .any(|(_, clause)| clause.single().is_some_and(|r| r.name == package));
    if present {
        return Ok(text.to_string());
    }
    expression.push(Clause::from(Relation::new(package)));
    Ok(render_edited(&expression))
}

/// Make sure the clause `relation` holds, replacing clauses it supersedes.
pub fn ensure_relation(text: &str, relation: &str) -> Result<String, RelationError> {
    let new_clause = parse_single_clause(relation)?;
    let mut expression = parse_relations(text)?;

    let mut obsolete = Vec::new();
    for (index, clause) in expression.clauses() {
        if new_clause.is_implied_by(clause) {
            return Ok(text.to_string());
        }
        if clause.is_implied_by(&new_clause) {
            obsolete.push(index);
        }
    }

    match obsolete.split_first() {
        Some((&first, rest)) => {
            debug!(relation = %new_clause, replaced = rest.len() + 1, "replacing obsolete clauses");
            expression.entries[first].value = new_clause;
            for &index in rest.iter().rev() {
                expression.remove(index);
            }
        }
        None => expression.push(new_clause),
    }
    Ok(render_edited(&expression))
}

// ---------------------------------------------------------------------------
// Adding and removing
// ---------------------------------------------------------------------------

/// Insert the clause `entry` at clause index `position` (default: the end).
pub fn add_dependency(
    text: &str,
    entry: &str,
    position: Option<usize>,
) -> Result<String, RelationError> {
    let clause = parse_single_clause(entry)?;
    let mut expression = parse_relations(text)?;
    let position = position.unwrap_or_else(|| expression.clause_count());
    expression.insert(position, clause)?;
    Ok(render_edited(&expression))
}

/// Remove every alternative naming `package`.
pub fn drop_dependency(text: &str, package: &str) -> Result<String, RelationError> {
    let mut expression = parse_relations(text)?;
    let mut changed = false;

    while let Some(index) = expression
        .entries
        .iter()
        .position(|entry| entry.value.mentions(package))
    {
        changed = true;
        let clause = &mut expression.entries[index].value;
        clause.retain(|r| r.name != package);
        if clause.is_empty() {
            expression.remove(index);
        }
    }

    Ok(if changed {
        render_edited(&expression)
    } else {
        text.to_string()
    })
}

/// Remove `entry` from a plain comma-separated list.
pub fn delete_from_list(text: &str, entry: &str) -> String {
    let target = entry.trim();
    let mut entries: Vec<Spaced<String>> = text
        .split(',')
        .map(|segment| {
            let (head, body, tail) = layout::split_spacing(segment);
            Spaced {
                head,
                value: body.to_string(),
                tail,
            }
        })
        .collect();

    let Some(index) = entries.iter().position(|e| e.value == target) else {
        return text.to_string();
    };
    layout::remove(&mut entries, index);
    layout::normalize(layout::join(&entries))
}
