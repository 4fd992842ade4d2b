//! Implication between relations.
//!
//! A relation `dep` is implied by `outer` when every package version that
//! satisfies `outer` also satisfies `dep`. Arguments are always ordered
//! `(implied, implying)`.

use std::cmp::Ordering;

use super::parser::{parse_relations, Clause, Relation, RelationExpression, VersionOperator};
use crate::errors::RelationError;
use crate::version::Version;

#[derive(Debug, Clone, Copy)]
struct Bound<'a> {
    version: &'a Version,
    inclusive: bool,
}

/// The set of versions admitted by a constraint.
#[derive(Debug, Clone, Copy, Default)]
struct Interval<'a> {
    lower: Option<Bound<'a>>,
    upper: Option<Bound<'a>>,
}

impl<'a> Interval<'a> {
    fn of(operator: VersionOperator, version: &'a Version) -> Self {
        let bound = |inclusive| Some(Bound { version, inclusive });
        match operator {
            VersionOperator::Equal => Self {
                lower: bound(true),
                upper: bound(true),
            },
            VersionOperator::GreaterEqual => Self {
                lower: bound(true),
                upper: None,
            },
            VersionOperator::StrictlyGreater => Self {
                lower: bound(false),
                upper: None,
            },
            VersionOperator::LessEqual => Self {
                lower: None,
                upper: bound(true),
            },
            VersionOperator::StrictlyLess => Self {
                lower: None,
                upper: bound(false),
            },
        }
    }

    /// Whether `self` (the implied side) admits everything `outer` admits.
    fn contains(&self, outer: &Interval<'_>) -> bool {
        lower_admits(self.lower, outer.lower) && upper_admits(self.upper, outer.upper)
    }
}

fn lower_admits(dep: Option<Bound<'_>>, outer: Option<Bound<'_>>) -> bool {
    let Some(dep) = dep else { return true };
    let Some(outer) = outer else { return false };
    match outer.version.compare(dep.version) {
        Ordering::Greater => true,
        // An exclusive floor does not imply an inclusive one at the same
        // version: `>> 3` does not imply `>= 3`.
        Ordering::Equal => outer.inclusive == dep.inclusive,
        Ordering::Less => false,
    }
}

fn upper_admits(dep: Option<Bound<'_>>, outer: Option<Bound<'_>>) -> bool {
    let Some(dep) = dep else { return true };
    let Some(outer) = outer else { return false };
    match outer.version.compare(dep.version) {
        Ordering::Less => true,
        Ordering::Equal => dep.inclusive || !outer.inclusive,
        Ordering::Greater => false,
    }
}

/// Whether `dep` is implied by `outer`.
pub fn is_dep_implied(dep: &Relation, outer: &Relation) -> bool {
    if dep.name != outer.name {
        return false;
    }
    let Some(dep_constraint) = &dep.version else {
        return true;
    };
    let Some(outer_constraint) = &outer.version else {
        return false;
    };
    if dep_constraint == outer_constraint {
        return true;
    }
    let (Some(dep_version), Some(outer_version)) = (
        dep_constraint.parsed_version(),
        outer_constraint.parsed_version(),
    ) else {
        return false;
    };
    Interval::of(dep_constraint.operator, &dep_version)
        .contains(&Interval::of(outer_constraint.operator, &outer_version))
}

impl Clause {
    /// Whether every alternative of `outer` implies some alternative here.
    pub fn is_implied_by(&self, outer: &Clause) -> bool {
        !outer.is_empty()
            && outer.alternatives().iter().all(|o| {
                self.alternatives()
                    .iter()
                    .any(|alternative| is_dep_implied(alternative, o))
            })
    }
}

impl RelationExpression {
    /// Whether every clause here is implied by some clause of `outer`.
    pub fn is_implied_by(&self, outer: &RelationExpression) -> bool {
        self.clauses()
            .all(|(_, inner)| outer.clauses().any(|(_, o)| inner.is_implied_by(o)))
    }
}

/// Whether the relation text `inner` is implied by `outer`.
pub fn is_relation_implied(inner: &str, outer: &str) -> Result<bool, RelationError> {
    Ok(parse_relations(inner)?.is_implied_by(&parse_relations(outer)?))
}
