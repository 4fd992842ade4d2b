//! Relation field types and their lossless text form.
//!
//! `parse_relations` keeps the exact source text of every alternative and
//! the whitespace around every clause, so formatting a parsed expression
//! reproduces its input byte for byte.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use super::layout::{self, Blank, Spaced};
use crate::errors::RelationError;
use crate::version::Version;

// ---------------------------------------------------------------------------
// Version constraints
// ---------------------------------------------------------------------------

/// Comparison operator of a version constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VersionOperator {
    Equal,
    LessEqual,
    GreaterEqual,
    StrictlyLess,
    StrictlyGreater,
}

impl VersionOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::LessEqual => "<=",
            Self::GreaterEqual => ">=",
            Self::StrictlyLess => "<<",
            Self::StrictlyGreater => ">>",
        }
    }

    /// Split a leading operator off `text`. The obsolete `<` and `>` read as
    /// `<=` and `>=`.
    fn strip(text: &str) -> Option<(Self, &str)> {
        const OPERATORS: [(&str, VersionOperator); 7] = [
            (">=", VersionOperator::GreaterEqual),
            ("<=", VersionOperator::LessEqual),
            (">>", VersionOperator::StrictlyGreater),
            ("<<", VersionOperator::StrictlyLess),
            ("=", VersionOperator::Equal),
            (">", VersionOperator::GreaterEqual),
            ("<", VersionOperator::LessEqual),
        ];
        OPERATORS
            .iter()
            .find_map(|(symbol, op)| text.strip_prefix(symbol).map(|rest| (*op, rest)))
    }
}

impl fmt::Display for VersionOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for VersionOperator {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// `(operator, version)` as written inside the parentheses of a relation.
///
/// The version is kept as text because substitution variables such as
/// `${binary:Version}` and template placeholders are legal in its place.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct VersionConstraint {
    pub operator: VersionOperator,
    pub version: String,
}

impl VersionConstraint {
    pub fn new(operator: VersionOperator, version: &Version) -> Self {
        Self {
            operator,
            version: version.to_string(),
        }
    }

    /// Parse the text between the parentheses, e.g. `>= 1.0`.
    pub fn parse(text: &str) -> Result<Self, RelationError> {
        let trimmed = text.trim();
        let (operator, rest) = VersionOperator::strip(trimmed)
            .ok_or_else(|| RelationError::parse(text, "missing version operator"))?;
        let version = rest.trim();
        if version.is_empty() {
            return Err(RelationError::parse(text, "missing version"));
        }
        if !is_opaque(version) {
            Version::parse(version)
                .map_err(|err| RelationError::parse(text, err.to_string()))?;
        }
        Ok(Self {
            operator,
            version: version.to_string(),
        })
    }

    /// Typed version, `None` for substitution variables and placeholders.
    pub fn parsed_version(&self) -> Option<Version> {
        if is_opaque(&self.version) {
            return None;
        }
        Version::parse(&self.version).ok()
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.operator, self.version)
    }
}

fn is_opaque(version: &str) -> bool {
    version.contains("${") || version.contains('@')
}

// ---------------------------------------------------------------------------
// Relations
// ---------------------------------------------------------------------------

/// One alternative: a package name with optional constraint and qualifiers.
#[derive(Debug, Clone, Eq, Serialize)]
pub struct Relation {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archqual: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<VersionConstraint>,
    /// Architecture and build-profile restrictions, whitespace-normalised.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qualifiers: Option<String>,
    #[serde(skip)]
    raw: Option<String>,
}

impl Relation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            archqual: None,
            version: None,
            qualifiers: None,
            raw: None,
        }
    }

    pub fn with_constraint(mut self, constraint: VersionConstraint) -> Self {
        self.version = Some(constraint);
        self
    }

    pub fn parse(text: &str) -> Result<Self, RelationError> {
        let body = text.trim();
        if body.is_empty() {
            return Err(RelationError::parse(text, "empty alternative"));
        }

        let name_end = body
            .find(|c: char| c.is_whitespace() || matches!(c, '(' | '[' | '<'))
            .unwrap_or(body.len());
        let token = &body[..name_end];
        if token.is_empty() {
            return Err(RelationError::parse(text, "missing package name"));
        }
        let (name, archqual) = split_archqual(token);

        let mut rest = body[name_end..].trim_start();
        let mut version = None;
        if let Some(inner) = rest.strip_prefix('(') {
            let close = inner
                .find(')')
                .ok_or_else(|| RelationError::parse(text, "unterminated version constraint"))?;
            version = Some(VersionConstraint::parse(&inner[..close])?);
            rest = inner[close + 1..].trim_start();
        }

        let qualifiers = if rest.is_empty() {
            None
        } else if rest.starts_with('[') || rest.starts_with('<') {
            Some(rest.split_whitespace().collect::<Vec<_>>().join(" "))
        } else {
            return Err(RelationError::parse(
                text,
                format!("unexpected text '{rest}'"),
            ));
        };

        Ok(Self {
            name: name.to_string(),
            archqual: archqual.map(str::to_string),
            version,
            qualifiers,
            raw: Some(body.to_string()),
        })
    }

    /// Replace the constraint; the relation is re-rendered from then on.
    pub fn set_constraint(&mut self, constraint: Option<VersionConstraint>) {
        self.version = constraint;
        self.raw = None;
    }
}

fn split_archqual(token: &str) -> (&str, Option<&str>) {
    if token.contains("${") {
        return (token, None);
    }
    match token.split_once(':') {
        Some((name, qual)) if !name.is_empty() && !qual.is_empty() => (name, Some(qual)),
        _ => (token, None),
    }
}

impl PartialEq for Relation {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.archqual == other.archqual
            && self.version == other.version
            && self.qualifiers == other.qualifiers
    }
}

impl FromStr for Relation {
    type Err = RelationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(raw) = &self.raw {
            return f.write_str(raw);
        }
        f.write_str(&self.name)?;
        if let Some(archqual) = &self.archqual {
            write!(f, ":{archqual}")?;
        }
        if let Some(version) = &self.version {
            write!(f, " ({version})")?;
        }
        if let Some(qualifiers) = &self.qualifiers {
            write!(f, " {qualifiers}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Clauses
// ---------------------------------------------------------------------------

/// An OR-group. Separators hold the raw `|` text between alternatives.
#[derive(Debug, Clone, Default, Eq, Serialize)]
#[serde(transparent)]
pub struct Clause {
    alternatives: Vec<Relation>,
    #[serde(skip)]
    separators: Vec<String>,
}

impl Clause {
    pub fn from_alternatives(alternatives: Vec<Relation>) -> Self {
        let separators = vec![" | ".to_string(); alternatives.len().saturating_sub(1)];
        Self {
            alternatives,
            separators,
        }
    }

    pub fn parse(text: &str) -> Result<Self, RelationError> {
        let body = text.trim();
        if body.is_empty() {
            return Ok(Self::default());
        }
        let pieces = layout::split_top_level(body, '|')
            .ok_or_else(|| RelationError::parse(text, "unbalanced parentheses"))?;

        let mut alternatives = Vec::with_capacity(pieces.len());
        let mut separators = Vec::with_capacity(pieces.len().saturating_sub(1));
        let mut pending_tail = String::new();
        for (i, piece) in pieces.iter().enumerate() {
            let (head, alternative, tail) = layout::split_spacing(piece);
            if alternative.is_empty() {
                return Err(RelationError::parse(text, "empty alternative"));
            }
            if i > 0 {
                separators.push(format!("{pending_tail}|{head}"));
            }
            alternatives.push(Relation::parse(alternative)?);
            pending_tail = tail;
        }

        Ok(Self {
            alternatives,
            separators,
        })
    }

    pub fn alternatives(&self) -> &[Relation] {
        &self.alternatives
    }

    pub fn alternatives_mut(&mut self) -> &mut [Relation] {
        &mut self.alternatives
    }

    pub fn len(&self) -> usize {
        self.alternatives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alternatives.is_empty()
    }

    /// The only alternative, if this is not an OR-group.
    pub fn single(&self) -> Option<&Relation> {
        match self.alternatives.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }

    pub fn single_mut(&mut self) -> Option<&mut Relation> {
        match self.alternatives.as_mut_slice() {
            [only] => Some(only),
            _ => None,
        }
    }

    pub fn mentions(&self, package: &str) -> bool {
        self.alternatives.iter().any(|r| r.name == package)
    }

    /// Keep the alternatives matching `keep`. Each kept alternative keeps
    /// the separator written directly before it.
    pub fn retain(&mut self, mut keep: impl FnMut(&Relation) -> bool) {
        let old_separators = std::mem::take(&mut self.separators);
        let mut alternatives = Vec::with_capacity(self.alternatives.len());
        let mut separators = Vec::with_capacity(old_separators.len());
        for (i, alternative) in std::mem::take(&mut self.alternatives).into_iter().enumerate() {
            if !keep(&alternative) {
                continue;
            }
            if !alternatives.is_empty() {
                let separator = i
                    .checked_sub(1)
                    .and_then(|j| old_separators.get(j))
                    .cloned()
                    .unwrap_or_else(|| " | ".to_string());
                separators.push(separator);
            }
            alternatives.push(alternative);
        }
        self.alternatives = alternatives;
        self.separators = separators;
    }
}

impl From<Relation> for Clause {
    fn from(relation: Relation) -> Self {
        Self::from_alternatives(vec![relation])
    }
}

impl PartialEq for Clause {
    fn eq(&self, other: &Self) -> bool {
        self.alternatives == other.alternatives
    }
}

impl Blank for Clause {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }
}

impl FromStr for Clause {
    type Err = RelationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, alternative) in self.alternatives.iter().enumerate() {
            if i > 0 {
                f.write_str(self.separators.get(i - 1).map_or(" | ", String::as_str))?;
            }
            write!(f, "{alternative}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Relation expressions
// ---------------------------------------------------------------------------

/// A clause with the whitespace on either side of it.
pub type RelationEntry = Spaced<Clause>;

/// A whole relation field value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationExpression {
    pub entries: Vec<RelationEntry>,
}

impl RelationExpression {
    /// Non-blank clauses with their entry index.
    pub fn clauses(&self) -> impl Iterator<Item = (usize, &Clause)> + Clone {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| !entry.value.is_empty())
            .map(|(i, entry)| (i, &entry.value))
    }

    pub fn clause_count(&self) -> usize {
        self.clauses().count()
    }

    pub fn is_empty(&self) -> bool {
        self.clause_count() == 0
    }

    pub fn contains_clause(&self, clause: &Clause) -> bool {
        self.clauses().any(|(_, c)| c == clause)
    }

    /// Clauses mentioning `package`.
    pub fn iter_relations<'a>(
        &'a self,
        package: &'a str,
    ) -> impl Iterator<Item = (usize, &'a Clause)> + Clone + 'a {
        self.clauses().filter(move |(_, clause)| clause.mentions(package))
    }

    /// Insert `clause` at clause index `position`.
    pub fn insert(&mut self, position: usize, clause: Clause) -> Result<(), RelationError> {
        let len = self.clause_count();
        if position > len {
            return Err(RelationError::InvalidPosition { position, len });
        }
        layout::insert(&mut self.entries, position, clause);
        Ok(())
    }

    pub fn push(&mut self, clause: Clause) {
        let len = self.clause_count();
        layout::insert(&mut self.entries, len, clause);
    }

    /// Remove the entry at `index` (an entry index, as yielded by
    /// [`clauses`](Self::clauses)).
    pub fn remove(&mut self, index: usize) {
        if index < self.entries.len() {
            layout::remove(&mut self.entries, index);
        }
    }
}

impl FromStr for RelationExpression {
    type Err = RelationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_relations(s)
    }
}

impl fmt::Display for RelationExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&layout::join(&self.entries))
    }
}

/// Parse a relation field value.
pub fn parse_relations(text: &str) -> Result<RelationExpression, RelationError> {
    if text.is_empty() {
        return Ok(RelationExpression::default());
    }
    let segments = layout::split_top_level(text, ',')
        .ok_or_else(|| RelationError::parse(text, "unbalanced parentheses"))?;

    let mut entries = Vec::with_capacity(segments.len());
    for segment in segments {
        let (head, body, tail) = layout::split_spacing(segment);
        entries.push(Spaced {
            head,
            value: Clause::parse(body)?,
            tail,
        });
    }
    Ok(RelationExpression { entries })
}

/// Render an expression; the inverse of [`parse_relations`].
pub fn format_relations(expression: &RelationExpression) -> String {
    expression.to_string()
}
