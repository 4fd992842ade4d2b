//! Fields and paragraphs of a deb822 document.

use std::fmt;

use crate::errors::ControlError;

/// Field kept last in any paragraph that has it.
pub const DESCRIPTION: &str = "Description";

// ---------------------------------------------------------------------------
// Field
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    name: String,
    value: String,
    /// Exact source text, `None` once the value has been replaced.
    raw: Option<String>,
    /// Comment lines sit between the continuation lines of this field.
    embedded_comments: bool,
    /// Comment lines following the field, with their terminators.
    comments: Vec<String>,
}

impl Field {
    fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            raw: None,
            embedded_comments: false,
            comments: Vec::new(),
        }
    }

    pub(crate) fn parsed(name: &str, first_line: &str, line: &str) -> Self {
        Self {
            name: name.to_string(),
            value: first_line.trim().to_string(),
            raw: Some(line.to_string()),
            embedded_comments: false,
            comments: Vec::new(),
        }
    }

    pub(crate) fn push_continuation(&mut self, line: &str) {
        self.value.push('\n');
        self.value.push_str(line.trim_end_matches(['\n', '\r']));
        if let Some(raw) = &mut self.raw {
            raw.push_str(line);
        }
    }

    pub(crate) fn push_embedded_comment(&mut self, lines: &str) {
        if let Some(raw) = &mut self.raw {
            raw.push_str(lines);
        }
        self.embedded_comments = true;
    }

    pub(crate) fn push_comments(&mut self, lines: &str) {
        self.comments
            .extend(lines.split_inclusive('\n').map(str::to_string));
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn comments(&self) -> &[String] {
        &self.comments
    }

    pub fn has_embedded_comments(&self) -> bool {
        self.embedded_comments
    }

    fn render(&self, out: &mut String) {
        match &self.raw {
            Some(raw) => out.push_str(raw),
            None => out.push_str(&render_value(&self.name, &self.value)),
        }
        for comment in &self.comments {
            ensure_newline(out);
            out.push_str(comment);
        }
    }
}

/// `Name: value` with continuation lines indented by at least one space.
fn render_value(name: &str, value: &str) -> String {
    let mut lines = value.split('\n');
    let first = lines.next().unwrap_or_default();
    let mut out = if first.is_empty() {
        format!("{name}:\n")
    } else {
        format!("{name}: {first}\n")
    };
    for line in lines {
        if !line.starts_with([' ', '\t']) {
            out.push(' ');
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

fn normalize_value(value: &str) -> &str {
    value.trim_end().trim_start_matches([' ', '\t'])
}

pub(crate) fn ensure_newline(out: &mut String) {
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}

pub(crate) fn validate_name(name: &str) -> Result<(), ControlError> {
    let invalid = name.is_empty()
        || name.starts_with(['#', '-'])
        || name.contains(|c: char| c == ':' || c.is_whitespace() || c.is_control());
    if invalid {
        return Err(ControlError::InvalidFieldName(name.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Paragraph
// ---------------------------------------------------------------------------

/// Identity of a paragraph: its first field, e.g. `Source: foo`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParagraphKey {
    pub name: String,
    pub value: String,
}

impl fmt::Display for ParagraphKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.value)
    }
}

/// An ordered set of uniquely named fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Paragraph {
    /// Comment lines before the first field.
    pub(crate) leading: String,
    pub(crate) fields: Vec<Field>,
    /// Blank separator lines and comments after the last field.
    pub(crate) trailing: String,
}

impl Paragraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a paragraph from `(name, value)` pairs in order.
    pub fn from_fields<'a>(
        fields: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self, ControlError> {
        let mut paragraph = Self::new();
        for (name, value) in fields {
            paragraph.set(name, value)?;
        }
        Ok(paragraph)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.field(name).map(Field::value)
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Field names in document order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(Field::name)
    }

    /// `(name, value)` pairs in document order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|f| (f.name(), f.value()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn key(&self) -> Option<ParagraphKey> {
        self.fields.first().map(|f| ParagraphKey {
            name: f.name.clone(),
            value: f.value.clone(),
        })
    }

    /// Set a field, keeping its position. New fields go before
    /// `Description`, or at the end.
    pub fn set(&mut self, name: &str, value: &str) -> Result<(), ControlError> {
        validate_name(name)?;
        let value = normalize_value(value);

        if let Some(field) = self.fields.iter_mut().find(|f| f.name == name) {
            if field.value == value {
                return Ok(());
            }
            if field.embedded_comments {
                return Err(ControlError::EmbeddedComments(name.to_string()));
            }
            field.value = value.to_string();
            field.raw = None;
            return Ok(());
        }

        let position = if name == DESCRIPTION {
            None
        } else {
            self.fields.iter().position(|f| f.name == DESCRIPTION)
        };
        let field = Field::new(name, value);
        match position {
            Some(index) => self.fields.insert(index, field),
            None => self.fields.push(field),
        }
        Ok(())
    }

    /// Remove a field and return its value. Comments that followed it stay
    /// where they were.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let index = self.fields.iter().position(|f| f.name == name)?;
        let field = self.fields.remove(index);
        if !field.comments.is_empty() {
            let comments = field.comments.concat();
            match index.checked_sub(1).and_then(|i| self.fields.get_mut(i)) {
                Some(previous) => previous.push_comments(&comments),
                None => self.leading.push_str(&comments),
            }
        }
        Some(field.value)
    }

    pub(crate) fn push_parsed(&mut self, field: Field) {
        self.fields.push(field);
    }

    pub(crate) fn last_field_mut(&mut self) -> Option<&mut Field> {
        self.fields.last_mut()
    }

    /// Attach comment lines to the last field, or to the leading span of a
    /// paragraph without fields.
    pub(crate) fn attach_comments(&mut self, lines: &str) {
        if lines.is_empty() {
            return;
        }
        match self.fields.last_mut() {
            Some(field) => field.push_comments(lines),
            None => self.leading.push_str(lines),
        }
    }

    pub(crate) fn render(&self, out: &mut String) {
        out.push_str(&self.leading);
        for field in &self.fields {
            ensure_newline(out);
            field.render(out);
        }
        if !self.trailing.is_empty() {
            ensure_newline(out);
            out.push_str(&self.trailing);
        }
    }
}

impl fmt::Display for Paragraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.render(&mut out);
        f.write_str(&out)
    }
}
