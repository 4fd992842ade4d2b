//! Lossless deb822 documents.

use std::fmt;
use std::str::FromStr;

use super::paragraph::{ensure_newline, Field, Paragraph, ParagraphKey};
use crate::errors::ControlError;

/// A control file: optional leading comments then paragraphs.
///
/// Rendering an unmodified document reproduces the parsed text exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlDocument {
    leading: String,
    paragraphs: Vec<Paragraph>,
}

impl ControlDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(text: &str) -> Result<Self, ControlError> {
        let mut document = Self::default();
        let mut current: Option<Paragraph> = None;
        // Comment lines not yet attached to anything.
        let mut pending = String::new();

        for (index, line) in text.split_inclusive('\n').enumerate() {
            let lineno = index + 1;
            let content = line.trim_end_matches(['\n', '\r']);

            if content.trim().is_empty() {
                match current.take() {
                    Some(mut paragraph) => {
                        paragraph.attach_comments(&std::mem::take(&mut pending));
                        paragraph.trailing.push_str(line);
                        document.paragraphs.push(paragraph);
                    }
                    None => {
                        pending.push_str(line);
                        document.push_gap(&std::mem::take(&mut pending));
                    }
                }
                continue;
            }

            if content.starts_with('#') {
                pending.push_str(line);
                continue;
            }

            if content.starts_with([' ', '\t']) {
                let field = current
                    .as_mut()
                    .and_then(Paragraph::last_field_mut)
                    .ok_or_else(|| ControlError::FileFormat {
                        line: lineno,
                        detail: "continuation line outside of a field".to_string(),
                    })?;
                if !pending.is_empty() {
                    field.push_embedded_comment(&std::mem::take(&mut pending));
                }
                field.push_continuation(line);
                continue;
            }

            let (name, rest) = content.split_once(':').ok_or_else(|| ControlError::FileFormat {
                line: lineno,
                detail: format!("expected 'Name: value', found '{content}'"),
            })?;
            if name.is_empty() || name.contains(char::is_whitespace) {
                return Err(ControlError::FileFormat {
                    line: lineno,
                    detail: format!("invalid field name '{name}'"),
                });
            }

            if let Some(paragraph) = current.as_mut() {
                paragraph.attach_comments(&std::mem::take(&mut pending));
            }
            let paragraph = current.get_or_insert_with(|| Paragraph {
                leading: std::mem::take(&mut pending),
                ..Paragraph::default()
            });
            if paragraph.contains(name) {
                return Err(ControlError::DuplicateField {
                    name: name.to_string(),
                    line: lineno,
                });
            }
            paragraph.push_parsed(Field::parsed(name, rest, line));
        }

        match current {
            Some(mut paragraph) => {
                paragraph.attach_comments(&pending);
                document.paragraphs.push(paragraph);
            }
            None if !pending.is_empty() => document.push_gap(&pending),
            None => {}
        }
        Ok(document)
    }

    /// Text between paragraphs belongs to the paragraph before it.
    fn push_gap(&mut self, text: &str) {
        match self.paragraphs.last_mut() {
            Some(last) => last.trailing.push_str(text),
            None => self.leading.push_str(text),
        }
    }

    pub fn paragraphs(&self) -> &[Paragraph] {
        &self.paragraphs
    }

    pub fn paragraphs_mut(&mut self) -> &mut [Paragraph] {
        &mut self.paragraphs
    }

    pub fn len(&self) -> usize {
        self.paragraphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paragraphs.is_empty()
    }

    /// The first paragraph, created if the document has none.
    pub fn first_or_insert(&mut self) -> &mut Paragraph {
        if self.paragraphs.is_empty() {
            self.paragraphs.push(Paragraph::new());
        }
        &mut self.paragraphs[0]
    }

    pub fn find(&self, key: &ParagraphKey) -> Option<&Paragraph> {
        self.paragraphs.iter().find(|p| p.key().as_ref() == Some(key))
    }

    pub fn position(&self, key: &ParagraphKey) -> Option<usize> {
        self.paragraphs.iter().position(|p| p.key().as_ref() == Some(key))
    }

    /// Paragraphs whose field `name` has the value `value`.
    pub fn matching<'a>(
        &'a self,
        name: &'a str,
        value: &'a str,
    ) -> impl Iterator<Item = &'a Paragraph> + 'a {
        self.paragraphs
            .iter()
            .filter(move |p| p.get(name) == Some(value))
    }

    pub fn matching_mut<'a>(
        &'a mut self,
        name: &'a str,
        value: &'a str,
    ) -> impl Iterator<Item = &'a mut Paragraph> + 'a {
        self.paragraphs
            .iter_mut()
            .filter(move |p| p.get(name) == Some(value))
    }

    /// Append a paragraph, separated from the previous one by a blank line.
    pub fn push_paragraph(&mut self, paragraph: Paragraph) {
        if let Some(last) = self.paragraphs.last_mut() {
            if last.trailing.is_empty() {
                last.trailing.push('\n');
            }
        }
        self.paragraphs.push(paragraph);
    }

    pub fn remove_paragraph(&mut self, index: usize) -> Option<Paragraph> {
        if index >= self.paragraphs.len() {
            return None;
        }
        let removed = self.paragraphs.remove(index);
        if index == self.paragraphs.len() {
            // The new last paragraph should not end with a blank line.
            if let Some(last) = self.paragraphs.last_mut() {
                if last.trailing.trim().is_empty() {
                    last.trailing.clear();
                }
            }
        }
        Some(removed)
    }

    pub fn render(&self) -> String {
        let mut out = self.leading.clone();
        for paragraph in &self.paragraphs {
            ensure_newline(&mut out);
            paragraph.render(&mut out);
        }
        out
    }
}

impl FromStr for ControlDocument {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ControlDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTROL: &str = "\
# Header comment

Source: blah
# about the maintainer
Maintainer: Joe <joe@example.com>
Build-Depends: debhelper (>= 9),
# a comment inside the field
 foo
Testsuite: autopkgtest

# before the binary
Package: blah
Description: short
 And more lines
# trailing comment
";

    #[test]
    fn test_round_trip() {
        for text in [
            "",
            "\n",
            CONTROL,
            "Source: foo",
            "Source: foo\n\n\n\nPackage: bar\n",
            "Source:foo\r\nPackage-List:\r\n foo deb\r\n",
            "# only a comment",
        ] {
            assert_eq!(ControlDocument::parse(text).unwrap().to_string(), text);
        }
    }

    #[test]
    fn test_values_and_comments() {
        let document = ControlDocument::parse(CONTROL).unwrap();
        assert_eq!(document.len(), 2);

        let source = &document.paragraphs()[0];
        assert_eq!(source.get("Source"), Some("blah"));
        assert_eq!(source.get("Build-Depends"), Some("debhelper (>= 9),\n foo"));
        assert!(source.field("Build-Depends").unwrap().has_embedded_comments());
        assert_eq!(
            source.field("Source").unwrap().comments(),
            ["# about the maintainer\n".to_string()]
        );

        let binary = &document.paragraphs()[1];
        assert_eq!(binary.get("Description"), Some("short\n And more lines"));
        assert_eq!(
            binary.field("Description").unwrap().comments(),
            ["# trailing comment\n".to_string()]
        );
    }

    #[test]
    fn test_embedded_comments_block_replacement() {
        let mut document = ControlDocument::parse(CONTROL).unwrap();
        let source = &mut document.paragraphs_mut()[0];
        assert_eq!(
            source.set("Build-Depends", "debhelper (>= 10)"),
            Err(ControlError::EmbeddedComments("Build-Depends".into()))
        );
        // Re-setting the same value is a no-op, not an error.
        source.set("Build-Depends", "debhelper (>= 9),\n foo").unwrap();
    }

    #[test]
    fn test_edit_keeps_comments_in_place() {
        let mut document = ControlDocument::parse(CONTROL).unwrap();
        document.paragraphs_mut()[0]
            .set("Maintainer", "Jane <jane@example.com>")
            .unwrap();
        let expected = CONTROL.replace("Joe <joe@example.com>", "Jane <jane@example.com>");
        assert_eq!(document.to_string(), expected);
    }

    #[test]
    fn test_remove_keeps_following_comment() {
        let mut document = ControlDocument::parse("A: 1\nB: 2\n# about C\nC: 3\n").unwrap();
        document.paragraphs_mut()[0].remove("B");
        assert_eq!(document.to_string(), "A: 1\n# about C\nC: 3\n");
    }

    #[test]
    fn test_push_paragraph_separates() {
        let mut document = ControlDocument::parse("Source: blah\n").unwrap();
        document.push_paragraph(Paragraph::from_fields([("Package", "foo")]).unwrap());
        assert_eq!(document.to_string(), "Source: blah\n\nPackage: foo\n");

        let mut document = ControlDocument::parse("Source: blah").unwrap();
        document.push_paragraph(Paragraph::from_fields([("Package", "foo")]).unwrap());
        assert_eq!(document.to_string(), "Source: blah\n\nPackage: foo\n");
    }

    #[test]
    fn test_remove_paragraph() {
        let mut document = ControlDocument::parse("Source: a\n\nPackage: b\n").unwrap();
        document.remove_paragraph(1).unwrap();
        assert_eq!(document.to_string(), "Source: a\n");
    }

    #[test]
    fn test_matching() {
        let document =
            ControlDocument::parse("Source: a\n\nPackage: b\n\nPackage: c\nSection: doc\n").unwrap();
        let found: Vec<_> = document.matching("Package", "c").collect();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].get("Section"), Some("doc"));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            ControlDocument::parse(" orphan\n"),
            Err(ControlError::FileFormat { line: 1, .. })
        ));
        assert!(matches!(
            ControlDocument::parse("A: 1\n\n continuation\n"),
            Err(ControlError::FileFormat { line: 3, .. })
        ));
        assert!(matches!(
            ControlDocument::parse("A: 1\nno colon here\n"),
            Err(ControlError::FileFormat { line: 2, .. })
        ));
        assert_eq!(
            ControlDocument::parse("A: 1\nA: 2\n"),
            Err(ControlError::DuplicateField {
                name: "A".into(),
                line: 2
            })
        );
    }
}
