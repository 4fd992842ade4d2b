//! quilt `series` files: one patch per line, `#` comments out a patch.

use std::fmt;
use std::path::Path;

/// A patch line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesEntry {
    pub name: String,
    /// Commented out with `#`.
    pub quoted: bool,
    pub options: Vec<String>,
}

impl SeriesEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            quoted: false,
            options: Vec::new(),
        }
    }

    fn parse(line: &str) -> Option<Self> {
        let (quoted, text) = match line.strip_prefix('#') {
            Some(rest) => (true, rest.split('#').next().unwrap_or_default()),
            None => (false, line.split('#').next().unwrap_or_default()),
        };
        let mut args = text.split_whitespace();
        let name = args.next()?;
        Some(Self {
            name: name.to_string(),
            quoted,
            options: args.map(str::to_string).collect(),
        })
    }
}

impl fmt::Display for SeriesEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.quoted {
            f.write_str("# ")?;
        }
        f.write_str(&self.name)?;
        for option in &self.options {
            write!(f, " {option}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SeriesLine {
    Entry {
        entry: SeriesEntry,
        raw: Option<String>,
    },
    Other(String),
}

/// A lossless `series` file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeriesDocument {
    lines: Vec<SeriesLine>,
}

impl SeriesDocument {
    pub fn parse(text: &str) -> Self {
        let lines = text
            .split_inclusive('\n')
            .map(|line| match SeriesEntry::parse(line) {
                Some(entry) => SeriesLine::Entry {
                    entry,
                    raw: Some(line.to_string()),
                },
                None => SeriesLine::Other(line.to_string()),
            })
            .collect();
        Self { lines }
    }

    /// All entries, including commented-out ones.
    pub fn entries(&self) -> impl Iterator<Item = &SeriesEntry> {
        self.lines.iter().filter_map(|line| match line {
            SeriesLine::Entry { entry, .. } => Some(entry),
            SeriesLine::Other(_) => None,
        })
    }

    /// Names of the patches quilt applies, in order.
    pub fn patches(&self) -> impl Iterator<Item = &str> {
        self.entries()
            .filter(|entry| !entry.quoted)
            .map(|entry| entry.name.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.patches().any(|patch| patch == name)
    }

    pub fn append(&mut self, entry: SeriesEntry) {
        if let Some(last) = self.lines.last_mut() {
            let text = match last {
                SeriesLine::Entry { raw: Some(raw), .. } => Some(raw),
                SeriesLine::Other(text) => Some(text),
                SeriesLine::Entry { raw: None, .. } => None,
            };
            if let Some(text) = text {
                if !text.ends_with('\n') {
                    text.push('\n');
                }
            }
        }
        self.lines.push(SeriesLine::Entry { entry, raw: None });
    }

    /// Remove the applied patch `name`. Returns whether it was present.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.lines.len();
        self.lines.retain(|line| {
            !matches!(line, SeriesLine::Entry { entry, .. } if !entry.quoted && entry.name == name)
        });
        self.lines.len() != before
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            match line {
                SeriesLine::Entry { raw: Some(raw), .. } => out.push_str(raw),
                SeriesLine::Entry { entry, raw: None } => {
                    out.push_str(&entry.to_string());
                    out.push('\n');
                }
                SeriesLine::Other(text) => out.push_str(text),
            }
        }
        out
    }
}

impl fmt::Display for SeriesDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// The file suffix most patches in a `debian/patches` listing use.
///
/// `series`, `00list` and `README*` are ignored; `default` is returned when
/// nothing else is left.
pub fn find_common_patch_suffix<'a>(
    names: impl IntoIterator<Item = &'a str>,
    default: &str,
) -> String {
    // First-seen order decides ties.
    let mut counts: Vec<(String, usize)> = Vec::new();
    for name in names {
        if name == "series" || name == "00list" || name.starts_with("README") {
            continue;
        }
        let suffix = Path::new(name)
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        match counts.iter_mut().find(|(seen, _)| *seen == suffix) {
            Some((_, count)) => *count += 1,
            None => counts.push((suffix, 1)),
        }
    }
    counts
        .into_iter()
        .fold(None::<(String, usize)>, |best, (suffix, count)| match best {
            Some((_, top)) if top >= count => best,
            _ => Some((suffix, count)),
        })
        .map(|(suffix, _)| suffix)
        .unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SERIES: &str = "\
# Applied first
01-fix-build.patch
02-docs.diff -p1
#03-disabled.patch

04-last.patch";

    #[test]
    fn test_parse_entries() {
        let document = SeriesDocument::parse(SERIES);
        let patches: Vec<_> = document.patches().collect();
        assert_eq!(patches, ["01-fix-build.patch", "02-docs.diff", "04-last.patch"]);

        let docs = document.entries().find(|e| e.name == "02-docs.diff").unwrap();
        assert_eq!(docs.options, ["-p1"]);
        let disabled = document
            .entries()
            .find(|e| e.name == "03-disabled.patch")
            .unwrap();
        assert!(disabled.quoted);
    }

    #[test]
    fn test_round_trip() {
        assert_eq!(SeriesDocument::parse(SERIES).to_string(), SERIES);
        assert_eq!(SeriesDocument::parse("").to_string(), "");
    }

    #[test]
    fn test_append_and_remove() {
        let mut document = SeriesDocument::parse(SERIES);
        document.append(SeriesEntry::new("05-new.patch"));
        assert!(document.to_string().ends_with("04-last.patch\n05-new.patch\n"));

        assert!(document.remove("01-fix-build.patch"));
        assert!(!document.remove("03-disabled.patch"));
        assert!(!document.contains("01-fix-build.patch"));
        assert!(document.to_string().starts_with("# Applied first\n02-docs.diff -p1\n"));
    }

    #[test]
    fn test_common_suffix() {
        assert_eq!(
            find_common_patch_suffix(["series", "a.patch", "b.diff", "c.diff", "README"], ".patch"),
            ".diff"
        );
        assert_eq!(find_common_patch_suffix(["series"], ".patch"), ".patch");
    }

    #[test]
    fn test_common_suffix_tie_keeps_first_seen() {
        assert_eq!(find_common_patch_suffix(["a.diff", "b.patch"], ".patch"), ".diff");
        assert_eq!(find_common_patch_suffix(["b.patch", "a.diff"], ".diff"), ".patch");
        assert_eq!(
            find_common_patch_suffix(["x.patch", "y.diff", "z.diff", "w.patch", "v.patch"], ".diff"),
            ".patch"
        );
    }
}
