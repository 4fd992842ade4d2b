//! Generated files and the templates they come from.

use std::path::{Path, PathBuf};

use regex_lite::Regex;
use tracing::debug;

use crate::errors::ConfigError;
use crate::template::SubstitutionRule;

/// Patterns recognised in the first lines of a generated file.
pub const DEFAULT_MARKERS: [&str; 3] = [
    r"(?i)^#\s*DO NOT EDIT",
    r"(?i)^#.*\bthis file (?:was|is) (?:auto-?)?generated\b",
    r"(?i)^#.*\bautogenerated\b",
];

/// How many leading lines are checked for a marker.
const SNIFF_LINES: usize = 2;

/// Compiled "this file is generated" markers.
#[derive(Debug, Clone)]
pub struct GeneratedMarkers {
    patterns: Vec<Regex>,
}

impl GeneratedMarkers {
    pub fn from_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Self, ConfigError> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Regex::new(p.as_ref()).map_err(|e| ConfigError::InvalidValue {
                    field: "generated.markers".into(),
                    detail: format!("'{}': {e}", p.as_ref()),
                })
            })
            .collect::<Result<_, _>>()?;
        Ok(Self { patterns })
    }

    /// No markers: nothing is treated as generated.
    pub fn none() -> Self {
        Self {
            patterns: Vec::new(),
        }
    }

    pub fn is_generated(&self, text: &str) -> bool {
        text.lines()
            .take(SNIFF_LINES)
            .any(|line| self.patterns.iter().any(|p| p.is_match(line.trim_end())))
    }
}

impl Default for GeneratedMarkers {
    fn default() -> Self {
        Self::from_patterns(&DEFAULT_MARKERS).unwrap_or_else(|_| Self::none())
    }
}

/// A generated file, the template it is built from, and the values that
/// fill the template's placeholders.
#[derive(Debug, Clone)]
pub struct GeneratedFileBinding {
    pub generated_path: PathBuf,
    pub template_path: PathBuf,
    pub rule: SubstitutionRule,
}

impl GeneratedFileBinding {
    /// Path of the template for `generated`: the same name plus `suffix`.
    pub fn template_path_for(generated: &Path, suffix: &str) -> PathBuf {
        let mut name = generated.as_os_str().to_owned();
        name.push(suffix);
        PathBuf::from(name)
    }

    /// Bind `generated` to its template if the template exists.
    pub fn discover(generated: &Path, suffix: &str, rule: SubstitutionRule) -> Option<Self> {
        let template_path = Self::template_path_for(generated, suffix);
        if !template_path.is_file() {
            return None;
        }
        debug!(template = %template_path.display(), "found template");
        Some(Self {
            generated_path: generated.to_path_buf(),
            template_path,
            rule,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_markers() {
        let markers = GeneratedMarkers::default();
        assert!(markers.is_generated("# DO NOT EDIT\nSource: foo\n"));
        assert!(markers.is_generated("#!/usr/bin/make\n# This file was generated by blah\n"));
        assert!(markers.is_generated("# This file is autogenerated. Do not edit.\n"));
        assert!(markers.is_generated("# This file is auto-generated by gen-control\n"));
        assert!(markers.is_generated("Source: foo\n# DO NOT EDIT\n"));
        assert!(!markers.is_generated("Source: foo\nMaintainer: Joe\n# DO NOT EDIT\n"));
        assert!(!markers.is_generated("# Edit freely\nSource: foo\n"));
    }

    #[test]
    fn test_invalid_marker_pattern() {
        let err = GeneratedMarkers::from_patterns(&["("]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_discover() {
        let dir = tempfile::tempdir().unwrap();
        let control = dir.path().join("control");
        assert!(GeneratedFileBinding::discover(&control, ".in", SubstitutionRule::new()).is_none());

        std::fs::write(dir.path().join("control.in"), "Source: foo\n").unwrap();
        let binding =
            GeneratedFileBinding::discover(&control, ".in", SubstitutionRule::new()).unwrap();
        assert_eq!(binding.template_path, dir.path().join("control.in"));
        assert_eq!(binding.generated_path, control);
    }
}
