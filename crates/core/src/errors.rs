//! Error types for the controledit core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.

use std::path::PathBuf;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Version(#[from] VersionError),

    #[error(transparent)]
    Relation(#[from] RelationError),

    #[error(transparent)]
    Control(#[from] ControlError),

    #[error(transparent)]
    Conflict(#[from] ConflictError),

    #[error(transparent)]
    Edit(#[from] EditError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Version errors
// ---------------------------------------------------------------------------

/// Errors from parsing package version strings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    /// The version string was empty.
    #[error("empty version string")]
    Empty,

    /// The part before the first `:` is not a number.
    #[error("invalid epoch in version '{0}'")]
    InvalidEpoch(String),

    /// The upstream component is empty (e.g. `1:` or `-1`).
    #[error("missing upstream version in '{0}'")]
    MissingUpstream(String),

    /// A character that may not appear in a version.
    #[error("invalid character {ch:?} in version '{version}'")]
    InvalidCharacter { version: String, ch: char },
}

// ---------------------------------------------------------------------------
// Relation errors
// ---------------------------------------------------------------------------

/// Errors from the relation algebra.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelationError {
    /// The relation text is malformed.
    #[error("failed to parse relation '{input}': {detail}")]
    Parse { input: String, detail: String },

    /// The requested package is not mentioned.
    #[error("no relation for package '{0}'")]
    NotFound(String),

    /// The package only appears in a clause that cannot be substituted as a
    /// whole, such as an OR-group.
    #[error("complex relation for package '{package}': {detail}")]
    Ambiguous { package: String, detail: String },

    /// An insertion position past the end of the clause list.
    #[error("position {position} is out of range for {len} clauses")]
    InvalidPosition { position: usize, len: usize },

    /// A version passed by the caller is invalid.
    #[error(transparent)]
    Version(#[from] VersionError),
}

impl RelationError {
    pub(crate) fn parse(input: &str, detail: impl Into<String>) -> Self {
        Self::Parse {
            input: input.to_string(),
            detail: detail.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Control file errors
// ---------------------------------------------------------------------------

/// Errors from the deb822 paragraph model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControlError {
    /// The text does not follow the paragraph/field grammar.
    #[error("invalid control file syntax at line {line}: {detail}")]
    FileFormat { line: usize, detail: String },

    /// A field appears twice in one paragraph.
    #[error("duplicate field '{name}' at line {line}")]
    DuplicateField { name: String, line: usize },

    /// A field name that cannot be written back.
    #[error("invalid field name '{0}'")]
    InvalidFieldName(String),

    /// The field carries comment lines between its continuation lines; a new
    /// value would have to drop them.
    #[error("field '{0}' contains embedded comments that cannot be preserved")]
    EmbeddedComments(String),
}

// ---------------------------------------------------------------------------
// Conflict errors
// ---------------------------------------------------------------------------

/// Errors from the conflict resolution subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConflictError {
    /// No resolver could reconcile the template with the generated change.
    #[error("conflicting change to '{field}' in paragraph {paragraph}: {detail}")]
    Unresolvable {
        paragraph: String,
        field: String,
        detail: String,
    },

    /// A new relation cannot be placed in the template without guessing.
    #[error("cannot place '{relation}' in template field '{field}': {detail}")]
    AmbiguousPlacement {
        field: String,
        relation: String,
        detail: String,
    },

    /// Three-way merge failed.
    #[error("three-way merge failed: {0}")]
    MergeFailed(String),

    /// A value involved in the conflict is not a valid relation.
    #[error(transparent)]
    Relation(#[from] RelationError),
}

// ---------------------------------------------------------------------------
// Edit session errors
// ---------------------------------------------------------------------------

/// Errors from an edit session. Any of them aborts the session before a
/// single byte is written.
#[derive(Debug, Error)]
pub enum EditError {
    /// The file is marked as generated and has no template to edit instead.
    #[error("'{}' is generated; edit its template instead", path.display())]
    GeneratedFile { path: PathBuf },

    /// The change is valid but cannot be written without losing or guessing
    /// formatting.
    #[error("unable to preserve formatting of '{}': {reason}", path.display())]
    FormattingUnpreservable { path: PathBuf, reason: String },

    /// The file does not parse.
    #[error("'{}' is not a valid file: {source}", path.display())]
    FileFormat {
        path: PathBuf,
        #[source]
        source: ControlError,
    },

    /// A relation operation failed.
    #[error(transparent)]
    Relation(#[from] RelationError),

    /// The editor configuration is unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Generic I/O wrapper.
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl EditError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn unpreservable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::FormattingUnpreservable {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Map a paragraph-model error raised while editing `path`.
    ///
    /// Embedded comments are a formatting problem, everything else means the
    /// document itself is unusable.
    pub(crate) fn from_control(path: impl Into<PathBuf>, err: ControlError) -> Self {
        let path = path.into();
        match err {
            ControlError::EmbeddedComments(_) => Self::FormattingUnpreservable {
                path,
                reason: err.to_string(),
            },
            other => Self::FileFormat {
                path,
                source: other,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = RelationError::NotFound("debhelper".into());
        assert_eq!(err.to_string(), "no relation for package 'debhelper'");

        let err = EditError::GeneratedFile {
            path: PathBuf::from("debian/control"),
        };
        assert_eq!(
            err.to_string(),
            "'debian/control' is generated; edit its template instead"
        );

        let err = ControlError::DuplicateField {
            name: "Source".into(),
            line: 3,
        };
        assert!(err.to_string().contains("line 3"));
    }

    #[test]
    fn test_embedded_comment_maps_to_unpreservable() {
        let err = EditError::from_control(
            "debian/control",
            ControlError::EmbeddedComments("Build-Depends".into()),
        );
        assert!(matches!(err, EditError::FormattingUnpreservable { .. }));

        let err = EditError::from_control(
            "debian/control",
            ControlError::InvalidFieldName("a b".into()),
        );
        assert!(matches!(err, EditError::FileFormat { .. }));
    }

    #[test]
    fn test_core_error_from_subsystem() {
        let err: CoreError = VersionError::Empty.into();
        assert!(matches!(err, CoreError::Version(_)));

        let err: CoreError = RelationError::NotFound("foo".into()).into();
        assert!(matches!(err, CoreError::Relation(_)));
    }
}
