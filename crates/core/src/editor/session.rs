//! Edit sessions: read, mutate, commit.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use super::format::EditableFormat;
use super::generated::GeneratedMarkers;
use crate::config::EditorConfig;
use crate::conflict::{MergeStrategy, Merger};
use crate::errors::{ConfigError, ControlError, EditError};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Lifecycle of an [`EditSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Opened,
    Parsed,
    Mutated,
    Serialized,
    Written,
    Unchanged,
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Opened => write!(f, "opened"),
            Self::Parsed => write!(f, "parsed"),
            Self::Mutated => write!(f, "mutated"),
            Self::Serialized => write!(f, "serialized"),
            Self::Written => write!(f, "written"),
            Self::Unchanged => write!(f, "unchanged"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// What a commit did on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Nothing changed; no file was touched.
    Unchanged,
    /// The file was rewritten.
    Written,
    /// The change was carried into the template; the generated file was
    /// rewritten too unless only the template exists.
    TemplateUpdated { generated_written: bool },
}

impl CommitOutcome {
    pub fn changed(self) -> bool {
        self != Self::Unchanged
    }
}

impl fmt::Display for CommitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unchanged => write!(f, "unchanged"),
            Self::Written => write!(f, "written"),
            Self::TemplateUpdated {
                generated_written: true,
            } => write!(f, "template and generated file updated"),
            Self::TemplateUpdated {
                generated_written: false,
            } => write!(f, "template updated"),
        }
    }
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

pub struct SessionOptions {
    pub markers: GeneratedMarkers,
    /// Used when the format cannot render the original text verbatim.
    pub merger: Arc<dyn MergeStrategy>,
    /// Hand out mutable access to generated files. Set when a template
    /// binding will receive the edit instead.
    pub allow_generated: bool,
}

impl SessionOptions {
    pub fn from_config(config: &EditorConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            markers: config.generated_markers()?,
            merger: config.merge_strategy(),
            allow_generated: false,
        })
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            markers: GeneratedMarkers::default(),
            merger: Arc::new(Merger),
            allow_generated: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One edit of one file.
///
/// Dropping a session without calling [`commit`](Self::commit) leaves the
/// file untouched.
pub struct EditSession<F: EditableFormat> {
    path: PathBuf,
    original: Option<String>,
    baseline: F::Document,
    document: F::Document,
    generated: bool,
    allow_generated: bool,
    state: SessionState,
    merger: Arc<dyn MergeStrategy>,
}

impl<F: EditableFormat> std::fmt::Debug for EditSession<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditSession")
            .field("path", &self.path)
            .field("original", &self.original)
            .field("baseline", &self.baseline)
            .field("document", &self.document)
            .field("generated", &self.generated)
            .field("allow_generated", &self.allow_generated)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<F: EditableFormat> EditSession<F> {
    /// Open an existing file.
    pub fn open(path: impl AsRef<Path>, options: SessionOptions) -> Result<Self, EditError> {
        let path = path.as_ref();
        let original = read_text(path)?;
        Self::from_source(path, Some(original.clone()), Some(&original), options)
    }

    /// Open a file that may not exist yet; a missing file starts empty.
    pub fn create(path: impl AsRef<Path>, options: SessionOptions) -> Result<Self, EditError> {
        let path = path.as_ref();
        if path.exists() {
            return Self::open(path, options);
        }
        Self::from_source(path, None, None, options)
    }

    /// Build a session whose baseline is parsed from `source`, which may
    /// differ from the bytes on disk (`original`).
    pub(crate) fn from_source(
        path: &Path,
        original: Option<String>,
        source: Option<&str>,
        options: SessionOptions,
    ) -> Result<Self, EditError> {
        let mut session = Self {
            path: path.to_path_buf(),
            original,
            baseline: F::empty(),
            document: F::empty(),
            generated: false,
            allow_generated: options.allow_generated,
            state: SessionState::Opened,
            merger: options.merger,
        };
        if let Some(source) = source {
            session.generated = options.markers.is_generated(source);
            session.baseline = F::parse(source).map_err(|source| EditError::FileFormat {
                path: path.to_path_buf(),
                source,
            })?;
            session.document = session.baseline.clone();
        }
        session.state = SessionState::Parsed;
        info!(
            path = %path.display(),
            format = F::NAME,
            exists = session.original.is_some(),
            generated = session.generated,
            "opened edit session"
        );
        Ok(session)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_generated(&self) -> bool {
        self.generated
    }

    /// The bytes on disk when the session started, if the file existed.
    pub fn original(&self) -> Option<&str> {
        self.original.as_deref()
    }

    pub fn baseline(&self) -> &F::Document {
        &self.baseline
    }

    pub fn document(&self) -> &F::Document {
        &self.document
    }

    /// Mutable access to the working document.
    ///
    /// Fails with [`EditError::GeneratedFile`] for a generated file that no
    /// template binding takes edits for.
    pub fn document_mut(&mut self) -> Result<&mut F::Document, EditError> {
        if self.generated && !self.allow_generated {
            return Err(EditError::GeneratedFile {
                path: self.path.clone(),
            });
        }
        self.state = SessionState::Mutated;
        Ok(&mut self.document)
    }

    pub fn render(&self) -> String {
        F::serialize(&self.document)
    }

    pub fn is_modified(&self) -> bool {
        self.document != self.baseline && self.render() != F::serialize(&self.baseline)
    }

    /// Write the working document back.
    pub fn commit(mut self) -> Result<CommitOutcome, EditError> {
        let result = self.commit_inner();
        if result.is_err() {
            self.state = SessionState::Failed;
        }
        debug!(path = %self.path.display(), state = %self.state, "edit session finished");
        result
    }

    fn commit_inner(&mut self) -> Result<CommitOutcome, EditError> {
        let rendered = self.render();
        self.state = SessionState::Serialized;
        let baseline_rendered = F::serialize(&self.baseline);

        if rendered == baseline_rendered {
            info!(path = %self.path.display(), "no changes to write");
            self.state = SessionState::Unchanged;
            return Ok(CommitOutcome::Unchanged);
        }
        if self.generated {
            return Err(EditError::unpreservable(
                &self.path,
                "file is generated and has no template",
            ));
        }

        let content = match self.original.as_deref() {
            None => rendered,
            Some(original) if original == baseline_rendered => rendered,
            Some(original) => {
                debug!(path = %self.path.display(), "format is lossy, merging change into original");
                self.merger
                    .merge(&baseline_rendered, original, &rendered)
                    .map_err(|e| EditError::unpreservable(&self.path, e.to_string()))?
            }
        };

        write_atomic(&self.path, &content)?;
        self.state = SessionState::Written;
        info!(path = %self.path.display(), bytes = content.len(), "wrote file");
        Ok(CommitOutcome::Written)
    }
}

// ---------------------------------------------------------------------------
// File helpers
// ---------------------------------------------------------------------------

pub(crate) fn read_text(path: &Path) -> Result<String, EditError> {
    let bytes = std::fs::read(path).map_err(|e| EditError::io(path, e))?;
    String::from_utf8(bytes).map_err(|e| {
        let valid = e.utf8_error().valid_up_to();
        let line = e.as_bytes()[..valid].iter().filter(|b| **b == b'\n').count() + 1;
        EditError::FileFormat {
            path: path.to_path_buf(),
            source: ControlError::FileFormat {
                line,
                detail: "not valid UTF-8".to_string(),
            },
        }
    })
}

/// Replace `path` with `content` via a temporary file in the same
/// directory. Existing permissions are kept.
pub(crate) fn write_atomic(path: &Path, content: &str) -> Result<(), EditError> {
    StagedWrite::new(path, content)?.persist()
}

/// A replacement written out in full next to its target, not yet moved
/// into place. Dropping it removes the temp file.
pub(crate) struct StagedWrite {
    path: PathBuf,
    tmp: tempfile::NamedTempFile,
}

impl StagedWrite {
    pub(crate) fn new(path: &Path, content: &str) -> Result<Self, EditError> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| EditError::io(path, e))?;
        tmp.write_all(content.as_bytes())
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| EditError::io(path, e))?;
        if let Ok(metadata) = std::fs::metadata(path) {
            tmp.as_file()
                .set_permissions(metadata.permissions())
                .map_err(|e| EditError::io(path, e))?;
        }
        Ok(Self {
            path: path.to_path_buf(),
            tmp,
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn persist(self) -> Result<(), EditError> {
        let Self { path, tmp } = self;
        tmp.persist(&path).map_err(|e| EditError::io(&path, e.error))?;
        debug!(path = %path.display(), "replaced file atomically");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict::NoMerge;
    use crate::control::ControlDocument;
    use crate::editor::format::ControlFormat;

    /// A lossy format: collapses runs of whitespace within each line.
    struct SquashFormat;

    impl EditableFormat for SquashFormat {
        type Document = Vec<(String, String)>;
        const NAME: &'static str = "squash";

        fn parse(text: &str) -> Result<Self::Document, ControlError> {
            Ok(text
                .lines()
                .filter_map(|line| {
                    let mut words = line.split_whitespace();
                    let key = words.next()?;
                    Some((key.to_string(), words.collect::<Vec<_>>().join(" ")))
                })
                .collect())
        }

        fn serialize(document: &Self::Document) -> String {
            document.iter().map(|(k, v)| format!("{k} {v}\n")).collect()
        }

        fn empty() -> Self::Document {
            Vec::new()
        }
    }

    fn write(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_unchanged_commit() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "control", "Source: foo\n");
        let session = EditSession::<ControlFormat>::open(&path, SessionOptions::default()).unwrap();
        assert_eq!(session.state(), SessionState::Parsed);
        assert_eq!(session.commit().unwrap(), CommitOutcome::Unchanged);
    }

    #[test]
    fn test_lossless_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "control", "Source: foo\n# keep me\nSection: libs\n");
        let mut session =
            EditSession::<ControlFormat>::open(&path, SessionOptions::default()).unwrap();
        session.document_mut().unwrap().paragraphs_mut()[0]
            .set("Section", "devel")
            .unwrap();
        assert!(session.is_modified());
        assert_eq!(session.commit().unwrap(), CommitOutcome::Written);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "Source: foo\n# keep me\nSection: devel\n"
        );
    }

    #[test]
    fn test_lossy_format_merges() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "list", "a  1\nb 2\nc 3\nd 4\ne 5\n");
        let mut session = EditSession::<SquashFormat>::open(&path, SessionOptions::default()).unwrap();
        session.document_mut().unwrap()[4].1 = "6".to_string();
        assert_eq!(session.commit().unwrap(), CommitOutcome::Written);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "a  1\nb 2\nc 3\nd 4\ne 6\n"
        );
    }

    #[test]
    fn test_lossy_format_without_merge_fails() {
        let dir = tempfile::tempdir().unwrap();
        let original = "a  1\nb 2\nc 3\nd 4\ne 5\n";
        let path = write(&dir, "list", original);
        let options = SessionOptions {
            merger: Arc::new(NoMerge),
            ..SessionOptions::default()
        };
        let mut session = EditSession::<SquashFormat>::open(&path, options).unwrap();
        session.document_mut().unwrap()[4].1 = "6".to_string();
        let err = session.commit().unwrap_err();
        assert!(matches!(err, EditError::FormattingUnpreservable { .. }));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), original);
    }

    #[test]
    fn test_generated_file_refuses_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "control", "# DO NOT EDIT\nSource: foo\n");
        let mut session =
            EditSession::<ControlFormat>::open(&path, SessionOptions::default()).unwrap();
        assert!(session.is_generated());
        assert_eq!(
            session.document().paragraphs()[0].get("Source"),
            Some("foo")
        );
        assert!(matches!(
            session.document_mut(),
            Err(EditError::GeneratedFile { .. })
        ));
        assert_eq!(session.commit().unwrap(), CommitOutcome::Unchanged);
    }

    #[test]
    fn test_create_and_open_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("control");
        assert!(matches!(
            EditSession::<ControlFormat>::open(&path, SessionOptions::default()),
            Err(EditError::Io { .. })
        ));

        let mut session =
            EditSession::<ControlFormat>::create(&path, SessionOptions::default()).unwrap();
        assert_eq!(session.original(), None);
        session
            .document_mut()
            .unwrap()
            .first_or_insert()
            .set("Source", "foo")
            .unwrap();
        assert_eq!(session.commit().unwrap(), CommitOutcome::Written);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Source: foo\n");
    }

    #[test]
    fn test_drop_without_commit() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "control", "Source: foo\n");
        {
            let mut session =
                EditSession::<ControlFormat>::open(&path, SessionOptions::default()).unwrap();
            *session.document_mut().unwrap() = ControlDocument::parse("Source: bar\n").unwrap();
        }
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Source: foo\n");
    }

    #[test]
    fn test_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("control");
        std::fs::write(&path, b"Source: foo\nMaintainer: \xff\n").unwrap();
        let err = EditSession::<ControlFormat>::open(&path, SessionOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            EditError::FileFormat {
                source: ControlError::FileFormat { line: 2, .. },
                ..
            }
        ));
    }
}
