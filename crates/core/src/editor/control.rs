//! Editing `debian/control` and its template.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::format::ControlFormat;
use super::generated::GeneratedFileBinding;
use super::session::{
    read_text, write_atomic, CommitOutcome, EditSession, SessionOptions, StagedWrite,
};
use crate::config::EditorConfig;
use crate::conflict::MergeStrategy;
use crate::control::{ControlDocument, Paragraph};
use crate::errors::{ControlError, EditError};
use crate::template::{diff_documents, ParagraphChange, TemplateReconciler};

pub const DEFAULT_CONTROL_PATH: &str = "debian/control";

/// A callback run on one paragraph by [`update_control`].
pub type ParagraphCallback<'a> = &'a mut dyn FnMut(&mut Paragraph) -> Result<(), ControlError>;

/// An edit of a control file.
///
/// The first paragraph is the source package, the rest are binary
/// packages. When a template (`control.in`) exists, committing applies the
/// edit to the template and regenerates the control file from it.
pub struct ControlEditor {
    session: EditSession<ControlFormat>,
    binding: Option<GeneratedFileBinding>,
    template: Option<String>,
    relation_fields: Vec<String>,
    merger: Arc<dyn MergeStrategy>,
    template_only: bool,
}

impl ControlEditor {
    /// Open with the default configuration.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, EditError> {
        Self::open_with(path, &EditorConfig::default())
    }

    pub fn open_with(path: impl AsRef<Path>, config: &EditorConfig) -> Result<Self, EditError> {
        Self::start(path.as_ref(), config, false)
    }

    /// Like [`open`](Self::open), but a missing file starts out empty.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, EditError> {
        Self::create_with(path, &EditorConfig::default())
    }

    pub fn create_with(path: impl AsRef<Path>, config: &EditorConfig) -> Result<Self, EditError> {
        Self::start(path.as_ref(), config, true)
    }

    fn start(path: &Path, config: &EditorConfig, allow_missing: bool) -> Result<Self, EditError> {
        let binding = GeneratedFileBinding::discover(
            path,
            &config.template.suffix,
            config.substitution_rule(),
        );
        let mut options = SessionOptions::from_config(config)?;
        options.allow_generated = binding.is_some();

        let template = binding
            .as_ref()
            .map(|b| read_text(&b.template_path))
            .transpose()?;
        let template_only = binding.is_some() && !path.exists();

        let session = match (&binding, &template) {
            (Some(binding), Some(template)) if template_only => {
                // Edit what the template would generate.
                let expanded = binding.rule.expand(template);
                let source = expanded.as_deref().unwrap_or(template);
                EditSession::from_source(path, None, Some(source), options)?
            }
            _ if allow_missing => EditSession::create(path, options)?,
            _ => EditSession::open(path, options)?,
        };

        Ok(Self {
            session,
            binding,
            template,
            relation_fields: config.relations.fields.clone(),
            merger: config.merge_strategy(),
            template_only,
        })
    }

    pub fn path(&self) -> &Path {
        self.session.path()
    }

    pub fn binding(&self) -> Option<&GeneratedFileBinding> {
        self.binding.as_ref()
    }

    pub fn is_generated(&self) -> bool {
        self.session.is_generated()
    }

    pub fn document(&self) -> &ControlDocument {
        self.session.document()
    }

    pub fn document_mut(&mut self) -> Result<&mut ControlDocument, EditError> {
        self.session.document_mut()
    }

    pub fn source(&self) -> Option<&Paragraph> {
        self.document().paragraphs().first()
    }

    /// The source paragraph, created if the file is empty.
    pub fn source_mut(&mut self) -> Result<&mut Paragraph, EditError> {
        Ok(self.document_mut()?.first_or_insert())
    }

    pub fn binaries(&self) -> impl Iterator<Item = &Paragraph> {
        self.document().paragraphs().iter().skip(1)
    }

    pub fn binaries_mut(&mut self) -> Result<impl Iterator<Item = &mut Paragraph>, EditError> {
        Ok(self.document_mut()?.paragraphs_mut().iter_mut().skip(1))
    }

    pub fn binary(&self, package: &str) -> Option<&Paragraph> {
        self.binaries().find(|p| p.get("Package") == Some(package))
    }

    pub fn binary_mut(&mut self, package: &str) -> Result<Option<&mut Paragraph>, EditError> {
        Ok(self.binaries_mut()?.find(|p| p.get("Package") == Some(package)))
    }

    /// Append a binary package paragraph.
    pub fn add_binary<'a>(
        &mut self,
        fields: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<(), EditError> {
        let paragraph =
            Paragraph::from_fields(fields).map_err(|e| EditError::from_control(self.path(), e))?;
        self.document_mut()?.push_paragraph(paragraph);
        Ok(())
    }

    /// What the edit changed so far, paragraph by paragraph.
    pub fn changes(&self) -> Vec<ParagraphChange> {
        diff_documents(self.session.baseline(), self.session.document())
    }

    pub fn commit(self) -> Result<CommitOutcome, EditError> {
        let (Some(binding), Some(template_text)) = (self.binding, self.template) else {
            return self.session.commit();
        };
        if !self.session.is_modified() {
            info!(path = %self.session.path().display(), "no changes to write");
            return Ok(CommitOutcome::Unchanged);
        }

        let reconciler = TemplateReconciler::with_default_resolvers(
            binding.rule.clone(),
            self.relation_fields,
            self.merger,
        );
        if let Some(original) = self.session.original() {
            let in_sync = reconciler.in_sync(&template_text, original);
            debug!(
                template = %binding.template_path.display(),
                in_sync,
                "checked generated file against template"
            );
        }

        let mut template =
            ControlDocument::parse(&template_text).map_err(|source| EditError::FileFormat {
                path: binding.template_path.clone(),
                source,
            })?;
        let changes = diff_documents(self.session.baseline(), self.session.document());
        reconciler
            .apply(&mut template, &changes)
            .map_err(|e| EditError::unpreservable(&binding.template_path, e.to_string()))?;
        let new_template = template.render();

        let generated = (!self.template_only).then(|| {
            binding
                .rule
                .expand(&new_template)
                .unwrap_or_else(|| self.session.render())
        });

        // Both files are staged before either is replaced.
        let staged_template = StagedWrite::new(&binding.template_path, &new_template)?;
        let staged_generated = generated
            .as_deref()
            .map(|content| StagedWrite::new(self.session.path(), content))
            .transpose()?;
        staged_template.persist()?;
        if let Some(staged) = staged_generated {
            let target = staged.path().to_path_buf();
            if let Err(e) = staged.persist() {
                warn!(
                    generated = %target.display(),
                    error = %e,
                    "failed to replace generated file, restoring template"
                );
                write_atomic(&binding.template_path, &template_text)?;
                return Err(e);
            }
        }
        info!(
            template = %binding.template_path.display(),
            changes = changes.len(),
            generated_written = generated.is_some(),
            "updated template"
        );
        Ok(CommitOutcome::TemplateUpdated {
            generated_written: generated.is_some(),
        })
    }
}

/// Run `source_cb` on the source paragraph and `binary_cb` on every binary
/// paragraph, then commit. Returns whether anything changed.
pub fn update_control(
    path: impl AsRef<Path>,
    config: &EditorConfig,
    source_cb: Option<ParagraphCallback<'_>>,
    binary_cb: Option<ParagraphCallback<'_>>,
) -> Result<bool, EditError> {
    let path = path.as_ref();
    let mut editor = ControlEditor::open_with(path, config)?;
    if let Some(callback) = source_cb {
        callback(editor.source_mut()?).map_err(|e| EditError::from_control(path, e))?;
    }
    if let Some(callback) = binary_cb {
        for paragraph in editor.binaries_mut()? {
            callback(paragraph).map_err(|e| EditError::from_control(path, e))?;
        }
    }
    Ok(editor.commit()?.changed())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("control");
        std::fs::write(
            &path,
            "Source: blah\n\nPackage: libblah\nSection: libs\n\nPackage: blah-tools\n",
        )
        .unwrap();

        let mut editor = ControlEditor::open(&path).unwrap();
        assert_eq!(editor.source().and_then(|s| s.get("Source")), Some("blah"));
        assert_eq!(editor.binaries().count(), 2);
        assert_eq!(
            editor.binary("libblah").and_then(|p| p.get("Section")),
            Some("libs")
        );
        assert!(editor.binary("missing").is_none());

        editor
            .binary_mut("blah-tools")
            .unwrap()
            .unwrap()
            .set("Section", "utils")
            .unwrap();
        assert_eq!(editor.changes().len(), 1);
        assert_eq!(editor.commit().unwrap(), CommitOutcome::Written);
        assert!(std::fs::read_to_string(&path)
            .unwrap()
            .ends_with("Package: blah-tools\nSection: utils\n"));
    }

    #[test]
    fn test_add_binary_rejects_bad_field_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("control");
        std::fs::write(&path, "Source: blah\n").unwrap();
        let mut editor = ControlEditor::open(&path).unwrap();
        let err = editor.add_binary([("Bad Name", "x")]).unwrap_err();
        assert!(matches!(err, EditError::FileFormat { .. }));
    }
}
