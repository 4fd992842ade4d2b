//! Editing quilt `series` files.

use std::path::Path;

use super::format::SeriesFormat;
use super::session::{CommitOutcome, EditSession, SessionOptions};
use crate::config::EditorConfig;
use crate::errors::EditError;
use crate::series::{SeriesDocument, SeriesEntry};

pub const DEFAULT_SERIES_PATH: &str = "debian/patches/series";

pub struct SeriesEditor {
    session: EditSession<SeriesFormat>,
}

impl SeriesEditor {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, EditError> {
        Self::open_with(path, &EditorConfig::default())
    }

    pub fn open_with(path: impl AsRef<Path>, config: &EditorConfig) -> Result<Self, EditError> {
        let session = EditSession::open(path, SessionOptions::from_config(config)?)?;
        Ok(Self { session })
    }

    /// Open a series file, starting empty if it does not exist.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, EditError> {
        let session = EditSession::create(path, SessionOptions::default())?;
        Ok(Self { session })
    }

    pub fn series(&self) -> &SeriesDocument {
        self.session.document()
    }

    pub fn series_mut(&mut self) -> Result<&mut SeriesDocument, EditError> {
        self.session.document_mut()
    }

    /// Append `name` unless the series already lists it.
    pub fn append(&mut self, name: &str) -> Result<bool, EditError> {
        if self.series().contains(name) {
            return Ok(false);
        }
        self.series_mut()?.append(SeriesEntry::new(name));
        Ok(true)
    }

    pub fn remove(&mut self, name: &str) -> Result<bool, EditError> {
        if !self.series().contains(name) {
            return Ok(false);
        }
        Ok(self.series_mut()?.remove(name))
    }

    pub fn commit(self) -> Result<CommitOutcome, EditError> {
        self.session.commit()
    }
}
