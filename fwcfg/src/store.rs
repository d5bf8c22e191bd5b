use std::path::{Path, PathBuf};

use tracing::debug;
use xml_edit_core::Document;

use crate::error::OpError;
use crate::snapshot::Snapshot;

/// Handle to one configuration document on disk.
///
/// Nothing here locks the file. Callers must serialize mutating operations
/// against the same document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigStore {
    path: PathBuf,
    backup_dir: Option<PathBuf>,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            backup_dir: None,
        }
    }

    /// Store snapshots in `dir` instead of next to the document.
    pub fn with_backup_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.backup_dir = Some(dir.into());
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> Result<Snapshot, OpError> {
        Snapshot::take(&self.path, self.backup_dir.as_deref()).map_err(|source| {
            OpError::Snapshot {
                path: self.path.display().to_string(),
                source,
            }
        })
    }

    pub fn load(&self) -> Result<Document, OpError> {
        debug!(path = %self.path.display(), "loading configuration");
        Document::open(&self.path).map_err(|source| OpError::Load {
            path: self.path.display().to_string(),
            source,
        })
    }

    pub fn commit(&self, doc: &Document) -> Result<(), OpError> {
        doc.save(&self.path).map_err(|source| OpError::Save {
            path: self.path.display().to_string(),
            source,
        })?;
        debug!(path = %self.path.display(), "configuration written");
        Ok(())
    }
}
