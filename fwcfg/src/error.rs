use thiserror::Error;
use xml_edit_core::{EditError, ParseError, WriteError};

use crate::reload::ReloadError;

/// Failures of a configuration mutation.
///
/// None of these are retried. Once the document has been written, a later
/// failure leaves it written; the snapshot is the recovery path.
#[derive(Debug, Error)]
pub enum OpError {
    /// Missing or malformed input.
    #[error("invalid input: {0}")]
    Validation(String),
    /// A referenced entity does not exist in the document.
    #[error("{0} not found")]
    NotFound(String),
    /// The collection an insert targets is absent from the document.
    #[error("configuration has no <{0}> section")]
    MissingSection(String),
    /// The insert would collide with an existing entry of a different identity.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Copying the document aside before mutation failed.
    #[error("failed to snapshot {path}: {source}")]
    Snapshot {
        path: String,
        source: std::io::Error,
    },
    /// The document could not be read or parsed.
    #[error("failed to load {path}: {source}")]
    Load { path: String, source: ParseError },
    /// The mutated document could not be written.
    #[error("failed to write {path}: {source}")]
    Save { path: String, source: WriteError },
    #[error(transparent)]
    Edit(#[from] EditError),
    #[error(transparent)]
    Reload(#[from] ReloadError),
}
