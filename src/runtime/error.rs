//! Error types for the processor runtime

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::interpreter::ParseError;

use super::config::Feature;

/// Why an instruction was not added to the program.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProgramError {
    /// The text did not lex or parse.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Not enough instruction memory left.
    #[error("instruction needs {cost} words but only {remaining} remain")]
    OverBudget {
        /// Word cost of the rejected instruction.
        cost: usize,
        /// Words left in the program.
        remaining: usize,
    },

    /// The instruction uses a capability this processor lacks.
    #[error("processor does not support {0}")]
    Unsupported(Feature),
}

/// Persistence errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Saved program was written by an incompatible format version
    #[error("Unsupported program format version {found} (expected {expected})")]
    VersionMismatch {
        /// Version found on disk
        found: u32,
        /// Version this build writes
        expected: u32,
    },

    /// Stored checksum does not match the program contents
    #[error("Checksum mismatch: stored {stored}, computed {computed}")]
    ChecksumMismatch {
        /// Checksum recorded in the file
        stored: String,
        /// Checksum of the loaded record
        computed: String,
    },

    /// Filesystem operation failed
    #[error("IO error at {}: {source}", path.display())]
    Io {
        /// File or directory involved
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },

    /// A stored file is not valid JSON for its type
    #[error("Malformed {}: {source}", path.display())]
    Corrupt {
        /// File that failed to decode
        path: PathBuf,
        /// Underlying error
        source: serde_json::Error,
    },

    /// Serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StorageError {
    pub(crate) fn io(path: &Path) -> impl FnOnce(io::Error) -> Self + '_ {
        move |source| StorageError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn corrupt(path: &Path) -> impl FnOnce(serde_json::Error) -> Self + '_ {
        move |source| StorageError::Corrupt {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Convenience result alias for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;
