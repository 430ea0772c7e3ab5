//! Filesystem persistence for processor configuration and programs
//!
//! Everything lives under one root directory: `config.json` holds the
//! [`ProcessorConfig`], `program.json` a checksummed [`SavedProgram`].
//! Writes go through a temp file and a rename so a crash never leaves a
//! half-written file behind.

use blake3::Hasher;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::config::ProcessorConfig;
use super::error::{StorageError, StorageResult};
use super::program::ProgramRecord;

/// Format version written by this build.
pub const PROGRAM_FORMAT_VERSION: u32 = 1;

/// On-disk envelope around a [`ProgramRecord`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedProgram {
    /// Format version.
    pub version: u32,
    /// When the program was written (informational).
    pub saved_at: DateTime<Utc>,
    /// Number of instructions in `program`.
    pub instruction_count: usize,
    /// Blake3 hex digest of the serialized `program`.
    pub checksum: String,
    /// The program itself.
    pub program: ProgramRecord,
}

impl SavedProgram {
    /// Wrap a record, stamping time and checksum.
    pub fn new(program: ProgramRecord) -> StorageResult<Self> {
        Ok(Self {
            version: PROGRAM_FORMAT_VERSION,
            saved_at: Utc::now(),
            instruction_count: program.0.len(),
            checksum: checksum(&program)?,
            program,
        })
    }

    /// Check version and checksum, yielding the record.
    pub fn verify(self) -> StorageResult<ProgramRecord> {
        if self.version != PROGRAM_FORMAT_VERSION {
            return Err(StorageError::VersionMismatch {
                found: self.version,
                expected: PROGRAM_FORMAT_VERSION,
            });
        }
        let computed = checksum(&self.program)?;
        if computed != self.checksum {
            return Err(StorageError::ChecksumMismatch {
                stored: self.checksum,
                computed,
            });
        }
        Ok(self.program)
    }
}

fn checksum(program: &ProgramRecord) -> StorageResult<String> {
    let mut hasher = Hasher::new();
    hasher.update(&serde_json::to_vec(program)?);
    Ok(hasher.finalize().to_hex().to_string())
}

/// Storage manager rooted at one directory
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    /// Create a new storage manager
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Get the root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the config file path
    pub fn config_path(&self) -> PathBuf {
        self.root.join("config.json")
    }

    /// Get the program file path
    pub fn program_path(&self) -> PathBuf {
        self.root.join("program.json")
    }

    /// Create the root directory if needed
    pub fn init(&self) -> StorageResult<()> {
        fs::create_dir_all(&self.root).map_err(StorageError::io(&self.root))?;
        Ok(())
    }

    /// Write data atomically to a file
    ///
    /// Creates a temporary file, writes the data, syncs, then renames
    pub fn write_atomic(&self, path: &Path, data: &[u8]) -> StorageResult<()> {
        let temp_path = path.with_extension("tmp");

        let mut file = File::create(&temp_path).map_err(StorageError::io(&temp_path))?;
        file.write_all(data).map_err(StorageError::io(&temp_path))?;
        file.sync_all().map_err(StorageError::io(&temp_path))?;
        drop(file);

        fs::rename(&temp_path, path).map_err(StorageError::io(path))?;

        if let Some(parent) = path.parent() {
            let dir = OpenOptions::new()
                .read(true)
                .open(parent)
                .map_err(StorageError::io(parent))?;
            dir.sync_all().map_err(StorageError::io(parent))?;
        }

        Ok(())
    }

    /// Write processor configuration
    pub fn write_config(&self, config: &ProcessorConfig) -> StorageResult<()> {
        let json = serde_json::to_vec_pretty(config)?;
        self.write_atomic(&self.config_path(), &json)
    }

    /// Load processor configuration, falling back to defaults if absent
    pub fn load_config(&self) -> StorageResult<ProcessorConfig> {
        let path = self.config_path();
        if !path.exists() {
            return Ok(ProcessorConfig::default());
        }
        let data = fs::read(&path).map_err(StorageError::io(&path))?;
        serde_json::from_slice(&data).map_err(StorageError::corrupt(&path))
    }

    /// Persist a program record
    pub fn save_program(&self, program: ProgramRecord) -> StorageResult<SavedProgram> {
        let saved = SavedProgram::new(program)?;
        let json = serde_json::to_vec_pretty(&saved)?;
        self.write_atomic(&self.program_path(), &json)?;
        tracing::info!(
            path = %self.program_path().display(),
            instructions = saved.instruction_count,
            "saved program"
        );
        Ok(saved)
    }

    /// Load and verify a persisted program record
    pub fn load_program(&self) -> StorageResult<ProgramRecord> {
        let path = self.program_path();
        let data = fs::read(&path).map_err(StorageError::io(&path))?;
        let saved: SavedProgram =
            serde_json::from_slice(&data).map_err(StorageError::corrupt(&path))?;
        saved.verify()
    }
}
