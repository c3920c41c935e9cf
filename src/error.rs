use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PatchError>;

#[derive(Error, Debug)]
pub enum PatchError {
    #[error("Malformed hex pattern {pattern:?}: {reason}")]
    MalformedPattern { pattern: String, reason: String },

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("Patch definition {source_path} has no blocks")]
    EmptyPatch { source_path: PathBuf },

    #[error("Patch '{id}' is invalid and cannot be planned")]
    InvalidDefinition { id: String },

    #[error("Block {block} of patch '{id}': find is {find_len} bytes but replace is {replace_len}")]
    BlockLengthMismatch {
        id: String,
        block: usize,
        find_len: usize,
        replace_len: usize,
    },

    #[error("Patch '{id}': pattern for block {block} not found ({expected})")]
    PatternNotFound {
        id: String,
        block: usize,
        expected: String,
    },

    #[error("Patch '{id}': write of {len} bytes at offset {offset:#x} exceeds file length {file_len}")]
    OffsetOutOfRange {
        id: String,
        offset: u64,
        len: usize,
        file_len: u64,
    },

    #[error("Patch '{first}' and patch '{second}' both write to offset range starting at {offset:#x}")]
    OverlappingWrites {
        first: String,
        second: String,
        offset: u64,
    },

    #[error("Failed to create backup {path}: {reason}")]
    Backup { path: PathBuf, reason: String },

    #[error("No backup found at {0}")]
    NoBackup(PathBuf),

    #[error("{0} is in use by another process")]
    Locked(PathBuf),

    #[error("Failed to decode patch definition {path}: {source}")]
    Definition {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PatchError {
    pub(crate) fn malformed(pattern: &str, reason: impl Into<String>) -> Self {
        PatchError::MalformedPattern {
            pattern: pattern.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PatchError::Io {
            path: path.into(),
            source,
        }
    }
}
