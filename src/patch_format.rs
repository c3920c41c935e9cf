use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{PatchError, Result};
use crate::hex_pattern::{self, BytePattern};

/// File extension of patch definition sources in a catalog directory.
pub const DEFINITION_EXTENSION: &str = "json";

/// On-disk shape of a patch definition.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawDefinition {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub blocks: Vec<RawBlock>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawBlock {
    pub find: String,
    pub replace: String,
}

/// One find/replace pair. Both patterns have the same length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchBlock {
    pub find: BytePattern,
    pub replace: BytePattern,
}

#[derive(Debug, Clone)]
pub struct PatchDefinition {
    pub id: String,
    pub name: String,
    pub description: String,
    pub blocks: Vec<PatchBlock>,
    pub source: PathBuf,
    pub valid: bool,
}

impl PatchDefinition {
    /// Placeholder kept in a catalog for a source that failed to load.
    pub fn invalid(source: &Path, reason: String) -> Self {
        let stem = source_stem(source);
        Self {
            id: stem.clone(),
            name: stem,
            description: reason,
            blocks: Vec::new(),
            source: source.to_path_buf(),
            valid: false,
        }
    }

    pub fn is_usable(&self) -> bool {
        self.valid && !self.blocks.is_empty()
    }
}

/// Which way a patch is being moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Write `replace` where `find` is.
    Forward,
    /// Write `find` where `replace` is.
    Reverse,
}

impl Direction {
    /// The (search, write) patterns of `block` for this direction.
    pub fn orient<'a>(&self, block: &'a PatchBlock) -> (&'a BytePattern, &'a BytePattern) {
        match self {
            Direction::Forward => (&block.find, &block.replace),
            Direction::Reverse => (&block.replace, &block.find),
        }
    }
}

/// A planned in-place write. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchOperation {
    pub offset: u64,
    pub data: Vec<u8>,
    pub patch_id: String,
}

impl PatchOperation {
    /// One past the last byte written, or `None` if that overflows.
    pub fn end(&self) -> Option<u64> {
        self.offset.checked_add(self.data.len() as u64)
    }
}

#[derive(Debug)]
pub struct ApplySummary {
    pub operations: usize,
    pub bytes_written: usize,
    pub backup_created: bool,
    pub result_hash: [u8; 32],
}

/// Load a definition from a JSON file.
pub fn load(path: &Path) -> Result<PatchDefinition> {
    let text = std::fs::read_to_string(path).map_err(|e| PatchError::io(path, e))?;
    let raw: RawDefinition =
        serde_json::from_str(&text).map_err(|source| PatchError::Definition {
            path: path.to_path_buf(),
            source,
        })?;
    from_raw(raw, path)
}

/// Validate a decoded record. `source` supplies the default id and name.
pub fn from_raw(raw: RawDefinition, source: &Path) -> Result<PatchDefinition> {
    if raw.blocks.is_empty() {
        return Err(PatchError::EmptyPatch {
            source_path: source.to_path_buf(),
        });
    }

    let stem = source_stem(source);
    let id = raw.id.unwrap_or_else(|| stem.clone());
    let name = raw.name.unwrap_or(stem);

    let blocks = raw
        .blocks
        .iter()
        .enumerate()
        .map(|(i, b)| {
            let find = hex_pattern::parse(&b.find)?;
            let replace = hex_pattern::parse(&b.replace)?;
            if find.len() != replace.len() {
                return Err(PatchError::BlockLengthMismatch {
                    id: id.clone(),
                    block: i,
                    find_len: find.len(),
                    replace_len: replace.len(),
                });
            }
            Ok(PatchBlock { find, replace })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(PatchDefinition {
        id,
        name,
        description: raw.description.unwrap_or_default(),
        blocks,
        source: source.to_path_buf(),
        valid: true,
    })
}

fn source_stem(source: &Path) -> String {
    source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| source.display().to_string())
}
