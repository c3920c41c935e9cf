use rayon::prelude::*;
use std::fmt;

use crate::hex_pattern::BytePattern;
use crate::matcher;
use crate::patch_format::PatchDefinition;

/// Where a patch stands against a given binary snapshot. Always derived from
/// the current bytes; never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchStatus {
    /// The definition failed to load or has no blocks.
    Invalid,
    /// Neither every `find` nor every `replace` pattern is present.
    NotFound,
    /// Every `find` pattern is present; the patch can be applied.
    Found,
    /// Every `replace` pattern is present; the patch can be reverted.
    Applied,
}

impl fmt::Display for PatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PatchStatus::Invalid => "invalid",
            PatchStatus::NotFound => "not found",
            PatchStatus::Found => "found",
            PatchStatus::Applied => "applied",
        };
        f.pad(label)
    }
}

/// First offsets of one block's patterns in the snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockReport {
    pub find_offset: Option<usize>,
    pub replace_offset: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchReport {
    pub status: PatchStatus,
    pub blocks: Vec<BlockReport>,
}

/// Classify `patch` against `bytes`.
///
/// When both every find and every replace pattern are present, `Found` wins.
pub fn analyze(patch: &PatchDefinition, bytes: &[u8]) -> PatchStatus {
    inspect(patch, bytes).status
}

/// Like [`analyze`], with the first offset of each block's patterns.
pub fn inspect(patch: &PatchDefinition, bytes: &[u8]) -> PatchReport {
    if !patch.is_usable() {
        return PatchReport {
            status: PatchStatus::Invalid,
            blocks: Vec::new(),
        };
    }

    let blocks: Vec<BlockReport> = patch
        .blocks
        .iter()
        .map(|block| BlockReport {
            find_offset: first_offset(bytes, &block.find),
            replace_offset: first_offset(bytes, &block.replace),
        })
        .collect();

    let all_find = blocks.iter().all(|b| b.find_offset.is_some());
    let all_replace = blocks.iter().all(|b| b.replace_offset.is_some());

    let status = if all_find {
        if all_replace {
            log::debug!(
                "Patch '{}' matches both find and replace patterns; reporting found",
                patch.id
            );
        }
        PatchStatus::Found
    } else if all_replace {
        PatchStatus::Applied
    } else {
        PatchStatus::NotFound
    };

    PatchReport { status, blocks }
}

/// Analyze every definition against one snapshot. Results follow catalog order.
pub fn analyze_all(catalog: &[PatchDefinition], bytes: &[u8]) -> Vec<PatchReport> {
    catalog.par_iter().map(|def| inspect(def, bytes)).collect()
}

// A pattern longer than the snapshot simply does not occur.
fn first_offset(bytes: &[u8], pattern: &BytePattern) -> Option<usize> {
    matcher::find_all(bytes, pattern).next()
}
