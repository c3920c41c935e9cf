use log::debug;

use crate::error::{PatchError, Result};
use crate::matcher;
use crate::patch_format::{Direction, PatchDefinition, PatchOperation};

/// Compute the writes that move `patch` in `direction` on `bytes`.
///
/// Every block must resolve to an offset; otherwise nothing is planned.
/// Operations follow block order. Wildcard positions in the write pattern
/// are written as their stored value (0).
pub fn plan(
    patch: &PatchDefinition,
    bytes: &[u8],
    direction: Direction,
) -> Result<Vec<PatchOperation>> {
    if !patch.is_usable() {
        return Err(PatchError::InvalidDefinition {
            id: patch.id.clone(),
        });
    }

    let mut operations = Vec::with_capacity(patch.blocks.len());

    for (i, block) in patch.blocks.iter().enumerate() {
        let (search, write) = direction.orient(block);

        let offset = if search.len() <= bytes.len() {
            matcher::find_first(bytes, search, 0)?
        } else {
            None
        };

        let Some(offset) = offset else {
            return Err(PatchError::PatternNotFound {
                id: patch.id.clone(),
                block: i,
                expected: search.to_string(),
            });
        };

        debug!(
            "Patch '{}' block {}: {:?} write of {} bytes at {:#x}",
            patch.id,
            i,
            direction,
            write.len(),
            offset
        );

        operations.push(PatchOperation {
            offset: offset as u64,
            data: write.bytes().to_vec(),
            patch_id: patch.id.clone(),
        });
    }

    Ok(operations)
}

/// Plan several patches in the same direction against one snapshot.
/// Fails on the first patch that cannot be planned.
pub fn plan_batch<'a, I>(patches: I, bytes: &[u8], direction: Direction) -> Result<Vec<PatchOperation>>
where
    I: IntoIterator<Item = &'a PatchDefinition>,
{
    let mut operations = Vec::new();
    for patch in patches {
        operations.extend(plan(patch, bytes, direction)?);
    }
    Ok(operations)
}
