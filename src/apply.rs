use log::{debug, info};
use std::ffi::OsString;
use std::fs::{File, OpenOptions, TryLockError};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{PatchError, Result};
use crate::patch_format::{ApplySummary, PatchOperation};
use crate::util;

/// Suffix appended to the target file name to form its backup.
pub const BACKUP_SUFFIX: &str = ".bak";

const BACKUP_TMP_SUFFIX: &str = ".tmp";
const RESTORE_TMP_SUFFIX: &str = ".restore";

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// `game.exe` -> `game.exe.bak`
pub fn backup_path(target: &Path) -> PathBuf {
    sibling(target, BACKUP_SUFFIX)
}

/// Check that every operation fits in `len` bytes and that no two
/// operations write to the same byte.
pub fn validate(operations: &[PatchOperation], len: u64) -> Result<()> {
    for op in operations {
        if op.end().is_none_or(|end| end > len) {
            return Err(PatchError::OffsetOutOfRange {
                id: op.patch_id.clone(),
                offset: op.offset,
                len: op.data.len(),
                file_len: len,
            });
        }
    }

    let mut by_offset: Vec<&PatchOperation> = operations.iter().collect();
    by_offset.sort_by_key(|op| op.offset);
    for pair in by_offset.windows(2) {
        if pair[0].end().is_some_and(|end| end > pair[1].offset) {
            return Err(PatchError::OverlappingWrites {
                first: pair[0].patch_id.clone(),
                second: pair[1].patch_id.clone(),
                offset: pair[1].offset,
            });
        }
    }

    Ok(())
}

/// Apply operations to an in-memory copy of the target. Nothing is written
/// unless the whole batch validates. Returns the number of bytes written.
pub fn apply_to_buffer(buf: &mut [u8], operations: &[PatchOperation]) -> Result<usize> {
    validate(operations, buf.len() as u64)?;

    let mut written = 0;
    for op in operations {
        let start = op.offset as usize;
        buf[start..start + op.data.len()].copy_from_slice(&op.data);
        written += op.data.len();
    }
    Ok(written)
}

/// Copy `target` to its backup path unless a backup already exists.
/// Returns whether a new backup was created.
pub fn ensure_backup(target: &Path) -> Result<bool> {
    let mut file = open_exclusive(target, &mut OpenOptions::new())?;
    backup_locked(target, &mut file)
}

/// Back up through the already locked handle `file`.
///
/// The copy goes to a temporary sibling first and is renamed into place only
/// after its BLAKE3 digest matches the original.
fn backup_locked(target: &Path, file: &mut File) -> Result<bool> {
    let backup = backup_path(target);
    if backup.exists() {
        debug!("Backup {} already exists; keeping it", backup.display());
        return Ok(false);
    }

    let tmp = sibling(&backup, BACKUP_TMP_SUFFIX);
    let result = match stage_backup(file, &tmp) {
        Ok(true) => std::fs::rename(&tmp, &backup).map_err(|e| e.to_string()),
        Ok(false) => Err("backup contents do not match the original".to_string()),
        Err(e) => Err(e.to_string()),
    };

    match result {
        Ok(()) => {
            info!("Created backup {}", backup.display());
            Ok(true)
        }
        Err(reason) => {
            let _ = std::fs::remove_file(&tmp);
            Err(PatchError::Backup {
                path: backup,
                reason,
            })
        }
    }
}

/// Copy `source` into a new file at `to`. Returns whether both digests agree.
fn stage_backup(source: &mut File, to: &Path) -> std::io::Result<bool> {
    source.seek(SeekFrom::Start(0))?;
    let mut out = File::create(to)?;
    std::io::copy(&mut *source, &mut out)?;
    out.sync_all()?;

    source.seek(SeekFrom::Start(0))?;
    let original = util::hash_reader(&mut *source)?;
    let copy = util::hash_reader(File::open(to)?)?;
    Ok(original == copy)
}

/// Open `path` for read-write with exclusive access, failing fast if another
/// handle holds it.
fn open_exclusive(path: &Path, options: &mut OpenOptions) -> Result<File> {
    options.read(true).write(true);
    #[cfg(windows)]
    {
        use std::os::windows::fs::OpenOptionsExt;
        options.share_mode(0);
    }

    let file = options.open(path).map_err(|e| {
        // ERROR_SHARING_VIOLATION
        if cfg!(windows) && e.raw_os_error() == Some(32) {
            PatchError::Locked(path.to_path_buf())
        } else {
            PatchError::io(path, e)
        }
    })?;

    match file.try_lock() {
        Ok(()) => Ok(file),
        Err(TryLockError::WouldBlock) => Err(PatchError::Locked(path.to_path_buf())),
        Err(TryLockError::Error(e)) => Err(PatchError::io(path, e)),
    }
}

/// Write `operations` to `target` in order.
///
/// The target is locked before anything else happens. With `make_backup`, a
/// backup is taken through that handle if none exists; a backup failure
/// aborts before the first write. Bounds and overlaps are checked against the
/// file length before the first write. A write failure after that leaves the
/// file partially patched.
pub fn apply_to_file(
    target: &Path,
    operations: &[PatchOperation],
    make_backup: bool,
) -> Result<ApplySummary> {
    let mut file = open_exclusive(target, &mut OpenOptions::new())?;

    let backup_created = if make_backup {
        backup_locked(target, &mut file)?
    } else {
        false
    };

    let len = file
        .metadata()
        .map_err(|e| PatchError::io(target, e))?
        .len();

    validate(operations, len)?;

    let mut bytes_written = 0;
    for op in operations {
        file.seek(SeekFrom::Start(op.offset))
            .and_then(|_| file.write_all(&op.data))
            .map_err(|e| PatchError::io(target, e))?;
        debug!(
            "Wrote {} bytes at {:#x} for '{}'",
            op.data.len(),
            op.offset,
            op.patch_id
        );
        bytes_written += op.data.len();
    }

    file.sync_all().map_err(|e| PatchError::io(target, e))?;

    file.seek(SeekFrom::Start(0))
        .map_err(|e| PatchError::io(target, e))?;
    let result_hash = util::hash_reader(&mut file).map_err(|e| PatchError::io(target, e))?;

    info!(
        "Applied {} operations ({} bytes) to {}",
        operations.len(),
        bytes_written,
        target.display()
    );

    Ok(ApplySummary {
        operations: operations.len(),
        bytes_written,
        backup_created,
        result_hash,
    })
}

/// Replace `target` with its backup verbatim. Returns the number of bytes
/// restored.
///
/// The backup is staged into a sibling file while the target is locked, then
/// renamed over it, so a failed copy leaves the target as it was.
pub fn restore_from_backup(target: &Path) -> Result<u64> {
    let backup = backup_path(target);
    if !backup.is_file() {
        return Err(PatchError::NoBackup(backup));
    }

    let file = open_exclusive(target, OpenOptions::new().create(true).truncate(false))?;
    let staged = sibling(target, RESTORE_TMP_SUFFIX);

    let restored = match stage_restore(&backup, &staged, &file) {
        Ok(n) => n,
        Err(e) => {
            let _ = std::fs::remove_file(&staged);
            return Err(PatchError::io(&staged, e));
        }
    };

    // Windows refuses to replace a file that still has an open handle.
    drop(file);
    if let Err(e) = std::fs::rename(&staged, target) {
        let _ = std::fs::remove_file(&staged);
        return Err(PatchError::io(target, e));
    }

    info!(
        "Restored {} bytes to {} from {}",
        restored,
        target.display(),
        backup.display()
    );
    Ok(restored)
}

/// Copy `backup` to `staged`, keeping the permissions of the current target.
fn stage_restore(backup: &Path, staged: &Path, target: &File) -> std::io::Result<u64> {
    let mut out = File::create(staged)?;
    let restored = std::io::copy(&mut File::open(backup)?, &mut out)?;
    out.sync_all()?;
    std::fs::set_permissions(staged, target.metadata()?.permissions())?;
    Ok(restored)
}
