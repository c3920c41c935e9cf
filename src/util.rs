use anyhow::{Context, Result};
use memmap2::Mmap;
use std::io::Read;
use std::path::Path;

/// Memory-map the target binary for read-only scanning.
///
/// # Safety
/// The mapping is read-only. Callers must drop the `Mmap` before writing to
/// the same file: on Windows, writing to a file with an open mapping fails
/// (os error 1224).
pub fn mmap_file(path: &Path) -> Result<Mmap> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open file: {}", path.display()))?;
    // SAFETY: We only read from this mapping and drop it before any write.
    unsafe {
        Mmap::map(&file)
            .with_context(|| format!("Failed to memory-map file: {}", path.display()))
    }
}

/// Compute the BLAKE3 hash of a byte slice.
pub fn hash_bytes(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// Stream-hash a reader using BLAKE3.
/// Uses a 256 KB BufReader to reduce syscall overhead vs the default 8 KB.
pub fn hash_reader<R: Read>(reader: R) -> std::io::Result<[u8; 32]> {
    let mut reader = std::io::BufReader::with_capacity(256 * 1024, reader);
    let mut hasher = blake3::Hasher::new();
    std::io::copy(&mut reader, &mut hasher)?;
    Ok(*hasher.finalize().as_bytes())
}

/// Short hex form of a digest for display.
pub fn short_hex(hash: &[u8; 32]) -> String {
    hash[..8].iter().map(|b| format!("{:02x}", b)).collect()
}
