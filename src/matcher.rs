use crate::error::{PatchError, Result};
use crate::hex_pattern::BytePattern;

/// Find the first offset at or after `start` where `pattern` matches `data`.
///
/// Returns `Ok(None)` when no alignment satisfies the mask, and an
/// `InvalidPattern` error when the pattern cannot fit in `data[start..]`.
pub fn find_first(data: &[u8], pattern: &BytePattern, start: usize) -> Result<Option<usize>> {
    if pattern.bytes().len() != pattern.mask().len() {
        return Err(PatchError::InvalidPattern(format!(
            "{} bytes but {} mask entries",
            pattern.bytes().len(),
            pattern.mask().len()
        )));
    }
    let remaining = data.len().saturating_sub(start);
    if pattern.len() > remaining {
        return Err(PatchError::InvalidPattern(format!(
            "pattern of {} bytes is longer than the {} bytes remaining after offset {:#x}",
            pattern.len(),
            remaining,
            start
        )));
    }
    Ok(scan(data, pattern, start))
}

/// Lazily iterate every offset where `pattern` matches. Scanning resumes at
/// `match + 1`, so overlapping occurrences are all reported.
pub fn find_all<'a>(data: &'a [u8], pattern: &'a BytePattern) -> Matches<'a> {
    Matches {
        data,
        pattern,
        next: 0,
    }
}

fn scan(data: &[u8], pattern: &BytePattern, start: usize) -> Option<usize> {
    let len = pattern.len();
    if len == 0 || data.len() < len || start > data.len() - len {
        return None;
    }
    let last = data.len() - len;

    // Anchor on the first fixed byte so the common case is a memchr-style skip.
    let anchor = pattern.mask().iter().position(|m| *m);

    let mut pos = start;
    while pos <= last {
        if let Some(a) = anchor {
            let wanted = pattern.bytes()[a];
            match data[pos + a..=last + a].iter().position(|&b| b == wanted) {
                Some(skip) => pos += skip,
                None => return None,
            }
        }
        if pattern.matches_at(&data[pos..pos + len]) {
            return Some(pos);
        }
        pos += 1;
    }
    None
}

/// Iterator returned by [`find_all`].
pub struct Matches<'a> {
    data: &'a [u8],
    pattern: &'a BytePattern,
    next: usize,
}

impl Iterator for Matches<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let found = scan(self.data, self.pattern, self.next)?;
        self.next = found + 1;
        Some(found)
    }
}
