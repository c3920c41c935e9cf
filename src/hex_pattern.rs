use std::fmt;

use crate::error::{PatchError, Result};

const WILDCARD: &str = "??";

/// A byte sequence paired with a comparison mask.
///
/// `mask[i] == false` marks a wildcard position that matches any byte; the
/// stored byte for a wildcard is 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BytePattern {
    bytes: Vec<u8>,
    mask: Vec<bool>,
}

impl BytePattern {
    /// Build a pattern from raw parts. Both slices must be non-empty and of
    /// equal length.
    pub fn new(bytes: Vec<u8>, mask: Vec<bool>) -> Result<Self> {
        if bytes.len() != mask.len() {
            return Err(PatchError::InvalidPattern(format!(
                "{} bytes but {} mask entries",
                bytes.len(),
                mask.len()
            )));
        }
        if bytes.is_empty() {
            return Err(PatchError::InvalidPattern("empty pattern".to_string()));
        }
        Ok(Self { bytes, mask })
    }

    /// A fully masked pattern: every byte must match.
    pub fn exact(bytes: &[u8]) -> Result<Self> {
        Self::new(bytes.to_vec(), vec![true; bytes.len()])
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mask(&self) -> &[bool] {
        &self.mask
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn has_wildcards(&self) -> bool {
        self.mask.iter().any(|m| !m)
    }

    /// True if `window` satisfies every fixed position of the pattern.
    /// `window` must be at least as long as the pattern.
    #[inline]
    pub fn matches_at(&self, window: &[u8]) -> bool {
        self.bytes
            .iter()
            .zip(&self.mask)
            .zip(window)
            .all(|((&expected, &fixed), &actual)| !fixed || expected == actual)
    }
}

impl fmt::Display for BytePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (byte, fixed)) in self.bytes.iter().zip(&self.mask).enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            if *fixed {
                write!(f, "{:02X}", byte)?;
            } else {
                f.write_str(WILDCARD)?;
            }
        }
        Ok(())
    }
}

/// Parse a hex string such as `"DE AD ?? ef"` into a masked pattern.
///
/// Whitespace is ignored and digits are case-insensitive. Each pair of
/// characters is either two hex digits or the wildcard `??`.
pub fn parse(hex: &str) -> Result<BytePattern> {
    let cleaned: Vec<u8> = hex
        .bytes()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    if cleaned.is_empty() {
        return Err(PatchError::malformed(hex, "pattern is empty"));
    }
    if cleaned.len() % 2 != 0 {
        return Err(PatchError::malformed(
            hex,
            format!("odd number of hex digits ({})", cleaned.len()),
        ));
    }

    let mut bytes = Vec::with_capacity(cleaned.len() / 2);
    let mut mask = Vec::with_capacity(cleaned.len() / 2);

    for pair in cleaned.chunks_exact(2) {
        if pair == WILDCARD.as_bytes() {
            bytes.push(0);
            mask.push(false);
            continue;
        }
        match (hex_value(pair[0]), hex_value(pair[1])) {
            (Some(hi), Some(lo)) => {
                bytes.push((hi << 4) | lo);
                mask.push(true);
            }
            _ => {
                return Err(PatchError::malformed(
                    hex,
                    format!("invalid byte {:?}", String::from_utf8_lossy(pair)),
                ))
            }
        }
    }

    BytePattern::new(bytes, mask)
}

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}
