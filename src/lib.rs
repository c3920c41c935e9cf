//! Masked byte-pattern patching for game executables.
//!
//! Patch definitions are JSON files holding ordered find/replace hex blocks
//! (`??` is a wildcard byte). A catalog directory is loaded with
//! [`catalog::load_all`], each patch is classified against the current bytes
//! with [`status::analyze`], writes are computed with [`plan::plan`], and
//! [`apply::apply_to_file`] writes them after taking a one-time backup.

pub mod apply;
pub mod catalog;
pub mod error;
pub mod hex_pattern;
pub mod matcher;
pub mod patch_format;
pub mod plan;
pub mod status;
pub mod util;

pub use error::{PatchError, Result};
pub use hex_pattern::BytePattern;
pub use patch_format::{Direction, PatchBlock, PatchDefinition, PatchOperation};
pub use status::PatchStatus;
