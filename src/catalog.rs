use log::{debug, warn};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{PatchError, Result};
use crate::patch_format::{self, PatchDefinition, DEFINITION_EXTENSION};

/// Load every patch definition in `dir`, sorted by file name.
///
/// A missing directory yields an empty catalog. A file that fails to load
/// is kept as an invalid entry whose description holds the reason; the
/// remaining files still load.
pub fn load_all(dir: &Path) -> Result<Vec<PatchDefinition>> {
    if !dir.is_dir() {
        debug!("Patch directory {} does not exist", dir.display());
        return Ok(Vec::new());
    }

    let sources = definition_sources(dir)?;
    let catalog: Vec<PatchDefinition> = sources
        .iter()
        .map(|path| match patch_format::load(path) {
            Ok(def) => {
                debug!("Loaded patch '{}' ({} blocks)", def.id, def.blocks.len());
                def
            }
            Err(e) => {
                warn!("Invalid patch definition {}: {}", path.display(), e);
                PatchDefinition::invalid(path, e.to_string())
            }
        })
        .collect();

    Ok(catalog)
}

/// Definition files directly inside `dir`, ordered by file name.
fn definition_sources(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut sources = Vec::new();

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            PatchError::io(path, e.into())
        })?;

        let is_definition = entry.file_type().is_file()
            && entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(DEFINITION_EXTENSION));
        if is_definition {
            sources.push(entry.into_path());
        }
    }

    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_missing_directory_is_empty() {
        let temp = TempDir::new().unwrap();
        let catalog = load_all(&temp.path().join("nope")).unwrap();
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_sorted_and_bad_file_kept() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("b_good.json"),
            r#"{"name":"Good","blocks":[{"find":"90 90","replace":"EB 00"}]}"#,
        )
        .unwrap();
        fs::write(temp.path().join("a_bad.json"), "{ not json").unwrap();
        fs::write(temp.path().join("c_empty.json"), r#"{"blocks":[]}"#).unwrap();
        fs::write(temp.path().join("readme.txt"), "ignored").unwrap();

        let catalog = load_all(temp.path()).unwrap();
        let ids: Vec<&str> = catalog.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a_bad", "b_good", "c_empty"]);

        assert!(!catalog[0].valid);
        assert!(catalog[0].blocks.is_empty());
        assert!(!catalog[0].description.is_empty());

        assert!(catalog[1].is_usable());
        assert_eq!(catalog[1].name, "Good");

        assert!(!catalog[2].valid);
        assert!(catalog[2].description.contains("no blocks"));
    }

    #[test]
    fn test_subdirectories_not_scanned() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("nested")).unwrap();
        fs::write(
            temp.path().join("nested/inner.json"),
            r#"{"blocks":[{"find":"00","replace":"01"}]}"#,
        )
        .unwrap();
        assert!(load_all(temp.path()).unwrap().is_empty());
    }
}
