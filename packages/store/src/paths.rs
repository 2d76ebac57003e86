#![allow(clippy::module_name_repetitions)]
//! File path helpers for the group store.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Returns the sibling path a snapshot is staged at before being renamed
/// over `path`.
#[must_use]
pub fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map_or_else(|| OsString::from("store"), ToOwned::to_owned);
    name.push(".tmp");
    path.with_file_name(name)
}

/// Ensures a directory exists, creating it if necessary.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.as_os_str().is_empty() && !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staging_path_is_a_sibling() {
        assert_eq!(
            staging_path(Path::new("data/london.toml.store.json")),
            PathBuf::from("data/london.toml.store.json.tmp")
        );
    }

    #[test]
    fn empty_parent_is_not_created() {
        assert!(ensure_dir(Path::new("")).is_ok());
    }
}
