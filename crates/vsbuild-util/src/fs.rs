//! Filesystem utilities for vsbuild.

use std::path::Path;

use crate::error::UtilError;

/// Create a directory and all parent directories if they do not exist.
///
/// # Errors
/// Returns an error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> Result<(), UtilError> {
    std::fs::create_dir_all(path).map_err(|source| UtilError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Write `contents` to `path`, replacing whatever was there.
///
/// Parent directories are created as needed.
///
/// # Errors
/// Returns an error if the parent directory or the file cannot be written.
pub fn write_file(path: &Path, contents: &[u8]) -> Result<(), UtilError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            ensure_dir(parent)?;
        }
    }
    std::fs::write(path, contents).map_err(|source| UtilError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Canonicalize `path`, reporting the original path on failure.
///
/// # Errors
/// Returns an error if the path does not exist or cannot be resolved.
pub fn canonicalize(path: &Path) -> Result<std::path::PathBuf, UtilError> {
    path.canonicalize().map_err(|source| UtilError::Io {
        path: path.display().to_string(),
        source,
    })
}
