//! Modification-time based staleness.
//!
//! Two files written within the same filesystem clock tick compare equal and
//! neither is considered newer than the other. On filesystems with coarse
//! timestamps this can miss a rebuild; the whole-target marker in
//! [`crate::target`] only partly compensates.

use std::fs;
use std::path::Path;
use std::time::SystemTime;

use crate::error::{Error, Result};

fn modified(path: &Path) -> Result<SystemTime> {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .map_err(|source| Error::Path {
            path: path.to_path_buf(),
            source,
        })
}

/// Checks whether `a` was modified strictly after `b`.
pub fn is_newer(a: impl AsRef<Path>, b: impl AsRef<Path>) -> Result<bool> {
    Ok(modified(a.as_ref())? > modified(b.as_ref())?)
}

/// A destination needs rebuilding when it is missing or not newer than its source.
pub fn needs_rebuild(source: impl AsRef<Path>, destination: impl AsRef<Path>) -> Result<bool> {
    let destination = destination.as_ref();
    if !destination.exists() {
        return Ok(true);
    }
    Ok(!is_newer(destination, source)?)
}
