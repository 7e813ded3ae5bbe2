//! Document Files
//!
//! Maps keys onto paths and moves bytes on and off disk.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::Builder;

use crate::config::SyncStrategy;
use crate::error::Result;

use super::key::StorageKey;

/// Extension every document file carries
pub const DOCUMENT_EXTENSION: &str = "json";

const TEMP_PREFIX: &str = ".docvault-";
const TEMP_SUFFIX: &str = ".tmp";

/// `<root>/<seg1>/.../<segN>.json`
pub(crate) fn document_path(root: &Path, key: &StorageKey) -> PathBuf {
    let mut path = directory_path(root, key.parent());
    path.push(format!("{}.{}", key.last(), DOCUMENT_EXTENSION));
    path
}

/// `<root>/<seg1>/.../<segN>`
pub(crate) fn directory_path<S: AsRef<str>>(root: &Path, segments: &[S]) -> PathBuf {
    let mut path = root.to_path_buf();
    for segment in segments {
        path.push(segment.as_ref());
    }
    path
}

/// Document stem of a file name, or `None` for anything that is not a document
///
/// In-flight temp files (`.docvault-XXXXXX.tmp`) are skipped.
pub(crate) fn document_stem(file_name: &str) -> Option<&str> {
    let stem = file_name.strip_suffix(DOCUMENT_EXTENSION)?.strip_suffix('.')?;
    (!stem.is_empty()).then_some(stem)
}

/// Replace `path` with `contents` so readers see either the old or the new file
///
/// Writes a temp file in the target directory, then renames it over the
/// target. Rename within one directory is the atomicity boundary. With
/// `SyncStrategy::Always` the directory entry is synced after the rename too.
pub(crate) fn write_atomic(path: &Path, contents: &[u8], sync: SyncStrategy) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    let mut tmp = Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(TEMP_SUFFIX)
        .tempfile_in(dir)?;
    tmp.write_all(contents)?;
    tmp.flush()?;

    if sync == SyncStrategy::Always {
        tmp.as_file().sync_all()?;
    }

    tmp.persist(path).map_err(|e| e.error)?;

    if sync == SyncStrategy::Always {
        sync_dir(dir)?;
    }
    Ok(())
}

/// Make a rename in `dir` durable
#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    fs::File::open(dir)?.sync_all()?;
    Ok(())
}

// Directories cannot be opened for syncing here; the rename is left to the OS
#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}

/// Read a whole file, mapping "missing" to `None`
pub(crate) fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Delete a file; a missing file is not an error. Returns whether it existed.
pub(crate) fn remove_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}
