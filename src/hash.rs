//! Content hashes of task sources, recorded in the build cache and compared
//! to decide whether a task is up to date.
//!
//! Hashes are over file contents only; mtimes never enter into it, so
//! touching a file without changing it does not cause a rebuild.

use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Map of absolute source path to hex SHA-256 of its contents.
pub type Hashes = BTreeMap<String, String>;

pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

pub fn hash_file(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(hash_bytes(&bytes))
}

/// Makes `path` absolute against `cwd` without touching the filesystem.
pub fn absolute(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

/// Hashes every source that exists; missing sources are left out of the map.
/// Files are read in parallel.
pub fn hash_sources(sources: &[PathBuf], cwd: &Path) -> std::io::Result<Hashes> {
    let hashed: Vec<std::io::Result<Option<(String, String)>>> = sources
        .par_iter()
        .map(|path| {
            let abs = absolute(cwd, path);
            if !abs.is_file() {
                return Ok(None);
            }
            let hash = hash_file(&abs)?;
            Ok(Some((abs.to_string_lossy().into_owned(), hash)))
        })
        .collect();
    let mut hashes = Hashes::new();
    for entry in hashed {
        if let Some((path, hash)) = entry? {
            hashes.insert(path, hash);
        }
    }
    Ok(hashes)
}
