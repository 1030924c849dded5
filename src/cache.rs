//! The build cache stores the source hashes each task last ran against, for
//! determining which tasks are up to date.
//!
//! On disk it is one JSON object: task name -> { absolute path -> hex hash }.
//! The whole file is rewritten on every commit; there is no locking, so only
//! one build may use a given cache at a time.

use crate::hash::Hashes;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub struct CacheStore {
    path: PathBuf,
    entries: BTreeMap<String, Hashes>,
}

impl CacheStore {
    /// Reads the cache at `path`.  A missing file is an empty cache; so is an
    /// unreadable or corrupt one, after a warning.
    pub fn open(path: &Path) -> CacheStore {
        let entries = match std::fs::read_to_string(path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(entries) => entries,
                Err(err) => {
                    warn!("ignoring corrupt build cache {}: {}", path.display(), err);
                    BTreeMap::new()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                warn!("ignoring unreadable build cache {}: {}", path.display(), err);
                BTreeMap::new()
            }
        };
        CacheStore {
            path: path.to_path_buf(),
            entries,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, task: &str) -> Option<&Hashes> {
        self.entries.get(task)
    }

    /// A task needs to run when forced, when it never ran, or when any
    /// source hash differs from the recorded set.
    pub fn needs_rebuild(&self, task: &str, current: &Hashes, force: bool) -> bool {
        if force {
            debug!(task, "forced");
            return true;
        }
        match self.entries.get(task) {
            None => {
                debug!(task, "no cache entry");
                true
            }
            Some(recorded) if recorded != current => {
                debug!(task, "sources changed");
                true
            }
            Some(_) => false,
        }
    }

    pub fn record(&mut self, task: &str, hashes: Hashes) {
        self.entries.insert(task.to_owned(), hashes);
    }

    /// Writes the whole cache to disk, replacing the file atomically.
    pub fn commit(&self) -> std::io::Result<()> {
        let text = serde_json::to_string_pretty(&self.entries)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, text)?;
        std::fs::rename(&tmp, &self.path)
    }

    /// Forgets every entry and deletes the file.  Returns whether a file was
    /// removed.
    pub fn remove(&mut self) -> std::io::Result<bool> {
        self.entries.clear();
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err),
        }
    }
}
