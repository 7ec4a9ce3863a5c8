//! Index of audio files eligible for preview resolution.
//!
//! The index answers "is this relative path a real, eligible file?"
//! without touching the filesystem. It holds an immutable snapshot of
//! relative paths behind an atomically swapped reference: a rescan
//! builds a fresh set and publishes it in one step, so readers see
//! either the old snapshot or the new one, never a half-built set.
//!
//! When a lookup misses but the filesystem may have just changed,
//! [`FileIndex::revalidate`] compares the index's belief against a stat
//! and repairs optimistically: the path is added right away and a full
//! rescan reconciles the rest of the tree - unless one is already
//! running, in which case the trigger is dropped.

use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Set of relative paths under the media root that are valid targets
/// for metadata resolution.
pub struct FileIndex {
    root: PathBuf,
    /// Accepted file extensions, lowercase without the dot
    accepted: Vec<String>,
    /// Current snapshot; replaced wholesale, never mutated in place
    current: RwLock<Arc<HashSet<String>>>,
    /// Held for the duration of a walk; `try_lock` gives the
    /// skip-if-busy semantics for coalescing rescan triggers
    scan_lock: Mutex<()>,
}

impl FileIndex {
    /// Create an empty index over the given media root.
    pub fn new(root: impl Into<PathBuf>, accepted_extensions: &[String]) -> Self {
        Self {
            root: root.into(),
            accepted: accepted_extensions
                .iter()
                .map(|e| e.to_lowercase())
                .collect(),
            current: RwLock::new(Arc::new(HashSet::new())),
            scan_lock: Mutex::new(()),
        }
    }

    /// Pure membership check against the current snapshot.
    pub fn is_valid(&self, relative_path: &str) -> bool {
        self.current.read().contains(relative_path)
    }

    /// Number of indexed files.
    pub fn len(&self) -> usize {
        self.current.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.read().is_empty()
    }

    /// Walk the media root and replace the snapshot.
    ///
    /// Blocking; use [`FileIndex::rescan`] from async contexts. A failed
    /// walk leaves the previous snapshot untouched.
    pub fn rescan_blocking(&self) -> Result<usize> {
        let _guard = self.scan_lock.lock();
        let found = self.walk()?;
        let count = found.len();
        info!(target: "index", count, "media root scanned");
        *self.current.write() = Arc::new(found);
        Ok(count)
    }

    /// Async wrapper for [`FileIndex::rescan_blocking`].
    ///
    /// Reports failure as `false` after logging; the previous snapshot
    /// stays in effect.
    pub async fn rescan(self: Arc<Self>) -> bool {
        let index = self;
        match tokio::task::spawn_blocking(move || index.rescan_blocking()).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                error!(target: "index", error = %e, "error scanning media root");
                false
            }
            Err(e) => {
                error!(target: "index", error = %e, "scan task failed");
                false
            }
        }
    }

    /// Repair the index for one path after a lookup miss.
    ///
    /// Compares the snapshot's belief with a filesystem stat. On
    /// disagreement the path is added optimistically - so an immediate
    /// re-check of this exact path succeeds - and a full rescan
    /// reconciles the tree, skipped when one is already in flight.
    pub fn revalidate_blocking(&self, relative_path: &str) {
        let local_path = self.root.join(relative_path);
        if !self.has_accepted_extension(&local_path) {
            return;
        }

        let is_indexed = self.is_valid(relative_path);
        let is_file = local_path.is_file();
        if is_indexed == is_file {
            return;
        }

        debug!(target: "index", path = relative_path, is_indexed, is_file, "index out of date");
        {
            let mut current = self.current.write();
            let mut updated = HashSet::clone(&current);
            updated.insert(relative_path.to_string());
            *current = Arc::new(updated);
        }

        match self.scan_lock.try_lock() {
            Some(_guard) => {
                match self.walk() {
                    Ok(found) => {
                        info!(target: "index", count = found.len(), "media root rescanned");
                        *self.current.write() = Arc::new(found);
                    }
                    Err(e) => error!(target: "index", error = %e, "error rescanning media root"),
                }
            }
            None => {
                info!(target: "index", "need to rescan but a scan is already in progress, skipping");
            }
        }
    }

    /// Async wrapper for [`FileIndex::revalidate_blocking`].
    pub async fn revalidate(self: Arc<Self>, relative_path: String) {
        let index = self;
        if let Err(e) =
            tokio::task::spawn_blocking(move || index.revalidate_blocking(&relative_path)).await
        {
            warn!(target: "index", error = %e, "revalidation task failed");
        }
    }

    fn has_accepted_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|s| s.to_str())
            .map(|ext| self.accepted.iter().any(|a| a == &ext.to_lowercase()))
            .unwrap_or(false)
    }

    /// Collect eligible relative paths into a fresh set.
    fn walk(&self) -> Result<HashSet<String>> {
        if !self.root.is_dir() {
            return Err(Error::scan(format!(
                "media root {:?} is not a directory",
                self.root
            )));
        }

        let mut found = HashSet::new();
        for entry in WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() || !self.has_accepted_extension(entry.path()) {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(&self.root) {
                found.insert(relative_path_string(relative));
            }
        }
        Ok(found)
    }
}

/// Join path components with forward slashes, the form used in URLs and
/// cache keys.
fn relative_path_string(path: &Path) -> String {
    path.iter()
        .map(|c| c.to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
