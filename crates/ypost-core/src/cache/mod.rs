//! Shared, reference-counted file mappings.
//!
//! Each input file is mapped once and read by every server pipeline. The
//! mapping carries a reader count equal to the number of servers; each
//! pipeline decrements it once after building its last article for the file,
//! and whichever pipeline brings it to zero releases the mapping.
//!
//! The path map and each entry's counter are synchronized separately, and no
//! file I/O happens while the map lock is held.

mod mapped;

pub use mapped::MappedFile;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Cache failures. Both kinds are fatal to the whole run.
#[derive(Debug, Error)]
pub enum CacheError {
    /// open/stat/map failed.
    #[error("{op} {}: {source}", .path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reference counting was violated (unknown entry, early release, over-decrement).
    #[error("file cache consistency: {0}")]
    Consistency(String),
}

/// Path-keyed cache of [`MappedFile`]s shared by all pipelines of a run.
#[derive(Debug, Default)]
pub struct FileCache {
    files: Mutex<HashMap<PathBuf, Arc<MappedFile>>>,
}

impl FileCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn files(&self) -> MutexGuard<'_, HashMap<PathBuf, Arc<MappedFile>>> {
        self.files.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Return the mapping for `path`, mapping it with `readers` pending readers
    /// if it is not cached yet.
    pub fn acquire(&self, path: &Path, readers: usize) -> Result<Arc<MappedFile>, CacheError> {
        if let Some(existing) = self.files().get(path) {
            return Ok(Arc::clone(existing));
        }

        // Map outside the lock; if another pipeline won the race, keep its mapping.
        let mapped = Arc::new(MappedFile::open(path, readers)?);
        let mut files = self.files();
        let entry = files
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::clone(&mapped));
        Ok(Arc::clone(entry))
    }

    /// Drop one reader of `path`. Returns true when the count reached zero and
    /// the caller must [`release`](Self::release) the entry.
    pub fn decrement(&self, path: &Path) -> Result<bool, CacheError> {
        let mapped = self.files().get(path).cloned().ok_or_else(|| {
            CacheError::Consistency(format!("decrement of unknown file {}", path.display()))
        })?;
        mapped.decrement()
    }

    /// Remove `path` from the cache; the mapping and file handle are closed once
    /// the last outstanding `Arc` is dropped. Fails if the entry is unknown or
    /// still has readers, leaving the cache untouched.
    pub fn release(&self, path: &Path) -> Result<(), CacheError> {
        let removed = {
            let mut files = self.files();
            let readers = files
                .get(path)
                .map(|m| m.readers())
                .ok_or_else(|| {
                    CacheError::Consistency(format!("release of unknown file {}", path.display()))
                })?;
            if readers > 0 {
                return Err(CacheError::Consistency(format!(
                    "release of {} with {} pending reader(s)",
                    path.display(),
                    readers
                )));
            }
            files.remove(path)
        };
        drop(removed);
        tracing::debug!(path = %path.display(), "released mapping");
        Ok(())
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files().contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.files().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_file(dir: &Path, name: &str, len: usize) -> PathBuf {
        let path = dir.join(name);
        let body: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn page_align_rounds_up() {
        let page = mapped::page_align(1);
        assert!(page >= 4096);
        assert_eq!(mapped::page_align(page), page);
        assert_eq!(mapped::page_align(page + 1), page * 2);
    }

    #[test]
    fn acquire_maps_once_and_shares() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "a.bin", 30_000);
        let cache = FileCache::new();

        let first = cache.acquire(&path, 2).unwrap();
        let second = cache.acquire(&path, 2).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
        assert_eq!(first.size(), 30_000);
        assert_eq!(first.readers(), 2);
        assert_eq!(first.data(), fs::read(&path).unwrap().as_slice());
        assert_eq!(first.slice(10, 13).unwrap(), &[10, 11, 12]);
        assert!(matches!(first.slice(29_999, 30_001), Err(CacheError::Consistency(_))));
    }

    #[test]
    fn released_only_after_all_decrements() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "b.bin", 5000);
        let cache = FileCache::new();

        let mapped = cache.acquire(&path, 3).unwrap();
        let weak = Arc::downgrade(&mapped);
        drop(mapped);

        assert!(!cache.decrement(&path).unwrap());
        assert!(matches!(cache.release(&path), Err(CacheError::Consistency(_))));
        assert!(cache.contains(&path));
        assert!(!cache.decrement(&path).unwrap());
        assert!(cache.decrement(&path).unwrap());

        cache.release(&path).unwrap();
        assert!(!cache.contains(&path));
        assert!(weak.upgrade().is_none(), "mapping must be dropped on release");
    }

    #[test]
    fn decrement_and_release_beyond_zero_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "c.bin", 10);
        let cache = FileCache::new();

        let mapped = cache.acquire(&path, 1).unwrap();
        assert!(cache.decrement(&path).unwrap());
        assert!(matches!(cache.decrement(&path), Err(CacheError::Consistency(_))));
        assert_eq!(mapped.readers(), 0);
        cache.release(&path).unwrap();
        assert!(matches!(cache.release(&path), Err(CacheError::Consistency(_))));
        assert!(matches!(cache.decrement(&path), Err(CacheError::Consistency(_))));
    }

    #[test]
    fn missing_and_empty_files_are_io_errors() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new();
        let missing = dir.path().join("missing.bin");
        assert!(matches!(
            cache.acquire(&missing, 1),
            Err(CacheError::Io { op: "open", .. })
        ));
        let empty = write_file(dir.path(), "empty.bin", 0);
        assert!(matches!(
            cache.acquire(&empty, 1),
            Err(CacheError::Io { op: "map", .. })
        ));
        assert!(cache.is_empty());
    }
}
