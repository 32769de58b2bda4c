//! One read-only file mapping plus its pending-reader count.

use memmap2::{Mmap, MmapOptions};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use super::CacheError;

/// Page size used to round mapping lengths.
fn page_size() -> usize {
    #[cfg(unix)]
    {
        let n = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if n > 0 {
            return n as usize;
        }
    }
    4096
}

/// `len` rounded up to a whole number of pages.
pub(super) fn page_align(len: usize) -> usize {
    let page = page_size();
    len.div_ceil(page) * page
}

/// A file mapped read-only into memory, shared by every pipeline that posts it.
///
/// The mapping is dropped before the file handle; both go away when the last
/// `Arc<MappedFile>` is dropped after [`FileCache::release`](super::FileCache::release).
#[derive(Debug)]
pub struct MappedFile {
    path: PathBuf,
    size: u64,
    readers: AtomicUsize,
    map: Mmap,
    _file: File,
}

impl MappedFile {
    /// Open, stat and map `path`, expecting `readers` pipelines to read it.
    pub(super) fn open(path: &Path, readers: usize) -> Result<Self, CacheError> {
        let io_err = |op: &'static str| {
            let path = path.to_path_buf();
            move |source: std::io::Error| CacheError::Io { op, path, source }
        };

        let file = File::open(path).map_err(io_err("open"))?;
        let size = file.metadata().map_err(io_err("stat"))?.len();
        let len = usize::try_from(size).map_err(|_| {
            io_err("map")(std::io::Error::other("file too large to map"))
        })?;
        if len == 0 {
            return Err(io_err("map")(std::io::Error::other("cannot map an empty file")));
        }

        // Read-only shared mapping; the file is not expected to change during the run.
        let map = unsafe { MmapOptions::new().len(page_align(len)).map(&file) }
            .map_err(io_err("map"))?;
        tracing::debug!(path = %path.display(), size, "mapped file");

        Ok(Self {
            path: path.to_path_buf(),
            size,
            readers: AtomicUsize::new(readers),
            map,
            _file: file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File size in bytes (the mapping itself is page-aligned and may be longer).
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Pipelines that have not yet finished reading this file.
    pub fn readers(&self) -> usize {
        self.readers.load(Ordering::Acquire)
    }

    /// The whole file contents.
    pub fn data(&self) -> &[u8] {
        &self.map[..self.size as usize]
    }

    /// Bytes `[begin, end)` of the file.
    pub fn slice(&self, begin: u64, end: u64) -> Result<&[u8], CacheError> {
        if begin > end || end > self.size {
            return Err(CacheError::Consistency(format!(
                "range {}..{} outside {} ({} bytes)",
                begin,
                end,
                self.path.display(),
                self.size
            )));
        }
        Ok(&self.map[begin as usize..end as usize])
    }

    /// Atomically drop one reader. Returns true when this was the last one.
    pub(super) fn decrement(&self) -> Result<bool, CacheError> {
        self.readers
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .map(|previous| previous == 1)
            .map_err(|_| {
                CacheError::Consistency(format!(
                    "{} decremented below zero",
                    self.path.display()
                ))
            })
    }
}
