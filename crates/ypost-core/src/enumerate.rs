//! Input path expansion.
//!
//! Resolves the files and directory trees given on the command line to a flat,
//! order-stable list of regular, non-empty files. Directory contents are walked
//! in file-name order so repeated runs post files in the same order.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::SetupError;

/// One file to post. Immutable once enumerated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: PathBuf,
    pub size: u64,
}

impl FileEntry {
    /// Base name used in the subject and the `=ybegin name=` field.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.to_string_lossy().into_owned())
    }

    /// Name of the directory containing the file, used for directory subjects.
    pub fn parent_name(&self) -> String {
        let named = |p: &Path| p.file_name().map(|n| n.to_string_lossy().into_owned());
        match self.path.parent() {
            Some(parent) => named(parent)
                .or_else(|| {
                    // "./file" or "file": resolve "." to a real directory name.
                    let base = if parent.as_os_str().is_empty() {
                        Path::new(".")
                    } else {
                        parent
                    };
                    std::fs::canonicalize(base).ok().and_then(|p| named(&p))
                })
                .unwrap_or_else(|| ".".to_string()),
            None => ".".to_string(),
        }
    }
}

/// Check that every input exists, and that it is a directory when directory
/// subjects are requested.
pub fn check_inputs<P: AsRef<Path>>(inputs: &[P], require_dirs: bool) -> Result<(), SetupError> {
    for input in inputs {
        let path = input.as_ref();
        let meta = std::fs::metadata(path).map_err(|source| SetupError::BadPath {
            path: path.to_path_buf(),
            source,
        })?;
        if require_dirs && !meta.is_dir() {
            return Err(SetupError::NotADirectory(path.to_path_buf()));
        }
    }
    Ok(())
}

/// Expand `inputs` into the list of files to post.
///
/// Files are returned in input order; directories are expanded recursively in
/// file-name order. Empty files and non-regular files are skipped, and a path
/// reached twice is only listed once.
pub fn enumerate_files<P: AsRef<Path>>(inputs: &[P]) -> Result<Vec<FileEntry>, SetupError> {
    let mut files = Vec::new();
    let mut seen = HashSet::new();

    for input in inputs {
        let root = input.as_ref();
        for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(root).to_path_buf();
                let source = e
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("filesystem loop"));
                SetupError::BadPath { path, source }
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let meta = entry.metadata().map_err(|e| {
                let source = e
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("metadata unavailable"));
                SetupError::BadPath {
                    path: entry.path().to_path_buf(),
                    source,
                }
            })?;
            if meta.len() == 0 {
                tracing::debug!(path = %entry.path().display(), "skipping empty file");
                continue;
            }
            let path = entry.into_path();
            if !seen.insert(path.clone()) {
                continue;
            }
            files.push(FileEntry {
                path,
                size: meta.len(),
            });
        }
    }

    for fd in &files {
        tracing::debug!(path = %fd.path.display(), size = fd.size, "queued file");
    }
    Ok(files)
}
