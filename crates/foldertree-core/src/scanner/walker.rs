/// Cancellable depth-first directory walker shared by every producer.
///
/// Yields one [`WalkEntry`] per readable directory, in pre-order: a
/// directory is yielded before any of its descendants, and its
/// subdirectories are visited in name order. Each step reads exactly one
/// directory listing, so cancellation is observed within one directory's
/// worth of work.
///
/// Unreadable directories and entries (permission denied, deleted while the
/// walk was running) are skipped and counted, never raised. Symbolic links
/// are reported as files and never followed, so link loops cannot occur.
use super::CancellationToken;
use crate::error::ScanError;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One directory's immediate contents.
#[derive(Debug, Clone)]
pub struct WalkEntry {
    pub dir: PathBuf,
    /// Distance from the walk root (the root itself is 0).
    pub depth: usize,
    /// Names of immediate subdirectories, sorted. Kept as raw OS strings so
    /// names that are not valid UTF-8 still join back to real paths.
    pub subdirs: Vec<OsString>,
    /// Names of immediate non-directory entries, sorted.
    pub files: Vec<OsString>,
}

impl WalkEntry {
    pub fn subdir_paths(&self) -> impl Iterator<Item = PathBuf> + '_ {
        self.subdirs.iter().map(|name| self.dir.join(name))
    }

    pub fn file_paths(&self) -> impl Iterator<Item = PathBuf> + '_ {
        self.files.iter().map(|name| self.dir.join(name))
    }
}

/// Reject roots that cannot be walked at all.
pub fn validate_root(root: &Path) -> Result<(), ScanError> {
    match fs::metadata(root) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(ScanError::NotADirectory(root.to_path_buf())),
        Err(_) => Err(ScanError::RootNotFound(root.to_path_buf())),
    }
}

pub struct DirectoryWalker {
    /// Directories still to visit; the top of the stack is visited next.
    stack: Vec<(PathBuf, usize)>,
    cancel: CancellationToken,
    skipped: u64,
}

impl DirectoryWalker {
    pub fn new(root: &Path, cancel: CancellationToken) -> Result<Self, ScanError> {
        validate_root(root)?;
        Ok(Self {
            stack: vec![(root.to_path_buf(), 0)],
            cancel,
            skipped: 0,
        })
    }

    /// Directories and entries skipped because they could not be read.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    fn read_entry(&mut self, dir: PathBuf, depth: usize) -> Option<WalkEntry> {
        let read_dir = match fs::read_dir(&dir) {
            Ok(rd) => rd,
            Err(err) => {
                debug!("Skipping unreadable directory {}: {err}", dir.display());
                self.skipped += 1;
                return None;
            }
        };

        let mut subdirs = Vec::new();
        let mut files = Vec::new();
        for entry in read_dir {
            let entry = match entry {
                Ok(e) => e,
                Err(err) => {
                    debug!("Skipping entry in {}: {err}", dir.display());
                    self.skipped += 1;
                    continue;
                }
            };
            let file_type = match entry.file_type() {
                Ok(t) => t,
                Err(err) => {
                    debug!("Skipping {}: {err}", entry.path().display());
                    self.skipped += 1;
                    continue;
                }
            };
            let name = entry.file_name();
            if file_type.is_dir() {
                subdirs.push(name);
            } else {
                files.push(name);
            }
        }
        subdirs.sort_unstable();
        files.sort_unstable();

        // Reverse so the first subdirectory ends up on top of the stack.
        for name in subdirs.iter().rev() {
            self.stack.push((dir.join(name), depth + 1));
        }

        Some(WalkEntry {
            dir,
            depth,
            subdirs,
            files,
        })
    }
}

impl Iterator for DirectoryWalker {
    type Item = WalkEntry;

    fn next(&mut self) -> Option<WalkEntry> {
        loop {
            if self.cancel.is_cancelled() {
                self.stack.clear();
                return None;
            }
            let (dir, depth) = self.stack.pop()?;
            if let Some(entry) = self.read_entry(dir, depth) {
                return Some(entry);
            }
        }
    }
}
