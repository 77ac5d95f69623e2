/// Events streamed from producer threads to the consumer.
///
/// Each producer has its own event type. Every type has exactly one
/// terminal variant (`Done`), sent once whether the producer finished,
/// was cancelled, or hit an error mid-walk.
use std::path::PathBuf;
use std::time::Duration;

/// Which half of a folder-size scan a progress event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizePhase {
    /// Walking the tree and summing each directory's own files.
    Walking,
    /// Rolling totals up from the deepest directories.
    RollingUp,
}

/// Events from the folder-size producer.
#[derive(Debug)]
pub enum SizeEvent {
    /// Periodic update. `total` is `None` while walking without a precount.
    Progress {
        phase: SizePhase,
        current: usize,
        total: Option<usize>,
        path: PathBuf,
    },
    /// A directory's cumulative size is final.
    Folder { path: PathBuf, size: u64 },
    /// A non-fatal error (e.g. permission denied on one file).
    Error { path: String, message: String },
    /// Terminal event.
    Done {
        cancelled: bool,
        folders: usize,
        duration: Duration,
    },
}

/// Events from the search producer.
#[derive(Debug)]
pub enum SearchEvent {
    /// A matching file or directory, in discovery order.
    Found(PathBuf),
    /// Periodic update: entries visited so far and the directory being read.
    Progress { visited: u64, current_dir: PathBuf },
    /// Terminal event with every match collected, possibly partial.
    Done {
        matches: Vec<PathBuf>,
        cancelled: bool,
    },
}

/// Events from the expand-all enumerator.
#[derive(Debug)]
pub enum ExpandEvent {
    /// A batch of directory paths, in walk order.
    Batch(Vec<PathBuf>),
    /// Terminal event.
    Done { cancelled: bool },
}
