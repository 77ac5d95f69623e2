/// Cumulative folder sizes — the size-scan producer.
///
/// Two phases:
///
/// 1. **Walk.** Every directory's *own* size is the sum of its immediate
///    files (symlinks count as their link size; subdirectories excluded).
///    Unreadable files contribute 0 and are reported as non-fatal errors.
/// 2. **Rollup.** Directories are processed deepest first. When a directory
///    comes up, every descendant has already been processed and has added
///    its total into its parent's bucket, so the directory's own bucket now
///    holds its final cumulative size. It is emitted, then added into its
///    own parent's bucket.
///
/// A directory that was listed but could not be read never enters the
/// table and so contributes 0 to its parent.
use super::precount;
use super::progress::{SizeEvent, SizePhase};
use super::walker::{validate_root, DirectoryWalker};
use super::{spawn_producer, CancellationToken, ProducerHandle};
use crate::error::ScanError;
use crossbeam_channel::Sender;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Directories processed between progress events, in both phases.
const PROGRESS_EVERY_DIRS: usize = 100;

/// Voluntary pause after each progress event so the consumer keeps up.
const PROGRESS_YIELD: Duration = Duration::from_millis(1);

/// Start a folder-size scan of `root` on a background thread.
///
/// Fails only if `root` is not a readable directory or the thread cannot be
/// spawned.
pub fn start_size_scan(
    root: PathBuf,
    precount: bool,
) -> Result<ProducerHandle<SizeEvent>, ScanError> {
    validate_root(&root)?;
    let thread_root = root.clone();
    spawn_producer("sizes", root, move |tx, cancel| {
        compute_sizes(&thread_root, precount, &tx, &cancel);
    })
}

/// Run a folder-size scan on the calling thread.
///
/// Always finishes by sending exactly one [`SizeEvent::Done`].
pub fn compute_sizes(
    root: &Path,
    precount: bool,
    tx: &Sender<SizeEvent>,
    cancel: &CancellationToken,
) {
    let start = Instant::now();
    info!("Computing folder sizes under {}", root.display());

    let (cancelled, folders) = run(root, precount, tx, cancel);

    let duration = start.elapsed();
    if cancelled {
        info!("Folder size scan cancelled after {folders} folders");
    } else {
        info!("Folder sizes complete: {folders} folders in {duration:?}");
    }
    let _ = tx.send(SizeEvent::Done {
        cancelled,
        folders,
        duration,
    });
}

/// Returns `(cancelled, folders_emitted)`. A disconnected consumer is
/// treated like a cancellation.
fn run(
    root: &Path,
    precount: bool,
    tx: &Sender<SizeEvent>,
    cancel: &CancellationToken,
) -> (bool, usize) {
    let walker = match DirectoryWalker::new(root, cancel.clone()) {
        Ok(w) => w,
        Err(err) => {
            let _ = tx.send(SizeEvent::Error {
                path: root.to_string_lossy().into_owned(),
                message: err.to_string(),
            });
            return (false, 0);
        }
    };

    let walk_total = if precount {
        let n = precount::count_dirs(root, cancel);
        debug!("Precount: {n} directories");
        Some(n)
    } else {
        None
    };

    // ── Phase 1: own sizes ─────────────────────────────────────────────
    let mut totals: HashMap<PathBuf, u64> = HashMap::new();
    let mut order: Vec<(PathBuf, usize)> = Vec::new();

    for entry in walker {
        let mut own = 0u64;
        for path in entry.file_paths() {
            if cancel.is_cancelled() {
                break;
            }
            match fs::symlink_metadata(&path) {
                Ok(meta) => own += meta.len(),
                Err(err) => {
                    debug!("Cannot stat {}: {err}", path.display());
                    let _ = tx.send(SizeEvent::Error {
                        path: path.to_string_lossy().into_owned(),
                        message: err.to_string(),
                    });
                }
            }
        }
        totals.insert(entry.dir.clone(), own);
        order.push((entry.dir, entry.depth));

        if order.len() % PROGRESS_EVERY_DIRS == 0 {
            let event = SizeEvent::Progress {
                phase: SizePhase::Walking,
                current: order.len(),
                total: walk_total,
                path: order[order.len() - 1].0.clone(),
            };
            if tx.send(event).is_err() {
                return (true, 0);
            }
            thread::sleep(PROGRESS_YIELD);
        }
    }
    if cancel.is_cancelled() {
        return (true, 0);
    }

    // ── Phase 2: rollup, deepest first ─────────────────────────────────
    // Stable sort keeps walk order among directories of equal depth.
    order.sort_by(|a, b| b.1.cmp(&a.1));
    let total = order.len();

    for (i, (dir, _)) in order.iter().enumerate() {
        if cancel.is_cancelled() {
            return (true, i);
        }
        let size = totals.get(dir).copied().unwrap_or(0);
        if let Some(bucket) = dir.parent().and_then(|p| totals.get_mut(p)) {
            *bucket += size;
        }
        if tx
            .send(SizeEvent::Folder {
                path: dir.clone(),
                size,
            })
            .is_err()
        {
            return (true, i);
        }

        let done = i + 1;
        if done % PROGRESS_EVERY_DIRS == 0 || done == total {
            let _ = tx.send(SizeEvent::Progress {
                phase: SizePhase::RollingUp,
                current: done,
                total: Some(total),
                path: dir.clone(),
            });
            thread::sleep(PROGRESS_YIELD);
        }
    }

    (false, total)
}
