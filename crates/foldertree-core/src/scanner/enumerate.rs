/// Directory enumerator feeding "expand all".
///
/// Walks the tree and streams every directory below the root (the root
/// itself is already shown) in walk order, batched so the consumer gets a
/// few large messages instead of one per directory.
use super::progress::ExpandEvent;
use super::walker::{validate_root, DirectoryWalker};
use super::{spawn_producer, CancellationToken, ProducerHandle};
use crate::error::ScanError;
use crossbeam_channel::Sender;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

/// Directory paths per [`ExpandEvent::Batch`].
pub const ENUMERATE_BATCH_SIZE: usize = 1_000;

/// Pause after each batch so the consumer's queue can catch up.
const BATCH_PAUSE: Duration = Duration::from_millis(10);

/// Start enumerating directories under `root` on a background thread.
pub fn start_enumeration(root: PathBuf) -> Result<ProducerHandle<ExpandEvent>, ScanError> {
    validate_root(&root)?;
    let thread_root = root.clone();
    spawn_producer("expand", root, move |tx, cancel| {
        enumerate_dirs(&thread_root, ENUMERATE_BATCH_SIZE, &tx, &cancel);
    })
}

/// Enumerate on the calling thread. Always ends with one [`ExpandEvent::Done`].
pub fn enumerate_dirs(
    root: &Path,
    batch_size: usize,
    tx: &Sender<ExpandEvent>,
    cancel: &CancellationToken,
) {
    let batch_size = batch_size.max(1);
    let mut sent = 0usize;

    let cancelled = match DirectoryWalker::new(root, cancel.clone()) {
        Ok(walker) => {
            info!("Enumerating directories under {}", root.display());
            let mut batch = Vec::with_capacity(batch_size);
            let mut stopped = false;
            'walk: for entry in walker {
                for path in entry.subdir_paths() {
                    if cancel.is_cancelled() {
                        stopped = true;
                        break 'walk;
                    }
                    batch.push(path);
                    if batch.len() >= batch_size {
                        sent += batch.len();
                        let full = std::mem::replace(&mut batch, Vec::with_capacity(batch_size));
                        if tx.send(ExpandEvent::Batch(full)).is_err() {
                            stopped = true;
                            break 'walk;
                        }
                        thread::sleep(BATCH_PAUSE);
                    }
                }
            }
            if !batch.is_empty() && !stopped {
                sent += batch.len();
                let _ = tx.send(ExpandEvent::Batch(batch));
            }
            stopped || cancel.is_cancelled()
        }
        Err(err) => {
            debug!("Enumeration aborted: {err}");
            false
        }
    };

    debug!("Enumerated {sent} directories (cancelled: {cancelled})");
    let _ = tx.send(ExpandEvent::Done { cancelled });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn batches_subdirectories_in_walk_order() {
        let tmp = TempDir::new().unwrap();
        let r = tmp.path();
        fs::create_dir_all(r.join("a/x")).unwrap();
        fs::create_dir_all(r.join("b")).unwrap();
        fs::write(r.join("file"), b"").unwrap();

        let (tx, rx) = crossbeam_channel::unbounded();
        enumerate_dirs(r, 2, &tx, &CancellationToken::new());
        drop(tx);
        let events: Vec<ExpandEvent> = rx.iter().collect();

        let mut paths = Vec::new();
        let mut batch_sizes = Vec::new();
        for event in &events[..events.len() - 1] {
            match event {
                ExpandEvent::Batch(b) => {
                    batch_sizes.push(b.len());
                    paths.extend(b.iter().cloned());
                }
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(paths, vec![r.join("a"), r.join("b"), r.join("a/x")]);
        assert_eq!(batch_sizes, vec![2, 1]);
        assert!(matches!(
            events.last(),
            Some(ExpandEvent::Done { cancelled: false })
        ));
    }
}
