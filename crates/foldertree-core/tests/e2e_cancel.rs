/// End-to-end cancellation tests.
///
/// Every producer is cancelled only after it has demonstrably started
/// emitting results. The trees are large enough that the bounded channel
/// fills long before a producer could finish, so a cancelled run must stop
/// short of the full result set while still ending with exactly one `Done`.
use crossbeam_channel::{Receiver, RecvTimeoutError};
use foldertree_core::config::ScanSettings;
use foldertree_core::coordinator::ScanCoordinator;
use foldertree_core::model::LazyFsModel;
use foldertree_core::scanner::enumerate::start_enumeration;
use foldertree_core::scanner::progress::{ExpandEvent, SearchEvent, SizeEvent};
use foldertree_core::scanner::search::{start_search, SearchQuery};
use foldertree_core::scanner::sizes::start_size_scan;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Upper bound for a cancelled producer to wind down and disconnect.
const CANCEL_DEADLINE: Duration = Duration::from_secs(5);

// ── Helpers ──────────────────────────────────────────────────────────────────

/// `dirs` directories under `root`, each holding `files` one-byte files
/// named `hit{n}`.
fn build_wide_tree(root: &Path, dirs: usize, files: usize) {
    for d in 0..dirs {
        let dir = root.join(format!("d{d:04}"));
        fs::create_dir_all(&dir).unwrap();
        for f in 0..files {
            fs::write(dir.join(format!("hit{f:03}")), b"x").unwrap();
        }
    }
}

/// `outer` directories each holding `inner` empty subdirectories.
fn build_nested_dirs(root: &Path, outer: usize, inner: usize) -> usize {
    for o in 0..outer {
        for i in 0..inner {
            fs::create_dir_all(root.join(format!("o{o:02}/i{i:03}"))).unwrap();
        }
    }
    outer + outer * inner
}

/// Block until `pick` accepts an event, failing after 30 seconds.
fn wait_for<E, T>(rx: &Receiver<E>, mut pick: impl FnMut(E) -> Option<T>) -> T {
    let deadline = Instant::now() + Duration::from_secs(30);
    while Instant::now() < deadline {
        match rx.recv_timeout(Duration::from_millis(50)) {
            Ok(event) => {
                if let Some(found) = pick(event) {
                    return found;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => panic!("producer finished before emitting"),
        }
    }
    panic!("no matching event within 30 seconds");
}

/// Drain until the producer disconnects, failing after [`CANCEL_DEADLINE`].
fn drain_rest<E>(rx: &Receiver<E>) -> Vec<E> {
    let started = Instant::now();
    let mut events = Vec::new();
    loop {
        assert!(
            started.elapsed() < CANCEL_DEADLINE,
            "cancelled producer still running after {CANCEL_DEADLINE:?}"
        );
        match rx.recv_timeout(Duration::from_millis(50)) {
            Ok(event) => events.push(event),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => return events,
        }
    }
}

/// Collect every event of an uncancelled run.
fn drain_rest_unbounded<E>(rx: &Receiver<E>) -> Vec<E> {
    let deadline = Instant::now() + Duration::from_secs(60);
    let mut events = Vec::new();
    loop {
        assert!(Instant::now() < deadline, "producer did not finish within 60 seconds");
        match rx.recv_timeout(Duration::from_millis(50)) {
            Ok(event) => events.push(event),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => return events,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[test]
fn size_scan_cancelled_during_rollup() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    build_wide_tree(root, 5_000, 2);

    let full: HashMap<PathBuf, u64> = {
        let handle = start_size_scan(root.to_path_buf(), false).unwrap();
        let events = drain_rest_unbounded(&handle.events);
        events
            .into_iter()
            .filter_map(|e| match e {
                SizeEvent::Folder { path, size } => Some((path, size)),
                _ => None,
            })
            .collect()
    };
    assert_eq!(full.len(), 5_001);
    assert_eq!(full[root], 10_000);

    let handle = start_size_scan(root.to_path_buf(), false).unwrap();
    let first = wait_for(&handle.events, |e| match e {
        SizeEvent::Folder { path, size } => Some((path, size)),
        _ => None,
    });
    handle.cancel();

    let mut partial = vec![first];
    let mut dones = Vec::new();
    for event in drain_rest(&handle.events) {
        match event {
            SizeEvent::Folder { path, size } => partial.push((path, size)),
            SizeEvent::Done { cancelled, .. } => dones.push(cancelled),
            _ => {}
        }
    }

    assert_eq!(dones, vec![true]);
    assert!(
        partial.len() < full.len(),
        "cancelled scan emitted all {} folders",
        full.len()
    );
    for (path, size) in &partial {
        assert_eq!(full.get(path), Some(size), "{}", path.display());
    }
}

#[test]
fn search_cancelled_after_first_match() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    build_wide_tree(root, 100, 100);

    let full: HashSet<PathBuf> = {
        let handle = start_search(root.to_path_buf(), SearchQuery::new("hit"), 500).unwrap();
        match drain_rest_unbounded(&handle.events).pop() {
            Some(SearchEvent::Done { matches, cancelled }) => {
                assert!(!cancelled);
                matches.into_iter().collect()
            }
            other => panic!("last event was not Done: {other:?}"),
        }
    };
    assert_eq!(full.len(), 10_000);

    let handle = start_search(root.to_path_buf(), SearchQuery::new("hit"), 500).unwrap();
    let first = wait_for(&handle.events, |e| match e {
        SearchEvent::Found(path) => Some(path),
        _ => None,
    });
    handle.cancel();

    let mut found = vec![first];
    let mut dones = Vec::new();
    for event in drain_rest(&handle.events) {
        match event {
            SearchEvent::Found(path) => found.push(path),
            SearchEvent::Done { matches, cancelled } => dones.push((matches, cancelled)),
            SearchEvent::Progress { .. } => {}
        }
    }

    assert_eq!(dones.len(), 1);
    let (matches, cancelled) = dones.pop().unwrap();
    assert!(cancelled);
    assert_eq!(matches, found);
    assert!(matches.len() < full.len());
    assert!(matches.iter().all(|m| full.contains(m)));
}

#[test]
fn enumeration_cancelled_after_first_batch() {
    let tmp = TempDir::new().unwrap();
    let total = build_nested_dirs(tmp.path(), 20, 500);

    let handle = start_enumeration(tmp.path().to_path_buf()).unwrap();
    let first = wait_for(&handle.events, |e| match e {
        ExpandEvent::Batch(paths) => Some(paths),
        ExpandEvent::Done { .. } => None,
    });
    handle.cancel();

    let mut sent = first.len();
    let mut dones = Vec::new();
    for event in drain_rest(&handle.events) {
        match event {
            ExpandEvent::Batch(paths) => sent += paths.len(),
            ExpandEvent::Done { cancelled } => dones.push(cancelled),
        }
    }

    assert_eq!(dones, vec![true]);
    assert!(sent < total, "all {total} directories were sent");
}

#[test]
fn expand_all_stopped_mid_run() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();
    let total = build_nested_dirs(&root, 20, 500);

    let mut model = LazyFsModel::new(root.clone());
    let mut coord = ScanCoordinator::new(ScanSettings::default());
    coord.set_root(root).unwrap();
    assert!(coord.expand_all().unwrap());

    let deadline = Instant::now() + Duration::from_secs(30);
    while model.expanded_paths().is_empty() {
        assert!(Instant::now() < deadline, "nothing expanded within 30 seconds");
        coord.pump(&mut model);
        std::thread::sleep(Duration::from_millis(1));
    }

    let started = Instant::now();
    assert!(!coord.expand_all().unwrap());
    assert!(started.elapsed() < CANCEL_DEADLINE);
    assert!(!coord.is_expanding());
    assert!(!coord.is_busy());
    assert_eq!(coord.expand_stats(), None);

    let expanded = model.expanded_paths().len();
    assert!(expanded < total);
    for _ in 0..5 {
        assert!(!coord.pump(&mut model));
    }
    assert_eq!(model.expanded_paths().len(), expanded);
}
