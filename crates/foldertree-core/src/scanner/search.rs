/// Substring search over file and directory names — the search producer.
///
/// Walks the tree with [`DirectoryWalker`] and tests every entry name, each
/// directory's subdirectories before its files. Matches stream out as
/// [`SearchEvent::Found`] in discovery order, which is also the order the
/// consumer navigates them in.
use super::progress::SearchEvent;
use super::walker::{validate_root, DirectoryWalker};
use super::{spawn_producer, CancellationToken, ProducerHandle};
use crate::config::DEFAULT_SEARCH_PROGRESS_EVERY;
use crate::error::ScanError;
use compact_str::CompactString;
use crossbeam_channel::Sender;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

/// Voluntary pause after each progress event.
const PROGRESS_YIELD: Duration = Duration::from_millis(1);

/// A compiled search needle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    needle: CompactString,
    case_insensitive: bool,
}

impl SearchQuery {
    /// Case-insensitive query. Surrounding whitespace is ignored.
    pub fn new(needle: &str) -> Self {
        Self::with_case(needle, true)
    }

    pub fn with_case(needle: &str, case_insensitive: bool) -> Self {
        let needle = needle.trim();
        let needle = if case_insensitive {
            CompactString::new(needle.to_lowercase())
        } else {
            CompactString::new(needle)
        };
        Self {
            needle,
            case_insensitive,
        }
    }

    /// An empty needle never matches anything.
    pub fn is_empty(&self) -> bool {
        self.needle.is_empty()
    }

    /// Test one entry name. Names that are not valid UTF-8 are compared
    /// through their lossy form.
    pub fn matches(&self, name: impl AsRef<OsStr>) -> bool {
        if self.needle.is_empty() {
            return false;
        }
        let name = name.as_ref().to_string_lossy();
        if self.case_insensitive {
            name.to_lowercase().contains(self.needle.as_str())
        } else {
            name.contains(self.needle.as_str())
        }
    }
}

/// Start a search under `root` on a background thread.
pub fn start_search(
    root: PathBuf,
    query: SearchQuery,
    progress_every: u64,
) -> Result<ProducerHandle<SearchEvent>, ScanError> {
    validate_root(&root)?;
    let thread_root = root.clone();
    spawn_producer("search", root, move |tx, cancel| {
        search(&thread_root, &query, progress_every, &tx, &cancel);
    })
}

/// Run a search on the calling thread.
///
/// Always finishes by sending exactly one [`SearchEvent::Done`] carrying
/// every match found, even when cancelled part way.
pub fn search(
    root: &Path,
    query: &SearchQuery,
    progress_every: u64,
    tx: &Sender<SearchEvent>,
    cancel: &CancellationToken,
) {
    let progress_every = if progress_every == 0 {
        DEFAULT_SEARCH_PROGRESS_EVERY
    } else {
        progress_every
    };
    let mut matches = Vec::new();
    let mut cancelled = false;

    if query.is_empty() {
        debug!("Empty search needle; nothing to do");
    } else {
        info!("Searching {} for {:?}", root.display(), query.needle);
        cancelled = walk_and_match(root, query, progress_every, tx, cancel, &mut matches);
        info!(
            "Search finished: {} matches{}",
            matches.len(),
            if cancelled { " (cancelled)" } else { "" }
        );
    }

    let _ = tx.send(SearchEvent::Done { matches, cancelled });
}

/// Returns `true` if the search stopped early.
fn walk_and_match(
    root: &Path,
    query: &SearchQuery,
    progress_every: u64,
    tx: &Sender<SearchEvent>,
    cancel: &CancellationToken,
    matches: &mut Vec<PathBuf>,
) -> bool {
    let walker = match DirectoryWalker::new(root, cancel.clone()) {
        Ok(w) => w,
        Err(err) => {
            debug!("Search aborted: {err}");
            return false;
        }
    };

    let mut visited = 0u64;
    for entry in walker {
        for name in entry.subdirs.iter().chain(entry.files.iter()) {
            if cancel.is_cancelled() {
                return true;
            }
            visited += 1;
            if query.matches(name) {
                let path = entry.dir.join(name);
                if tx.send(SearchEvent::Found(path.clone())).is_err() {
                    return true;
                }
                matches.push(path);
            }
            if visited % progress_every == 0 {
                let _ = tx.send(SearchEvent::Progress {
                    visited,
                    current_dir: entry.dir.clone(),
                });
                thread::sleep(PROGRESS_YIELD);
            }
        }
    }
    cancel.is_cancelled()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn collect(root: &Path, needle: &str) -> Vec<SearchEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        search(
            root,
            &SearchQuery::new(needle),
            DEFAULT_SEARCH_PROGRESS_EVERY,
            &tx,
            &CancellationToken::new(),
        );
        drop(tx);
        rx.iter().collect()
    }

    fn done_matches(events: &[SearchEvent]) -> Vec<PathBuf> {
        match events.last() {
            Some(SearchEvent::Done { matches, .. }) => matches.clone(),
            other => panic!("last event was not Done: {other:?}"),
        }
    }

    #[test]
    fn query_is_case_insensitive_by_default() {
        let q = SearchQuery::new("LOG");
        assert!(q.matches("app.log"));
        assert!(q.matches("Catalog"));
        assert!(!q.matches("app.txt"));

        let strict = SearchQuery::with_case("LOG", false);
        assert!(!strict.matches("app.log"));
        assert!(strict.matches("APP.LOG"));
    }

    #[test]
    fn empty_needle_never_matches() {
        assert!(!SearchQuery::new("").matches("anything"));
        assert!(!SearchQuery::new("   ").matches("   "));
    }

    #[test]
    fn matches_dirs_and_files_in_discovery_order() {
        let tmp = TempDir::new().unwrap();
        let r = tmp.path();
        fs::create_dir_all(r.join("logs/old")).unwrap();
        fs::write(r.join("app.log"), b"").unwrap();
        fs::write(r.join("logs/old/x.LOG"), b"").unwrap();
        fs::write(r.join("readme.md"), b"").unwrap();

        let events = collect(r, "log");
        let found: Vec<PathBuf> = events
            .iter()
            .filter_map(|e| match e {
                SearchEvent::Found(p) => Some(p.clone()),
                _ => None,
            })
            .collect();
        let expected = vec![r.join("logs"), r.join("app.log"), r.join("logs/old/x.LOG")];
        assert_eq!(found, expected);
        assert_eq!(done_matches(&events), expected);
    }

    #[test]
    fn empty_needle_still_sends_done() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a"), b"").unwrap();
        let events = collect(tmp.path(), "");
        assert_eq!(events.len(), 1);
        assert!(done_matches(&events).is_empty());
    }

    #[test]
    fn progress_every_n_entries() {
        let tmp = TempDir::new().unwrap();
        for i in 0..25 {
            fs::write(tmp.path().join(format!("f{i}")), b"").unwrap();
        }
        let (tx, rx) = crossbeam_channel::unbounded();
        search(
            tmp.path(),
            &SearchQuery::new("zzz"),
            10,
            &tx,
            &CancellationToken::new(),
        );
        drop(tx);
        let visited: Vec<u64> = rx
            .iter()
            .filter_map(|e| match e {
                SearchEvent::Progress { visited, .. } => Some(visited),
                _ => None,
            })
            .collect();
        assert_eq!(visited, vec![10, 20]);
    }

    #[test]
    fn cancelled_search_reports_partial_matches() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("match"), b"").unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let (tx, rx) = crossbeam_channel::unbounded();
        search(tmp.path(), &SearchQuery::new("match"), 500, &tx, &cancel);
        drop(tx);
        let events: Vec<SearchEvent> = rx.iter().collect();
        assert!(matches!(
            events.as_slice(),
            [SearchEvent::Done { cancelled: true, matches }] if matches.is_empty()
        ));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn non_utf8_match_is_a_real_path() {
        use std::os::unix::ffi::OsStrExt;

        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join(OsStr::from_bytes(b"log\xff.txt"));
        fs::write(&file, b"").unwrap();

        let events = collect(tmp.path(), "log");
        let found = done_matches(&events);
        assert_eq!(found, vec![file]);
        assert!(found[0].exists());
    }
}
