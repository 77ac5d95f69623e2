/// Scan coordination — the consumer side of every producer.
///
/// Centralises all mutable engine state a frontend reads: the size table,
/// the search match set, the expand-all queue and per-producer status. The
/// producer threads communicate only via channels; state updates happen in
/// [`ScanCoordinator::pump`], which the frontend calls from the thread that
/// owns its tree model (typically once per frame or every
/// [`TICK_INTERVAL`](crate::expand::TICK_INTERVAL)).
///
/// At most one producer of each kind runs at a time, always bound to the
/// current root. Replacing one first cancels it and waits (bounded) for its
/// thread to finish, so results from a stale root can never be merged.
use crate::config::ScanSettings;
use crate::error::ScanError;
use crate::expand::{ExpandStats, ExpandTick, LazyTreeExpander};
use crate::model::{SearchMatchSet, SizeTable, TreeModel};
use crate::scanner::progress::{SearchEvent, SizeEvent, SizePhase};
use crate::scanner::search::{start_search, SearchQuery};
use crate::scanner::sizes::start_size_scan;
use crate::scanner::walker::validate_root;
use crate::scanner::{ProducerHandle, SHUTDOWN_TIMEOUT, STOP_TIMEOUT};
use crossbeam_channel::TryRecvError;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Maximum producer events applied per channel per [`ScanCoordinator::pump`].
///
/// Prevents a backlog (e.g. after the window was hidden) from blocking the
/// owning thread for a perceptible duration when it is eventually drained.
const MAX_EVENTS_PER_TICK: usize = 300;

/// Maximum non-fatal errors retained for display.
pub const MAX_SCAN_ERRORS: usize = 1_000;

/// Lifecycle of a single producer kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Activity {
    #[default]
    Idle,
    Running,
    Finished,
    Cancelled,
}

#[derive(Debug, Clone, Default)]
pub struct SizeStatus {
    pub activity: Activity,
    pub phase: Option<SizePhase>,
    pub current: usize,
    /// `None` while walking without a precount.
    pub total: Option<usize>,
    pub current_path: PathBuf,
    pub duration: Option<Duration>,
}

impl SizeStatus {
    /// Percentage through the current phase, when a total is known.
    pub fn percent(&self) -> Option<u8> {
        match self.total {
            Some(total) if total > 0 => {
                Some((self.current.min(total) * 100 / total) as u8)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchStatus {
    pub activity: Activity,
    pub visited: u64,
    pub current_dir: PathBuf,
}

/// External operations that change the tree under the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    Rename,
    Delete,
    Paste,
}

pub struct ScanCoordinator {
    settings: ScanSettings,
    root: Option<PathBuf>,

    // ── Folder sizes ───────────────────────────────────
    sizes: SizeTable,
    size_scan: Option<ProducerHandle<SizeEvent>>,
    size_status: SizeStatus,

    // ── Search ─────────────────────────────────────────
    search: Option<ProducerHandle<SearchEvent>>,
    matches: Option<SearchMatchSet>,
    search_status: SearchStatus,

    // ── Expand all ─────────────────────────────────────
    expander: LazyTreeExpander,
    last_expand: Option<ExpandStats>,

    errors: Vec<(String, String)>,
}

impl ScanCoordinator {
    pub fn new(settings: ScanSettings) -> Self {
        let expander = LazyTreeExpander::new(settings.expand_batch_size);
        Self {
            settings,
            root: None,
            sizes: SizeTable::new(),
            size_scan: None,
            size_status: SizeStatus::default(),
            search: None,
            matches: None,
            search_status: SearchStatus::default(),
            expander,
            last_expand: None,
            errors: Vec::new(),
        }
    }

    pub fn settings(&self) -> &ScanSettings {
        &self.settings
    }

    /// Replace the settings. Turning folder sizes on starts a scan of the
    /// current root; the expand batch size applies from the next run.
    pub fn set_settings(&mut self, settings: ScanSettings) -> Result<(), ScanError> {
        let enable_sizes = settings.compute_folder_sizes && !self.settings.compute_folder_sizes;
        if !self.expander.is_active() {
            self.expander = LazyTreeExpander::new(settings.expand_batch_size);
        }
        self.settings = settings;
        if enable_sizes && self.root.is_some() {
            self.compute_sizes()?;
        }
        Ok(())
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Switch to a new root.
    ///
    /// Stops every producer, discards all results tied to the old root and,
    /// if folder sizes are enabled, starts a size scan of the new one.
    pub fn set_root(&mut self, root: PathBuf) -> Result<(), ScanError> {
        validate_root(&root)?;
        info!("Root changed to {}", root.display());
        self.stop_all(STOP_TIMEOUT);

        self.root = Some(root);
        self.sizes.clear();
        self.size_status = SizeStatus::default();
        self.matches = None;
        self.search_status = SearchStatus::default();
        self.last_expand = None;
        self.errors.clear();

        if self.settings.compute_folder_sizes {
            self.compute_sizes()?;
        }
        Ok(())
    }

    fn require_root(&self) -> Result<PathBuf, ScanError> {
        self.root.clone().ok_or(ScanError::NoRoot)
    }

    // ── Folder sizes ───────────────────────────────────

    /// (Re)start the folder-size scan of the current root.
    pub fn compute_sizes(&mut self) -> Result<(), ScanError> {
        let root = self.require_root()?;
        self.cancel_sizes();
        self.sizes.clear();

        let handle = start_size_scan(root, self.settings.precount_for_progress)?;
        self.size_status = SizeStatus {
            activity: Activity::Running,
            current_path: handle.root().to_path_buf(),
            ..SizeStatus::default()
        };
        self.size_scan = Some(handle);
        Ok(())
    }

    /// Stop the size scan, keeping whatever sizes have arrived.
    pub fn cancel_sizes(&mut self) {
        if let Some(mut handle) = self.size_scan.take() {
            handle.stop(STOP_TIMEOUT);
            self.size_status.activity = Activity::Cancelled;
        }
    }

    pub fn sizes(&self) -> &SizeTable {
        &self.sizes
    }

    pub fn folder_size(&self, path: &Path) -> Option<u64> {
        self.sizes.get(path)
    }

    pub fn size_status(&self) -> &SizeStatus {
        &self.size_status
    }

    // ── Search ─────────────────────────────────────────

    /// Start a new search of the current root, discarding previous matches.
    pub fn search(&mut self, needle: &str) -> Result<(), ScanError> {
        let root = self.require_root()?;
        self.cancel_search();
        self.matches = None;
        self.search_status = SearchStatus::default();

        let needle = needle.trim();
        let handle = start_search(
            root,
            SearchQuery::new(needle),
            self.settings.search_progress_every,
        )?;
        self.matches = Some(SearchMatchSet::new(needle));
        self.search_status = SearchStatus {
            activity: Activity::Running,
            ..SearchStatus::default()
        };
        self.search = Some(handle);
        Ok(())
    }

    /// "Find next": navigate existing matches for `needle`, or start a new
    /// search if there are none for it yet.
    ///
    /// Returns the match now selected, if any. A blank needle does nothing.
    pub fn find_next(&mut self, needle: &str) -> Result<Option<PathBuf>, ScanError> {
        let needle = needle.trim();
        if needle.is_empty() {
            return Ok(None);
        }
        let same_needle = self.matches.as_ref().is_some_and(|m| m.is_for(needle));
        if same_needle {
            if let Some(matches) = self.matches.as_mut().filter(|m| !m.is_empty()) {
                return Ok(matches.next().map(Path::to_path_buf));
            }
            if self.search.is_some() {
                // Still searching; nothing to navigate yet.
                return Ok(None);
            }
        }
        self.search(needle)?;
        Ok(None)
    }

    /// "Find previous": navigate existing matches backwards. No-op without
    /// matches.
    pub fn find_prev(&mut self) -> Option<PathBuf> {
        self.matches
            .as_mut()
            .and_then(|m| m.prev())
            .map(Path::to_path_buf)
    }

    pub fn cancel_search(&mut self) {
        if let Some(mut handle) = self.search.take() {
            handle.stop(STOP_TIMEOUT);
            self.search_status.activity = Activity::Cancelled;
        }
    }

    pub fn matches(&self) -> Option<&SearchMatchSet> {
        self.matches.as_ref()
    }

    pub fn search_status(&self) -> &SearchStatus {
        &self.search_status
    }

    // ── Expand all ─────────────────────────────────────

    /// Toggle "expand all": start it if idle, stop it if running.
    ///
    /// Returns `true` if expansion is now running.
    pub fn expand_all(&mut self) -> Result<bool, ScanError> {
        if self.expander.is_active() {
            self.stop_expansion();
            return Ok(false);
        }
        let root = self.require_root()?;
        self.last_expand = None;
        self.expander.start(root)?;
        Ok(true)
    }

    pub fn stop_expansion(&mut self) {
        self.expander.stop();
    }

    pub fn is_expanding(&self) -> bool {
        self.expander.is_active()
    }

    /// Live counters while expanding, else the last completed run's.
    pub fn expand_stats(&self) -> Option<ExpandStats> {
        if self.expander.is_active() {
            Some(self.expander.stats())
        } else {
            self.last_expand
        }
    }

    // ── Mutations ──────────────────────────────────────

    /// React to a completed external rename / delete / paste.
    ///
    /// `paths` are every path the operation touched (for a rename, both the
    /// old and new names). Search and expansion state referring to them is
    /// dropped, and sizes are recomputed if they are being tracked.
    pub fn notify_mutation(&mut self, kind: Mutation, paths: &[PathBuf]) -> Result<(), ScanError> {
        let Some(root) = self.root.clone() else {
            return Ok(());
        };
        let affected: Vec<&PathBuf> = paths
            .iter()
            .filter(|p| p.starts_with(&root) || root.starts_with(p))
            .collect();
        if affected.is_empty() {
            return Ok(());
        }
        debug!("{kind:?} touched {} paths under the root", affected.len());

        let stale_matches = self
            .matches
            .as_ref()
            .is_some_and(|m| affected.iter().any(|p| m.touches(p)));
        if stale_matches {
            self.cancel_search();
            self.matches = None;
            self.search_status = SearchStatus::default();
        }
        for path in &affected {
            self.expander.discard_under(path);
        }

        if self.settings.compute_folder_sizes {
            self.compute_sizes()?;
        }
        Ok(())
    }

    // ── Consumer tick ──────────────────────────────────

    /// Apply pending producer events and run one expansion batch.
    ///
    /// Returns `true` if anything visible changed.
    pub fn pump<M: TreeModel>(&mut self, model: &mut M) -> bool {
        let mut changed = self.drain_sizes();
        changed |= self.drain_search();
        match self.expander.tick(model) {
            ExpandTick::Idle => {}
            ExpandTick::Running(_) => changed = true,
            ExpandTick::Finished(stats) => {
                self.last_expand = Some(stats);
                changed = true;
            }
        }
        changed
    }

    /// True while any producer or the expander still has work.
    pub fn is_busy(&self) -> bool {
        self.size_scan.is_some() || self.search.is_some() || self.expander.is_active()
    }

    /// Non-fatal errors reported by the size scan (capped).
    pub fn errors(&self) -> &[(String, String)] {
        &self.errors
    }

    /// Stop everything, giving each producer up to two seconds to exit.
    pub fn shutdown(&mut self) {
        info!("Shutting down scan coordinator");
        self.stop_all(SHUTDOWN_TIMEOUT);
    }

    fn stop_all(&mut self, timeout: Duration) {
        if let Some(mut handle) = self.size_scan.take() {
            handle.stop(timeout);
        }
        if let Some(mut handle) = self.search.take() {
            handle.stop(timeout);
        }
        self.expander.stop();
    }

    fn drain_sizes(&mut self) -> bool {
        let Some(handle) = &self.size_scan else {
            return false;
        };
        let mut changed = false;
        let mut finished = false;

        for _ in 0..MAX_EVENTS_PER_TICK {
            let event = match handle.events.try_recv() {
                Ok(e) => e,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.size_status.activity = Activity::Finished;
                    finished = true;
                    break;
                }
            };
            changed = true;
            match event {
                SizeEvent::Progress {
                    phase,
                    current,
                    total,
                    path,
                } => {
                    self.size_status.phase = Some(phase);
                    self.size_status.current = current;
                    self.size_status.total = total;
                    self.size_status.current_path = path;
                }
                SizeEvent::Folder { path, size } => {
                    self.sizes.insert(path, size);
                }
                SizeEvent::Error { path, message } => {
                    if self.errors.len() < MAX_SCAN_ERRORS {
                        self.errors.push((path, message));
                    }
                }
                SizeEvent::Done {
                    cancelled,
                    duration,
                    ..
                } => {
                    self.size_status.activity = if cancelled {
                        Activity::Cancelled
                    } else {
                        Activity::Finished
                    };
                    self.size_status.duration = Some(duration);
                    finished = true;
                    break;
                }
            }
        }

        if finished {
            self.size_scan = None;
        }
        changed
    }

    fn drain_search(&mut self) -> bool {
        let Some(handle) = &self.search else {
            return false;
        };
        let mut changed = false;
        let mut finished = false;

        for _ in 0..MAX_EVENTS_PER_TICK {
            let event = match handle.events.try_recv() {
                Ok(e) => e,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.search_status.activity = Activity::Finished;
                    finished = true;
                    break;
                }
            };
            changed = true;
            match event {
                SearchEvent::Found(path) => {
                    if let Some(matches) = self.matches.as_mut() {
                        matches.push(path);
                    }
                }
                SearchEvent::Progress {
                    visited,
                    current_dir,
                } => {
                    self.search_status.visited = visited;
                    self.search_status.current_dir = current_dir;
                }
                SearchEvent::Done { matches, cancelled } => {
                    // The streamed matches are authoritative; Done's copy is
                    // only used if the set was somehow not kept in sync.
                    let needle = self
                        .matches
                        .as_ref()
                        .map(|m| m.needle().to_owned())
                        .unwrap_or_default();
                    if self.matches.as_ref().map_or(0, SearchMatchSet::len) != matches.len() {
                        self.matches = Some(SearchMatchSet::from_matches(needle, matches));
                    }
                    self.search_status.activity = if cancelled {
                        Activity::Cancelled
                    } else {
                        Activity::Finished
                    };
                    finished = true;
                    break;
                }
            }
        }

        if finished {
            self.search = None;
        }
        changed
    }
}
