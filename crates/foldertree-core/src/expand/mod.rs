/// "Expand all" — drives a lazily-loaded tree model from a directory stream.
///
/// A background enumerator ([`crate::scanner::enumerate`]) streams directory
/// paths; [`LazyTreeExpander::tick`] runs on the thread that owns the tree
/// model and expands at most one batch of queued paths per call, so the
/// owning thread is never blocked for longer than one batch.
///
/// Lazily-loaded models often cannot resolve a path the first time it is
/// asked for. Such paths go back to the tail of the queue and are retried
/// up to [`MAX_EXPAND_RETRIES`] times before being dropped for good.
///
/// A run finishes only when the queue is empty **and** the enumerator has
/// signalled completion; an empty queue alone may just mean the enumerator
/// has not caught up yet.
pub mod queue;

pub use queue::{ExpansionEntry, ExpansionQueue, MAX_EXPAND_RETRIES};

use crate::config::DEFAULT_EXPAND_BATCH_SIZE;
use crate::error::ScanError;
use crate::model::TreeModel;
use crate::scanner::enumerate::start_enumeration;
use crate::scanner::progress::ExpandEvent;
use crate::scanner::{ProducerHandle, STOP_TIMEOUT};
use crossbeam_channel::TryRecvError;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Suggested delay between ticks for a host event loop.
pub const TICK_INTERVAL: Duration = Duration::from_millis(50);

/// Maximum enumerator messages drained per tick. Each message is a batch of
/// up to 1 000 paths, so this only matters after a long stall.
const MAX_EVENTS_PER_TICK: usize = 32;

/// Counters for the current (or last finished) run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpandStats {
    /// Directories successfully expanded.
    pub expanded: u64,
    /// Failed attempts that were re-queued.
    pub retried: u64,
    /// Paths dropped after exhausting their retries.
    pub skipped: u64,
    /// Paths still waiting in the queue.
    pub queued: usize,
}

/// Outcome of one [`LazyTreeExpander::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpandTick {
    /// No run in progress; nothing was done.
    Idle,
    /// Work remains; call `tick` again after [`TICK_INTERVAL`].
    Running(ExpandStats),
    /// The run just completed. Subsequent ticks return `Idle`.
    Finished(ExpandStats),
}

pub struct LazyTreeExpander {
    queue: ExpansionQueue,
    producer: Option<ProducerHandle<ExpandEvent>>,
    producer_done: bool,
    active: bool,
    batch_size: usize,
    stats: ExpandStats,
}

impl Default for LazyTreeExpander {
    fn default() -> Self {
        Self::new(DEFAULT_EXPAND_BATCH_SIZE)
    }
}

impl LazyTreeExpander {
    pub fn new(batch_size: usize) -> Self {
        Self {
            queue: ExpansionQueue::new(),
            producer: None,
            producer_done: false,
            active: false,
            batch_size: batch_size.max(1),
            stats: ExpandStats::default(),
        }
    }

    /// Start expanding every directory under `root`, replacing any run in
    /// progress.
    pub fn start(&mut self, root: PathBuf) -> Result<(), ScanError> {
        self.stop();
        let handle = start_enumeration(root)?;
        info!("Expand all started under {}", handle.root().display());
        self.begin(Some(handle));
        Ok(())
    }

    /// Start a run whose paths are supplied through [`enqueue`](Self::enqueue)
    /// and terminated with [`finish_input`](Self::finish_input).
    pub fn start_manual(&mut self) {
        self.stop();
        self.begin(None);
    }

    fn begin(&mut self, producer: Option<ProducerHandle<ExpandEvent>>) {
        self.queue.clear();
        self.stats = ExpandStats::default();
        self.producer = producer;
        self.producer_done = false;
        self.active = true;
    }

    /// Append paths to the queue. Ignored when no run is active.
    pub fn enqueue<I>(&mut self, paths: I)
    where
        I: IntoIterator<Item = PathBuf>,
    {
        if !self.active {
            return;
        }
        for path in paths {
            self.queue.push(path);
        }
    }

    /// Signal that no more paths will be enqueued for this run.
    pub fn finish_input(&mut self) {
        self.producer_done = true;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn stats(&self) -> ExpandStats {
        ExpandStats {
            queued: self.queue.len(),
            ..self.stats
        }
    }

    /// Halt the enumerator and forget all queued work and counters.
    ///
    /// Whatever the model has expanded so far stays expanded.
    pub fn stop(&mut self) {
        if let Some(mut producer) = self.producer.take() {
            producer.stop(STOP_TIMEOUT);
        }
        if self.active {
            info!(
                "Expand all stopped: {} expanded, {} still queued",
                self.stats.expanded,
                self.queue.len()
            );
        }
        self.queue.clear();
        self.stats = ExpandStats::default();
        self.producer_done = false;
        self.active = false;
    }

    /// Drop queued paths at or below `path`, e.g. after it was deleted.
    pub fn discard_under(&mut self, path: &Path) -> usize {
        self.queue.discard_under(path)
    }

    /// Process up to one batch of queued paths against `model`.
    pub fn tick<M: TreeModel>(&mut self, model: &mut M) -> ExpandTick {
        if !self.active {
            return ExpandTick::Idle;
        }
        self.drain_producer();

        let mut retry = Vec::new();
        let mut processed = 0;
        while processed < self.batch_size {
            let Some(mut entry) = self.queue.pop() else {
                break;
            };
            processed += 1;

            match model.materialize(&entry.path) {
                Some(node) => {
                    if model.is_directory(node) {
                        model.expand(node);
                    }
                    self.stats.expanded += 1;
                }
                None if entry.record_failure() => {
                    self.stats.retried += 1;
                    retry.push(entry);
                }
                None => {
                    self.stats.skipped += 1;
                    debug!(
                        "{} not loaded after {} attempts, skipping",
                        entry.path.display(),
                        entry.attempts
                    );
                }
            }
        }
        // Re-queue after the batch so a retry never runs twice in one tick.
        for entry in retry {
            self.queue.requeue(entry);
        }

        if self.queue.is_empty() && self.producer_done {
            ExpandTick::Finished(self.finish())
        } else {
            ExpandTick::Running(self.stats())
        }
    }

    fn drain_producer(&mut self) {
        let Some(producer) = &self.producer else {
            return;
        };
        for _ in 0..MAX_EVENTS_PER_TICK {
            match producer.events.try_recv() {
                Ok(ExpandEvent::Batch(paths)) => {
                    for path in paths {
                        self.queue.push(path);
                    }
                }
                Ok(ExpandEvent::Done { .. }) | Err(TryRecvError::Disconnected) => {
                    self.producer_done = true;
                    break;
                }
                Err(TryRecvError::Empty) => break,
            }
        }
        if self.producer_done {
            debug!("Enumerator finished; {} paths queued", self.queue.len());
            self.producer = None;
        }
    }

    fn finish(&mut self) -> ExpandStats {
        self.active = false;
        self.producer = None;
        self.producer_done = false;
        let stats = self.stats();
        info!(
            "Expand all complete: {} expanded, {} skipped",
            stats.expanded, stats.skipped
        );
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Model where each path resolves after a scripted number of failed
    /// requests; paths with no script never resolve.
    #[derive(Default)]
    struct ScriptedModel {
        resolve_after: HashMap<PathBuf, u32>,
        requests: HashMap<PathBuf, u32>,
        paths: Vec<PathBuf>,
        expanded: Vec<PathBuf>,
    }

    impl ScriptedModel {
        fn resolves_after(mut self, path: &str, failures: u32) -> Self {
            self.resolve_after.insert(PathBuf::from(path), failures);
            self
        }

        fn requests(&self, path: &str) -> u32 {
            self.requests.get(Path::new(path)).copied().unwrap_or(0)
        }
    }

    impl TreeModel for ScriptedModel {
        type Node = usize;

        fn materialize(&mut self, path: &Path) -> Option<usize> {
            let seen = self.requests.entry(path.to_path_buf()).or_insert(0);
            *seen += 1;
            let failures = *self.resolve_after.get(path)?;
            if *seen > failures {
                self.paths.push(path.to_path_buf());
                Some(self.paths.len() - 1)
            } else {
                None
            }
        }

        fn is_directory(&self, _node: usize) -> bool {
            true
        }

        fn expand(&mut self, node: usize) {
            self.expanded.push(self.paths[node].clone());
        }

        fn path_of(&self, node: usize) -> PathBuf {
            self.paths[node].clone()
        }

        fn child_count(&self, _node: usize) -> usize {
            0
        }

        fn child_at(&self, _node: usize, _index: usize) -> Option<usize> {
            None
        }
    }

    fn run_to_completion(expander: &mut LazyTreeExpander, model: &mut ScriptedModel) -> ExpandStats {
        for _ in 0..1_000 {
            if let ExpandTick::Finished(stats) = expander.tick(model) {
                return stats;
            }
        }
        panic!("expander did not finish");
    }

    #[test]
    fn unresolvable_path_is_tried_nine_times_then_dropped() {
        let mut model = ScriptedModel::default().resolves_after("/r/ok", 0);
        let mut expander = LazyTreeExpander::new(40);
        expander.start_manual();
        expander.enqueue([PathBuf::from("/r/ghost"), PathBuf::from("/r/ok")]);
        expander.finish_input();

        let stats = run_to_completion(&mut expander, &mut model);
        assert_eq!(model.requests("/r/ghost"), MAX_EXPAND_RETRIES + 1);
        assert_eq!(model.requests("/r/ok"), 1);
        assert_eq!(stats.expanded, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.retried, u64::from(MAX_EXPAND_RETRIES));
        assert_eq!(stats.queued, 0);
        assert!(!expander.is_active());
    }

    #[test]
    fn slow_paths_resolve_within_budget() {
        let mut model = ScriptedModel::default();
        for i in 0..8 {
            model = model.resolves_after(&format!("/r/d{i}"), i);
        }
        let mut expander = LazyTreeExpander::new(3);
        expander.start_manual();
        expander.enqueue((0..8).map(|i| PathBuf::from(format!("/r/d{i}"))));
        expander.finish_input();

        let mut last_len = usize::MAX;
        let stats = loop {
            match expander.tick(&mut model) {
                ExpandTick::Running(s) => {
                    assert!(s.queued <= last_len);
                    last_len = s.queued;
                }
                ExpandTick::Finished(s) => break s,
                ExpandTick::Idle => panic!("went idle before finishing"),
            }
        };
        assert_eq!(stats.expanded, 8);
        assert_eq!(stats.skipped, 0);
        assert_eq!(model.expanded.len(), 8);
    }

    #[test]
    fn empty_queue_waits_for_producer() {
        let mut model = ScriptedModel::default().resolves_after("/r/late", 0);
        let mut expander = LazyTreeExpander::new(40);
        expander.start_manual();

        assert!(matches!(expander.tick(&mut model), ExpandTick::Running(_)));
        assert!(matches!(expander.tick(&mut model), ExpandTick::Running(_)));

        expander.enqueue([PathBuf::from("/r/late")]);
        expander.finish_input();
        assert!(matches!(
            expander.tick(&mut model),
            ExpandTick::Finished(ExpandStats { expanded: 1, .. })
        ));
        assert_eq!(expander.tick(&mut model), ExpandTick::Idle);
    }

    #[test]
    fn batch_size_bounds_work_per_tick() {
        let mut model = ScriptedModel::default();
        let paths: Vec<PathBuf> = (0..100).map(|i| PathBuf::from(format!("/r/{i}"))).collect();
        for p in &paths {
            model.resolve_after.insert(p.clone(), 0);
        }
        let mut expander = LazyTreeExpander::new(40);
        expander.start_manual();
        expander.enqueue(paths);
        expander.finish_input();

        assert!(matches!(
            expander.tick(&mut model),
            ExpandTick::Running(ExpandStats { expanded: 40, queued: 60, .. })
        ));
        assert!(matches!(
            expander.tick(&mut model),
            ExpandTick::Running(ExpandStats { expanded: 80, queued: 20, .. })
        ));
        assert!(matches!(
            expander.tick(&mut model),
            ExpandTick::Finished(ExpandStats { expanded: 100, .. })
        ));
    }

    #[test]
    fn stop_clears_queue_and_suppresses_ticks() {
        let mut model = ScriptedModel::default();
        let mut expander = LazyTreeExpander::new(1);
        expander.start_manual();
        expander.enqueue([PathBuf::from("/r/a"), PathBuf::from("/r/b")]);

        assert!(matches!(expander.tick(&mut model), ExpandTick::Running(_)));
        expander.stop();
        assert_eq!(expander.stats(), ExpandStats::default());
        assert_eq!(expander.tick(&mut model), ExpandTick::Idle);
        assert_eq!(model.requests("/r/b"), 0);

        // Enqueueing after stop is ignored.
        expander.enqueue([PathBuf::from("/r/c")]);
        assert_eq!(expander.stats().queued, 0);
    }
}
