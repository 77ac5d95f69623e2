/// FIFO of directories waiting to be expanded, each carrying its own
/// retry count.
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

/// Failed materialization attempts tolerated before a path is dropped.
///
/// A path is tried once, then re-queued up to this many times, so it is
/// requested at most `MAX_EXPAND_RETRIES + 1` times in total.
pub const MAX_EXPAND_RETRIES: u32 = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpansionEntry {
    pub path: PathBuf,
    /// Failed attempts so far.
    pub attempts: u32,
}

impl ExpansionEntry {
    pub fn new(path: PathBuf) -> Self {
        Self { path, attempts: 0 }
    }

    /// Count a failed attempt. Returns `false` once the retry budget is
    /// exhausted and the entry must be dropped (terminal skip).
    pub fn record_failure(&mut self) -> bool {
        self.attempts += 1;
        self.attempts <= MAX_EXPAND_RETRIES
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExpansionQueue {
    entries: VecDeque<ExpansionEntry>,
}

impl ExpansionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a fresh path at the tail.
    pub fn push(&mut self, path: PathBuf) {
        self.entries.push_back(ExpansionEntry::new(path));
    }

    /// Re-queue an entry at the tail, keeping its attempt count.
    pub fn requeue(&mut self, entry: ExpansionEntry) {
        self.entries.push_back(entry);
    }

    pub fn pop(&mut self) -> Option<ExpansionEntry> {
        self.entries.pop_front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Drop every entry at or below `path`. Returns how many were removed.
    pub fn discard_under(&mut self, path: &Path) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| !e.path.starts_with(path));
        before - self.entries.len()
    }
}
