/// Cumulative folder sizes keyed by absolute directory path.
///
/// Filled by the consumer from `SizeEvent::Folder` events as the rollup
/// finalizes each directory, deepest first. A directory's entry never
/// changes once inserted during a single scan; the table is cleared before
/// the next scan starts.
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SizeTable {
    sizes: HashMap<PathBuf, u64>,
}

impl SizeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the cumulative size of `path`, replacing any previous value.
    pub fn insert(&mut self, path: PathBuf, size: u64) {
        self.sizes.insert(path, size);
    }

    pub fn get(&self, path: &Path) -> Option<u64> {
        self.sizes.get(path).copied()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.sizes.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    pub fn clear(&mut self) {
        self.sizes.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, u64)> {
        self.sizes.iter().map(|(p, &s)| (p.as_path(), s))
    }

    /// All entries, largest first. Ties are broken by path so the order is
    /// stable across runs.
    ///
    /// Uses a parallel sort: tables for whole drives reach millions of rows.
    pub fn sorted_desc(&self) -> Vec<(&Path, u64)> {
        let mut rows: Vec<(&Path, u64)> = self.iter().collect();
        rows.par_sort_unstable_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        rows
    }

    /// The `n` largest folders.
    pub fn largest(&self, n: usize) -> Vec<(&Path, u64)> {
        let mut rows = self.sorted_desc();
        rows.truncate(n);
        rows
    }
}
