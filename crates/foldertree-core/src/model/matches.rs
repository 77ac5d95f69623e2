/// Search results in discovery order plus a navigation cursor.
///
/// The cursor is `None` only while the set is empty; as soon as the first
/// match arrives it points at index 0 and from then on always stays in
/// `[0, len)`. Navigation wraps in both directions.
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct SearchMatchSet {
    needle: String,
    matches: Vec<PathBuf>,
    cursor: Option<usize>,
}

impl SearchMatchSet {
    pub fn new(needle: impl Into<String>) -> Self {
        Self {
            needle: needle.into(),
            matches: Vec::new(),
            cursor: None,
        }
    }

    /// Build a set from a completed match list.
    pub fn from_matches(needle: impl Into<String>, matches: Vec<PathBuf>) -> Self {
        let cursor = if matches.is_empty() { None } else { Some(0) };
        Self {
            needle: needle.into(),
            matches,
            cursor,
        }
    }

    /// The needle that produced these matches.
    pub fn needle(&self) -> &str {
        &self.needle
    }

    /// True if `needle` would produce this same set: matching ignores case
    /// and surrounding whitespace.
    pub fn is_for(&self, needle: &str) -> bool {
        self.needle.trim().to_lowercase() == needle.trim().to_lowercase()
    }

    /// Append a match discovered while the search is still running.
    pub fn push(&mut self, path: PathBuf) {
        self.matches.push(path);
        if self.cursor.is_none() {
            self.cursor = Some(0);
        }
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Zero-based cursor position.
    pub fn position(&self) -> Option<usize> {
        self.cursor
    }

    pub fn current(&self) -> Option<&Path> {
        self.cursor.map(|i| self.matches[i].as_path())
    }

    /// Advance the cursor, wrapping to the first match. No-op when empty.
    pub fn next(&mut self) -> Option<&Path> {
        let len = self.matches.len();
        let pos = self.cursor?;
        self.cursor = Some((pos + 1) % len);
        self.current()
    }

    /// Move the cursor back, wrapping to the last match. No-op when empty.
    pub fn prev(&mut self) -> Option<&Path> {
        let len = self.matches.len();
        let pos = self.cursor?;
        self.cursor = Some((pos + len - 1) % len);
        self.current()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.matches.iter().map(PathBuf::as_path)
    }

    /// True if any match is `path` itself or lies beneath it.
    pub fn touches(&self, path: &Path) -> bool {
        self.matches.iter().any(|m| m.starts_with(path))
    }
}
