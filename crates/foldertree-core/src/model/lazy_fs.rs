/// Filesystem-backed [`TreeModel`] that loads directory listings lazily.
///
/// Nodes live in a flat arena (`Vec<LazyNode>`) addressed by [`NodeIndex`],
/// with a path index for lookups. A directory's children are read only when
/// something asks for them, and [`TreeModel::materialize`] loads at most one
/// directory listing per call. A path `k` levels below the deepest loaded
/// directory therefore resolves on the `(k + 1)`-th request, which is how
/// asynchronous GUI directory models behave from the caller's point of view.
use super::tree_model::TreeModel;
use std::collections::HashMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Lightweight index into the model's node arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(pub u32);

impl NodeIndex {
    #[inline]
    pub fn new(index: usize) -> Self {
        debug_assert!(index <= u32::MAX as usize, "NodeIndex overflow");
        Self(index as u32)
    }

    #[inline]
    pub fn idx(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
struct LazyNode {
    /// Entry name only; the root keeps an empty name and its path lives in
    /// [`LazyFsModel::root`].
    name: OsString,
    is_dir: bool,
    parent: Option<NodeIndex>,
    /// `None` until the directory listing has been read.
    children: Option<Vec<NodeIndex>>,
    expanded: bool,
}

impl LazyNode {
    fn new(name: OsString, is_dir: bool, parent: Option<NodeIndex>) -> Self {
        Self {
            name,
            is_dir,
            parent,
            children: None,
            expanded: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LazyFsModel {
    root: PathBuf,
    nodes: Vec<LazyNode>,
    by_path: HashMap<PathBuf, NodeIndex>,
    /// Number of directory listings read so far.
    loads: u64,
}

impl LazyFsModel {
    /// Create a model whose only materialized node is `root`.
    pub fn new(root: PathBuf) -> Self {
        let mut by_path = HashMap::new();
        by_path.insert(root.clone(), NodeIndex::new(0));
        Self {
            root,
            nodes: vec![LazyNode::new(OsString::new(), true, None)],
            by_path,
            loads: 0,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn root_node(&self) -> NodeIndex {
        NodeIndex::new(0)
    }

    /// Number of materialized nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn loads(&self) -> u64 {
        self.loads
    }

    pub fn is_expanded(&self, node: NodeIndex) -> bool {
        self.nodes[node.idx()].expanded
    }

    /// Paths of every expanded directory, in arena order.
    pub fn expanded_paths(&self) -> Vec<PathBuf> {
        (0..self.nodes.len())
            .map(NodeIndex::new)
            .filter(|&idx| self.nodes[idx.idx()].expanded)
            .map(|idx| self.full_path(idx))
            .collect()
    }

    /// Collapse every node; loaded listings are kept.
    pub fn collapse_all(&mut self) {
        for node in &mut self.nodes {
            node.expanded = false;
        }
    }

    /// Reconstruct the absolute path for a node by walking up to the root.
    pub fn full_path(&self, index: NodeIndex) -> PathBuf {
        let mut segments = Vec::new();
        let mut current = Some(index);
        while let Some(idx) = current {
            let node = &self.nodes[idx.idx()];
            if node.parent.is_some() {
                segments.push(node.name.as_os_str());
            }
            current = node.parent;
        }
        let mut path = self.root.clone();
        for segment in segments.iter().rev() {
            path.push(segment);
        }
        path
    }

    /// Read the listing of `dir` into the arena. Unreadable directories load
    /// as empty so repeated requests don't hit the disk again.
    fn load_children(&mut self, dir: NodeIndex) {
        if self.nodes[dir.idx()].children.is_some() {
            return;
        }
        let dir_path = self.full_path(dir);
        self.loads += 1;

        let mut entries: Vec<(OsString, bool)> = match fs::read_dir(&dir_path) {
            Ok(rd) => rd
                .filter_map(Result::ok)
                .map(|entry| {
                    let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
                    (entry.file_name(), is_dir)
                })
                .collect(),
            Err(err) => {
                debug!("Listing {} failed: {err}", dir_path.display());
                Vec::new()
            }
        };
        entries.sort_unstable_by(|a, b| a.0.cmp(&b.0));

        let mut children = Vec::with_capacity(entries.len());
        for (name, is_dir) in entries {
            let idx = NodeIndex::new(self.nodes.len());
            self.by_path.insert(dir_path.join(&name), idx);
            self.nodes.push(LazyNode::new(name, is_dir, Some(dir)));
            children.push(idx);
        }
        self.nodes[dir.idx()].children = Some(children);
    }
}

impl TreeModel for LazyFsModel {
    type Node = NodeIndex;

    fn materialize(&mut self, path: &Path) -> Option<NodeIndex> {
        if let Some(&idx) = self.by_path.get(path) {
            return Some(idx);
        }
        if !path.starts_with(&self.root) {
            return None;
        }

        // Fetch one level below the deepest materialized ancestor. If that
        // ancestor is already loaded the path does not exist (any more).
        let mut ancestor = path.parent();
        while let Some(dir) = ancestor {
            if let Some(&idx) = self.by_path.get(dir) {
                let node = &self.nodes[idx.idx()];
                if node.is_dir && node.children.is_none() {
                    self.load_children(idx);
                }
                break;
            }
            ancestor = dir.parent();
        }
        None
    }

    fn is_directory(&self, node: NodeIndex) -> bool {
        self.nodes[node.idx()].is_dir
    }

    fn expand(&mut self, node: NodeIndex) {
        if !self.nodes[node.idx()].is_dir {
            return;
        }
        self.load_children(node);
        self.nodes[node.idx()].expanded = true;
    }

    fn path_of(&self, node: NodeIndex) -> PathBuf {
        self.full_path(node)
    }

    fn child_count(&self, node: NodeIndex) -> usize {
        self.nodes[node.idx()]
            .children
            .as_ref()
            .map_or(0, Vec::len)
    }

    fn child_at(&self, node: NodeIndex, index: usize) -> Option<NodeIndex> {
        self.nodes[node.idx()]
            .children
            .as_ref()
            .and_then(|c| c.get(index).copied())
    }
}
