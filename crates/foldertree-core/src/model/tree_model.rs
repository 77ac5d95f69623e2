/// Capability interface over a lazily-loaded directory tree model.
///
/// GUI toolkits load directory listings on demand and usually
/// asynchronously, so asking for a path may return nothing even though the
/// path exists on disk. Callers must treat `None` from
/// [`TreeModel::materialize`] as "not loaded yet" and ask again later; the
/// request itself is what prompts the model to start loading.
use std::path::{Path, PathBuf};

pub trait TreeModel {
    /// Opaque, cheap handle to a node in the model.
    type Node: Copy;

    /// Look up `path`, prompting the model to load it if needed.
    fn materialize(&mut self, path: &Path) -> Option<Self::Node>;

    fn is_directory(&self, node: Self::Node) -> bool;

    /// Expand `node` in the view, loading its children if necessary.
    fn expand(&mut self, node: Self::Node);

    fn path_of(&self, node: Self::Node) -> PathBuf;

    /// Number of children currently loaded under `node`.
    fn child_count(&self, node: Self::Node) -> usize;

    fn child_at(&self, node: Self::Node, index: usize) -> Option<Self::Node>;
}
