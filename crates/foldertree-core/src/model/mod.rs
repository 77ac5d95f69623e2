/// Data model shared by the producers and the consumer.
///
/// The size table and match set are owned by the consumer; the tree model is
/// the capability interface the consumer drives, plus a filesystem adapter.
pub mod lazy_fs;
pub mod matches;
pub mod size;
pub mod size_table;
pub mod tree_model;

pub use lazy_fs::{LazyFsModel, NodeIndex};
pub use matches::SearchMatchSet;
pub use size_table::SizeTable;
pub use tree_model::TreeModel;
