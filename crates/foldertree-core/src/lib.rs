/// foldertree Core — background scanning, aggregation and lazy expansion.
///
/// This crate contains all engine logic with zero UI dependencies.
/// A frontend owns a lazily-loaded tree model (anything implementing
/// [`model::TreeModel`]) and drives a [`coordinator::ScanCoordinator`] from
/// its event loop; the producers run on their own threads and only talk to
/// the frontend through bounded channels.
///
/// # Modules
///
/// - [`scanner`] — Background producers: directory walker, folder sizes, search.
/// - [`expand`] — Consumer-side "expand all" queue with bounded retry.
/// - [`coordinator`] — Lifecycle of every producer against the active root.
/// - [`model`] — Size table, match set, tree-model trait and a filesystem adapter.
/// - [`config`] — Persisted scan settings.
/// - [`export`] — CSV / JSON export of computed folder sizes.
pub mod config;
pub mod coordinator;
pub mod error;
pub mod expand;
pub mod export;
pub mod model;
pub mod scanner;

pub use error::{ConfigError, ExportError, ScanError};
