/// Error types for the scanning engine.
///
/// Per-entry failures during a walk never surface here; they are logged and
/// reported as non-fatal progress events. Only failures that prevent an
/// operation from starting at all are represented as errors.
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failure to start a background operation.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("scan root does not exist: {}", .0.display())]
    RootNotFound(PathBuf),

    #[error("scan root is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("no scan root has been selected")]
    NoRoot,

    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: io::Error,
    },
}

/// Failure to load or save [`crate::config::ScanSettings`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("settings file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed settings file {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Failure while writing an export file.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
