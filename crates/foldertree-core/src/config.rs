/// Scan settings consumed by the engine.
///
/// The frontend owns where these live; the engine only reads them. The JSON
/// loader is forgiving: a missing or malformed file yields the
/// defaults.
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::warn;

/// Default number of queued folders expanded per consumer tick.
pub const DEFAULT_EXPAND_BATCH_SIZE: usize = 40;

/// Default number of visited entries between search progress events.
pub const DEFAULT_SEARCH_PROGRESS_EVERY: u64 = 500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    /// Compute cumulative folder sizes whenever the root changes.
    pub compute_folder_sizes: bool,
    /// Count directories up front so the walk phase can show a percentage.
    /// Costs an extra (parallel) pass over the tree.
    pub precount_for_progress: bool,
    /// Folders expanded per consumer tick during "expand all".
    pub expand_batch_size: usize,
    /// Entries visited between search progress events.
    pub search_progress_every: u64,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            compute_folder_sizes: false,
            precount_for_progress: false,
            expand_batch_size: DEFAULT_EXPAND_BATCH_SIZE,
            search_progress_every: DEFAULT_SEARCH_PROGRESS_EVERY,
        }
    }
}

impl ScanSettings {
    /// Strictly load settings from `path`.
    pub fn try_load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut settings: Self =
            serde_json::from_str(&text).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        settings.sanitise();
        Ok(settings)
    }

    /// Load settings from `path`, falling back to defaults on any error.
    ///
    /// A missing file is the normal first-run case and is not logged.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match Self::try_load(path) {
            Ok(settings) => settings,
            Err(err) => {
                warn!("Using default settings: {err}");
                Self::default()
            }
        }
    }

    /// Write settings as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Zero values would stall the expander or flood the search channel.
    fn sanitise(&mut self) {
        if self.expand_batch_size == 0 {
            self.expand_batch_size = DEFAULT_EXPAND_BATCH_SIZE;
        }
        if self.search_progress_every == 0 {
            self.search_progress_every = DEFAULT_SEARCH_PROGRESS_EVERY;
        }
    }
}
