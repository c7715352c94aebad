//! Configuration loaded from `<root>/.sextant/config.toml`.
//!
//! Every field has a default; a missing or unreadable file yields the
//! default configuration so the engine can always start.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory (under the project root) holding config and snapshot data.
pub const DATA_DIR: &str = ".sextant";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where snapshot files live; relative paths resolve against the root.
    pub data_dir: PathBuf,
    /// Maximum search results returned per query page.
    pub search_page_size: usize,
    /// Mutual edge density at which module seeds merge into one cluster.
    pub cluster_density_threshold: f32,
    /// Maximum entries in a temporal-coupling report.
    pub max_coupled_results: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DATA_DIR),
            search_page_size: 20,
            cluster_density_threshold: 0.15,
            max_coupled_results: 20,
        }
    }
}

impl Config {
    /// Load config from a toml file, falling back to defaults when the
    /// file is absent or malformed.
    pub fn load(path: &Path) -> Config {
        match std::fs::read_to_string(path) {
            Ok(raw) => match toml::from_str(&raw) {
                Ok(config) => config,
                Err(e) => {
                    debug!(error = %e, path = %path.display(), "config parse failed, using defaults");
                    Config::default()
                }
            },
            Err(_) => Config::default(),
        }
    }

    /// Resolve the snapshot directory against a project root.
    pub fn resolve_data_dir(&self, root: &Path) -> PathBuf {
        if self.data_dir.is_absolute() {
            self.data_dir.clone()
        } else {
            root.join(&self.data_dir)
        }
    }
}
