//! Engine configuration

use std::path::{Path, PathBuf};

/// Environment variable naming the data directory
pub const DATA_DIR_ENV: &str = "ROWDB_DATA_DIR";
/// Environment variable enabling `sync_data` after every write
pub const SYNC_ENV: &str = "ROWDB_SYNC";

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory holding the table and index files
    pub data_dir: PathBuf,
    /// Flush file contents to the device after every write
    pub sync_writes: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            sync_writes: false,
        }
    }
}

impl EngineConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `ROWDB_DATA_DIR` and `ROWDB_SYNC`
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            if !dir.is_empty() {
                config = config.data_dir(dir);
            }
        }
        if let Ok(sync) = std::env::var(SYNC_ENV) {
            config = config.sync_writes(matches!(
                sync.to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            ));
        }
        config
    }

    /// Set the data directory
    pub fn data_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.data_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Set synchronous writes
    pub fn sync_writes(mut self, sync: bool) -> Self {
        self.sync_writes = sync;
        self
    }
}
