//! Content factory for building registries from data files.

use std::path::{Path, PathBuf};

use stats_core::{ModifierRegistry, StatsConfig};

use crate::loaders::{ConfigLoader, LoadResult, ModifierTable, ModifierTableLoader};

/// Content factory that loads stats content from a data directory.
///
/// # Directory Structure
///
/// ```text
/// data_dir/
/// ├── config.toml      (optional)
/// └── modifiers.ron
/// ```
pub struct ContentFactory {
    data_dir: PathBuf,
}

impl ContentFactory {
    /// Creates a new content factory pointing to a data directory.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Load engine configuration from `config.toml`, or defaults when absent.
    pub fn load_config(&self) -> LoadResult<StatsConfig> {
        let path = self.data_dir.join("config.toml");
        if !path.exists() {
            return Ok(StatsConfig::default());
        }
        ConfigLoader::load(&path)
    }

    /// Load the global modifier table from `modifiers.ron`.
    pub fn load_modifier_table(&self) -> LoadResult<ModifierTable> {
        let path = self.data_dir.join("modifiers.ron");
        ModifierTableLoader::load(&path)
    }

    /// Builds a registry populated from `modifiers.ron`.
    pub fn build_registry(&self) -> LoadResult<ModifierRegistry> {
        let registry = ModifierRegistry::new();
        self.load_modifier_table()?.install(&registry)?;
        Ok(registry)
    }

    /// Returns the data directory path.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}
