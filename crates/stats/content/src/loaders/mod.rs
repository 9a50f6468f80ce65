//! Content loaders for reading stats data from files.

pub mod config;
pub mod factory;
pub mod modifiers;

pub use config::ConfigLoader;
pub use factory::ContentFactory;
pub use modifiers::{ModifierEntry, ModifierTable, ModifierTableLoader};

use std::path::Path;

/// Common result type for loaders.
pub type LoadResult<T> = anyhow::Result<T>;

/// Helper function to read file contents.
pub(crate) fn read_file(path: &Path) -> LoadResult<String> {
    std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read file {}: {}", path.display(), e))
}
