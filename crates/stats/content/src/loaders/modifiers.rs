//! Global modifier table loader.
//!
//! # Format
//!
//! ```ron
//! ModifierTable(
//!     entries: [
//!         (scope: "Combat.Damage", operation: multiply, amount: 1.5, order: 10, source: Some("Buff.Rage")),
//!         (scope: "Movement", operation: add, amount: 2.0),
//!     ],
//! )
//! ```
//!
//! `order` defaults to 0 and `source` to `None`.

use std::path::Path;

use anyhow::bail;
use serde::{Deserialize, Serialize};
use stats_core::{GameplayTag, Modifier, ModifierId, ModifierRegistry, Operation};
use tracing::info;

use crate::loaders::{LoadResult, read_file};

/// One global modifier definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifierEntry {
    pub scope: GameplayTag,
    pub operation: Operation,
    pub amount: f32,
    #[serde(default)]
    pub order: i32,
    #[serde(default)]
    pub source: Option<GameplayTag>,
}

impl ModifierEntry {
    fn build(&self) -> LoadResult<Modifier> {
        Ok(Modifier::new(
            self.operation,
            self.amount,
            self.order,
            self.source.clone(),
        )?)
    }
}

/// Modifier table structure for RON files.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModifierTable {
    pub entries: Vec<ModifierEntry>,
}

impl ModifierTable {
    /// Registers every entry with `registry`.
    ///
    /// All entries are validated before the first one is registered, so a bad
    /// table leaves the registry untouched.
    ///
    /// # Returns
    ///
    /// The scope and registry id of each entry, in table order. Keep them to
    /// remove the entries later.
    pub fn install(
        &self,
        registry: &ModifierRegistry,
    ) -> LoadResult<Vec<(GameplayTag, ModifierId)>> {
        let mut built = Vec::with_capacity(self.entries.len());
        for (index, entry) in self.entries.iter().enumerate() {
            if !entry.scope.is_valid() {
                bail!("Modifier entry {}: invalid scope tag {:?}", index, entry.scope.as_str());
            }
            let modifier = entry
                .build()
                .map_err(|e| anyhow::anyhow!("Modifier entry {}: {}", index, e))?;
            built.push((entry.scope.clone(), modifier));
        }

        let mut installed = Vec::with_capacity(built.len());
        for (scope, modifier) in built {
            if let Some(id) = registry.add_modifier(&scope, modifier) {
                installed.push((scope, id));
            }
        }

        info!(
            target: "stats::content",
            entries = installed.len(),
            "installed global modifier table"
        );
        Ok(installed)
    }
}

/// Loader for global modifier tables from RON files.
pub struct ModifierTableLoader;

impl ModifierTableLoader {
    /// Load a modifier table from a RON file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the RON file containing a ModifierTable
    pub fn load(path: &Path) -> LoadResult<ModifierTable> {
        let content = read_file(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> LoadResult<ModifierTable> {
        let table: ModifierTable = ron::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse modifier table RON: {}", e))?;

        Ok(table)
    }
}
