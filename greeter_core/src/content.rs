//! Leaf → presentation key lookup.
//!
//! The engine never computes message or asset names. It hands the sampled
//! leaf to a [`ContentTable`], which is a total function: exact leaf key,
//! then the subcase-level key, then a documented default.

use crate::{ContentRef, Error, Leaf, RegistryTable, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Content key used for leaves that have no mapping
pub const DEFAULT_CONTENT_KEY: &str = "greeting.generic";
/// Content key returned when nothing was eligible
pub const FALLBACK_CONTENT_KEY: &str = "greeting.fallback";
pub const DEFAULT_VISUAL_VARIANT: &str = "companion.idle";

/// Injected mapping from leaf keys (`category.subcase[.sub_condition]`) to
/// content and visual variant keys
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContentTable {
    /// Returned for leaves with no entry
    #[serde(default = "default_ref")]
    pub default: ContentRef,

    /// Returned with the fallback selection result
    #[serde(default = "fallback_ref")]
    pub fallback: ContentRef,

    #[serde(default)]
    pub entries: BTreeMap<String, ContentRef>,
}

fn default_ref() -> ContentRef {
    ContentRef::new(DEFAULT_CONTENT_KEY, DEFAULT_VISUAL_VARIANT)
}

fn fallback_ref() -> ContentRef {
    ContentRef::new(FALLBACK_CONTENT_KEY, DEFAULT_VISUAL_VARIANT)
}

impl Default for ContentTable {
    fn default() -> Self {
        Self {
            default: default_ref(),
            fallback: fallback_ref(),
            entries: BTreeMap::new(),
        }
    }
}

impl ContentTable {
    pub fn insert(&mut self, key: impl Into<String>, content: ContentRef) {
        self.entries.insert(key.into(), content);
    }

    /// Resolve a leaf to its presentation keys
    ///
    /// Unmapped leaves log a warning so the missing mapping can be added.
    pub fn resolve(&self, leaf: &Leaf) -> ContentRef {
        if let Some(content) = self.entries.get(&leaf.key()) {
            return content.clone();
        }

        if leaf.sub_condition_id.is_some() {
            if let Some(content) = self.entries.get(&leaf.subcase_key()) {
                tracing::debug!(
                    "No content for {}, using subcase mapping {}",
                    leaf,
                    leaf.subcase_key()
                );
                return content.clone();
            }
        }

        tracing::warn!(
            "No content mapping for leaf {}, using default '{}'",
            leaf,
            self.default.content_key
        );
        self.default.clone()
    }

    /// Leaves of `table` that would resolve to the default content
    pub fn unmapped_leaves(&self, table: &RegistryTable) -> Vec<String> {
        table
            .leaves()
            .into_iter()
            .filter(|leaf| {
                !self.entries.contains_key(&leaf.key())
                    && !self.entries.contains_key(&leaf.subcase_key())
            })
            .map(|leaf| leaf.key())
            .collect()
    }

    /// Entries whose key matches no leaf of `table`
    pub fn orphan_entries(&self, table: &RegistryTable) -> Vec<String> {
        let known: HashSet<String> = table.leaves().iter().map(Leaf::key).collect();
        self.entries
            .keys()
            .filter(|key| !known.contains(*key))
            .cloned()
            .collect()
    }

    /// Load a content table from a TOML file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let table: ContentTable = toml::from_str(&contents)?;
        tracing::info!(
            "Loaded content table with {} entries from {:?}",
            table.entries.len(),
            path
        );
        Ok(table)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize content table: {}", e)))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_toml_string()?)?;
        tracing::info!("Saved content table to {:?}", path);
        Ok(())
    }
}
