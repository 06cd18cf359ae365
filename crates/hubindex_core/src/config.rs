//! Indexer configuration.

use crate::element::ElementId;
use std::fmt;
use std::str::FromStr;

/// Number of elements fetched per batch during a rebuild.
pub const DEFAULT_CHUNK_SIZE: u64 = 100;

/// Id of the root folder of both element trees. The root is never indexed.
pub const ROOT_FOLDER_ID: ElementId = ElementId(1);

/// How a rebuild gets documents into a clean index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RebuildStrategy {
    /// Build the inactive sibling while the live index keeps serving reads,
    /// then swap every alias at the end. Live writes made meanwhile go to
    /// both slots.
    #[default]
    Staged,
    /// Swap every alias to an empty index sharing the old mapping first,
    /// then write through the aliases.
    ClearFirst,
}

impl fmt::Display for RebuildStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RebuildStrategy::Staged => f.pad("staged"),
            RebuildStrategy::ClearFirst => f.pad("clear-first"),
        }
    }
}

impl FromStr for RebuildStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "staged" => Ok(RebuildStrategy::Staged),
            "clear-first" => Ok(RebuildStrategy::ClearFirst),
            other => Err(format!(
                "unknown rebuild strategy '{}' (expected staged or clear-first)",
                other
            )),
        }
    }
}

/// Configuration shared by the lifecycle manager, rebuild engine and live indexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexerConfig {
    /// First segment of every index name.
    pub index_prefix: String,
    /// Elements per rebuild batch.
    pub chunk_size: u64,
    /// Folder id at which ancestor walks stop.
    pub root_folder_id: ElementId,
    /// Rebuild strategy.
    pub strategy: RebuildStrategy,
}

impl IndexerConfig {
    /// Creates a configuration with the given index prefix and default values.
    #[must_use]
    pub fn new(index_prefix: impl Into<String>) -> Self {
        Self {
            index_prefix: index_prefix.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            root_folder_id: ROOT_FOLDER_ID,
            strategy: RebuildStrategy::default(),
        }
    }

    /// Sets the batch size. Zero is raised to one.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Sets the root folder id.
    #[must_use]
    pub fn with_root_folder_id(mut self, id: ElementId) -> Self {
        self.root_folder_id = id;
        self
    }

    /// Sets the rebuild strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: RebuildStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self::new("hubindex")
    }
}
