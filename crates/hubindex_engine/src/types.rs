//! Request and response types shared by all engines.
//!
//! Responses mirror the engine's JSON so that the lifecycle layer can apply
//! its own acceptance rules (an absent `failures` list is not the same as an
//! empty one).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A mapping: field name to type/analyzer settings, arbitrarily nested.
pub type Mapping = serde_json::Map<String, Value>;

/// Acknowledgment returned by index and alias mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Acknowledged {
    /// Whether the engine acknowledged the request.
    #[serde(default)]
    pub acknowledged: bool,
}

impl Acknowledged {
    /// An acknowledged response.
    pub const YES: Acknowledged = Acknowledged { acknowledged: true };

    /// A response that was not acknowledged.
    pub const NO: Acknowledged = Acknowledged {
        acknowledged: false,
    };
}

/// Shard counters reported by refresh and write calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShardStats {
    /// Shards addressed by the call.
    #[serde(default)]
    pub total: u32,
    /// Shards that completed the call.
    #[serde(default)]
    pub successful: u32,
    /// Shards that failed.
    #[serde(default)]
    pub failed: u32,
}

/// Response of a refresh call.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RefreshResponse {
    /// Shard counters, absent if the engine did not report them.
    #[serde(rename = "_shards", default, skip_serializing_if = "Option::is_none")]
    pub shards: Option<ShardStats>,
}

impl RefreshResponse {
    /// A refresh that reached every shard.
    pub fn ok(total: u32) -> Self {
        Self {
            shards: Some(ShardStats {
                total,
                successful: total,
                failed: 0,
            }),
        }
    }

    /// Returns true if shard counters were reported and no shard failed.
    pub fn succeeded(&self) -> bool {
        self.shards.map(|s| s.failed == 0).unwrap_or(false)
    }
}

/// Response of a server-side reindex.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReindexResponse {
    /// Documents processed.
    #[serde(default)]
    pub total: u64,
    /// Documents created in the target.
    #[serde(default)]
    pub created: u64,
    /// Documents overwritten in the target.
    #[serde(default)]
    pub updated: u64,
    /// Per-document failures; `None` when the engine omitted the list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failures: Option<Vec<Value>>,
}

impl ReindexResponse {
    /// Returns true if a failure list was reported and it is empty.
    pub fn succeeded(&self) -> bool {
        self.failures.as_ref().map(Vec::is_empty).unwrap_or(false)
    }

    /// Number of reported per-document failures.
    pub fn failure_count(&self) -> usize {
        self.failures.as_ref().map(Vec::len).unwrap_or(0)
    }
}

/// Aliases attached to one index.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IndexAliases {
    /// Alias name to alias settings.
    #[serde(default)]
    pub aliases: BTreeMap<String, Value>,
}

/// Reverse lookup result: index name to the aliases it carries.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AliasBindings(pub BTreeMap<String, IndexAliases>);

impl AliasBindings {
    /// Returns the first index (by name) that carries `alias`.
    pub fn index_for(&self, alias: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(_, entry)| entry.aliases.contains_key(alias))
            .map(|(index, _)| index.as_str())
    }

    /// Returns every index that carries `alias`.
    pub fn indices_for(&self, alias: &str) -> Vec<&str> {
        self.0
            .iter()
            .filter(|(_, entry)| entry.aliases.contains_key(alias))
            .map(|(index, _)| index.as_str())
            .collect()
    }

    /// Returns true if no index is listed.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Mapping section of one index.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IndexMapping {
    /// The mapping the index was created with.
    #[serde(default)]
    pub mappings: Mapping,
}

/// Result of a mapping lookup: index name to its mapping section.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndexMappings(pub BTreeMap<String, IndexMapping>);

impl IndexMappings {
    /// Returns the mapping reported for `index`.
    pub fn mapping_of(&self, index: &str) -> Option<&Mapping> {
        self.0.get(index).map(|entry| &entry.mappings)
    }

    /// Returns the only mapping in the response, if exactly one index was reported.
    pub fn single(&self) -> Option<(&str, &Mapping)> {
        if self.0.len() != 1 {
            return None;
        }
        self.0
            .iter()
            .next()
            .map(|(name, entry)| (name.as_str(), &entry.mappings))
    }
}

/// Response of a document count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CountResponse {
    /// Number of documents.
    pub count: u64,
}

/// A serialized element as stored in the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Document id (the element id).
    pub id: String,
    /// Document body.
    pub body: Value,
}

impl Document {
    /// Creates a new document.
    pub fn new(id: impl Into<String>, body: Value) -> Self {
        Self {
            id: id.into(),
            body,
        }
    }
}
