//! In-memory search engine for testing.

use crate::engine::SearchEngine;
use crate::error::{EngineError, EngineResult};
use crate::types::{
    Acknowledged, AliasBindings, CountResponse, Document, IndexAliases, IndexMapping,
    IndexMappings, Mapping, RefreshResponse, ReindexResponse,
};
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};

/// A call made against an [`InMemoryEngine`], in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    /// `create_index`.
    CreateIndex(String),
    /// `delete_index`.
    DeleteIndex(String),
    /// `index_exists`.
    IndexExists(String),
    /// `alias_exists`.
    AliasExists(String),
    /// `create_alias`.
    CreateAlias {
        /// Index receiving the alias.
        index: String,
        /// Alias name.
        alias: String,
    },
    /// `get_alias`.
    GetAlias(String),
    /// `get_mapping`.
    GetMapping(String),
    /// `refresh_index`.
    Refresh(String),
    /// `reindex`.
    Reindex {
        /// Source index.
        source: String,
        /// Target index.
        target: String,
    },
    /// `upsert_document`.
    Upsert {
        /// Index or alias written to.
        index: String,
        /// Document id.
        id: String,
    },
    /// `delete_document`.
    DeleteDocument {
        /// Index or alias written to.
        index: String,
        /// Document id.
        id: String,
    },
    /// `count_documents`.
    Count(String),
}

impl EngineCall {
    /// Returns true if the call changes engine state.
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            EngineCall::CreateIndex(_)
                | EngineCall::DeleteIndex(_)
                | EngineCall::CreateAlias { .. }
                | EngineCall::Reindex { .. }
                | EngineCall::Upsert { .. }
                | EngineCall::DeleteDocument { .. }
        )
    }

    /// Returns true if the call changes indices or aliases (not documents).
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            EngineCall::CreateIndex(_)
                | EngineCall::DeleteIndex(_)
                | EngineCall::CreateAlias { .. }
                | EngineCall::Reindex { .. }
        )
    }
}

/// A fault the engine reports until cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    /// `create_index` answers without acknowledgment and creates nothing.
    CreateIndexUnacknowledged,
    /// `refresh_index` reports a failed shard.
    RefreshShardFailure,
    /// `reindex` copies nothing and reports this many failures.
    ReindexFailures(usize),
    /// `create_alias` answers without acknowledgment and changes nothing.
    AliasUnacknowledged,
    /// `delete_index` fails with a server error.
    DeleteIndexError,
    /// Every call fails with a retryable transport error.
    Unavailable,
}

#[derive(Debug, Default)]
struct StoredIndex {
    mapping: Mapping,
    /// Documents visible to search, count and reindex.
    visible: BTreeMap<String, Value>,
    /// Writes since the last refresh (`None` is a delete).
    pending: BTreeMap<String, Option<Value>>,
}

impl StoredIndex {
    fn new(mapping: Mapping) -> Self {
        Self {
            mapping,
            ..Self::default()
        }
    }

    fn refresh(&mut self) {
        for (id, write) in std::mem::take(&mut self.pending) {
            match write {
                Some(body) => {
                    self.visible.insert(id, body);
                }
                None => {
                    self.visible.remove(&id);
                }
            }
        }
    }

    fn get(&self, id: &str) -> Option<&Value> {
        match self.pending.get(id) {
            Some(write) => write.as_ref(),
            None => self.visible.get(id),
        }
    }

    fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .visible
            .keys()
            .filter(|id| !matches!(self.pending.get(*id), Some(None)))
            .cloned()
            .collect();
        ids.extend(
            self.pending
                .iter()
                .filter(|(id, write)| write.is_some() && !self.visible.contains_key(*id))
                .map(|(id, _)| id.clone()),
        );
        ids.sort();
        ids
    }
}

#[derive(Debug, Default)]
struct EngineState {
    indices: BTreeMap<String, StoredIndex>,
    /// Alias name to the single index carrying it.
    aliases: BTreeMap<String, String>,
}

impl EngineState {
    fn resolve(&self, name: &str) -> Option<String> {
        if self.indices.contains_key(name) {
            Some(name.to_string())
        } else {
            self.aliases.get(name).cloned()
        }
    }
}

/// An in-memory search engine.
///
/// Models the parts of an Elasticsearch cluster hubindex relies on:
/// - indices with a fixed mapping
/// - single-binding aliases with atomic rebinding
/// - near-real-time visibility (writes become visible on refresh)
/// - wildcard deletes
///
/// Writes to an index that does not exist fail instead of auto-creating it.
///
/// Every call is recorded and faults can be injected, which makes it suitable for:
/// - Unit tests
/// - Integration tests
/// - Dry runs of a rebuild
///
/// # Example
///
/// ```rust
/// use hubindex_engine::{Document, InMemoryEngine, Mapping, SearchEngine};
/// use serde_json::json;
///
/// let engine = InMemoryEngine::new();
/// engine.create_index("a-even", &Mapping::new()).unwrap();
/// engine.create_alias("a-even", "a").unwrap();
/// engine.upsert_document("a", &Document::new("1", json!({}))).unwrap();
/// assert_eq!(engine.document_ids("a-even"), vec!["1".to_string()]);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryEngine {
    state: RwLock<EngineState>,
    calls: Mutex<Vec<EngineCall>>,
    faults: Mutex<Vec<Fault>>,
    rejected_documents: Mutex<HashSet<String>>,
}

impl InMemoryEngine {
    /// Creates a new empty engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports `fault` until [`clear_faults`](Self::clear_faults) is called.
    pub fn inject(&self, fault: Fault) {
        self.faults.lock().push(fault);
    }

    /// Removes all injected faults.
    pub fn clear_faults(&self) {
        self.faults.lock().clear();
        self.rejected_documents.lock().clear();
    }

    /// Makes every upsert of document `id` fail with a rejected request.
    pub fn reject_document(&self, id: impl Into<String>) {
        self.rejected_documents.lock().insert(id.into());
    }

    /// Returns all calls made so far.
    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().clone()
    }

    /// Returns the calls that changed engine state.
    pub fn mutating_calls(&self) -> Vec<EngineCall> {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.is_mutating())
            .cloned()
            .collect()
    }

    /// Forgets recorded calls.
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Returns the names of all physical indices.
    pub fn indices(&self) -> Vec<String> {
        self.state.read().indices.keys().cloned().collect()
    }

    /// Returns the index currently carrying `alias`.
    pub fn alias_target(&self, alias: &str) -> Option<String> {
        self.state.read().aliases.get(alias).cloned()
    }

    /// Returns every alias bound to `index`.
    pub fn aliases_of(&self, index: &str) -> Vec<String> {
        self.state
            .read()
            .aliases
            .iter()
            .filter(|(_, bound)| bound.as_str() == index)
            .map(|(alias, _)| alias.clone())
            .collect()
    }

    /// Returns the mapping of a physical index.
    pub fn mapping(&self, index: &str) -> Option<Mapping> {
        self.state
            .read()
            .indices
            .get(index)
            .map(|stored| stored.mapping.clone())
    }

    /// Returns a document by id, including unrefreshed writes.
    pub fn document(&self, index: &str, id: &str) -> Option<Value> {
        let state = self.state.read();
        let name = state.resolve(index)?;
        state.indices.get(&name)?.get(id).cloned()
    }

    /// Returns all document ids in an index or alias, including unrefreshed writes.
    pub fn document_ids(&self, index: &str) -> Vec<String> {
        let state = self.state.read();
        state
            .resolve(index)
            .and_then(|name| state.indices.get(&name))
            .map(StoredIndex::ids)
            .unwrap_or_default()
    }

    fn record(&self, call: EngineCall) -> EngineResult<()> {
        self.calls.lock().push(call);
        if self.has_fault(Fault::Unavailable) {
            return Err(EngineError::transport_retryable("engine unavailable"));
        }
        Ok(())
    }

    fn has_fault(&self, fault: Fault) -> bool {
        self.faults.lock().contains(&fault)
    }

    fn reindex_failures(&self) -> Option<usize> {
        self.faults.lock().iter().find_map(|fault| match fault {
            Fault::ReindexFailures(count) => Some(*count),
            _ => None,
        })
    }
}

/// Matches `name` against a comma-separated list of `*` patterns.
fn matches_pattern(pattern: &str, name: &str) -> bool {
    pattern
        .split(',')
        .map(str::trim)
        .any(|part| glob_match(part.as_bytes(), name.as_bytes()))
}

fn glob_match(pattern: &[u8], name: &[u8]) -> bool {
    match pattern.split_first() {
        None => name.is_empty(),
        Some((b'*', rest)) => (0..=name.len()).any(|skip| glob_match(rest, &name[skip..])),
        Some((first, rest)) => match name.split_first() {
            Some((head, tail)) if head == first => glob_match(rest, tail),
            _ => false,
        },
    }
}

impl SearchEngine for InMemoryEngine {
    fn create_index(&self, name: &str, mapping: &Mapping) -> EngineResult<Acknowledged> {
        self.record(EngineCall::CreateIndex(name.to_string()))?;
        if self.has_fault(Fault::CreateIndexUnacknowledged) {
            return Ok(Acknowledged::NO);
        }

        let mut state = self.state.write();
        if state.indices.contains_key(name) || state.aliases.contains_key(name) {
            return Err(EngineError::AlreadyExists {
                index: name.to_string(),
            });
        }
        state
            .indices
            .insert(name.to_string(), StoredIndex::new(mapping.clone()));
        Ok(Acknowledged::YES)
    }

    fn delete_index(&self, pattern: &str) -> EngineResult<Acknowledged> {
        self.record(EngineCall::DeleteIndex(pattern.to_string()))?;
        if self.has_fault(Fault::DeleteIndexError) {
            return Err(EngineError::Server {
                status: 500,
                message: format!("failed to delete {}", pattern),
            });
        }

        let mut state = self.state.write();
        let doomed: Vec<String> = state
            .indices
            .keys()
            .filter(|name| matches_pattern(pattern, name))
            .cloned()
            .collect();

        if doomed.is_empty() && !pattern.contains('*') {
            return Err(EngineError::not_found(pattern));
        }

        for name in &doomed {
            state.indices.remove(name);
        }
        state.aliases.retain(|_, index| !doomed.contains(index));
        Ok(Acknowledged::YES)
    }

    fn index_exists(&self, name: &str) -> EngineResult<bool> {
        self.record(EngineCall::IndexExists(name.to_string()))?;
        Ok(self.state.read().indices.contains_key(name))
    }

    fn alias_exists(&self, name: &str) -> EngineResult<bool> {
        self.record(EngineCall::AliasExists(name.to_string()))?;
        Ok(self.state.read().aliases.contains_key(name))
    }

    fn create_alias(&self, index: &str, alias: &str) -> EngineResult<Acknowledged> {
        self.record(EngineCall::CreateAlias {
            index: index.to_string(),
            alias: alias.to_string(),
        })?;
        if self.has_fault(Fault::AliasUnacknowledged) {
            return Ok(Acknowledged::NO);
        }

        let mut state = self.state.write();
        if !state.indices.contains_key(index) {
            return Err(EngineError::not_found(index));
        }
        if state.indices.contains_key(alias) {
            return Err(EngineError::rejected(
                400,
                format!("an index named {} already exists", alias),
            ));
        }
        // One write under the lock: readers never observe the alias unbound.
        state.aliases.insert(alias.to_string(), index.to_string());
        Ok(Acknowledged::YES)
    }

    fn get_alias(&self, alias: &str) -> EngineResult<AliasBindings> {
        self.record(EngineCall::GetAlias(alias.to_string()))?;
        let state = self.state.read();
        let index = state
            .aliases
            .get(alias)
            .ok_or_else(|| EngineError::not_found(alias))?;

        let mut entry = IndexAliases::default();
        entry.aliases.insert(alias.to_string(), json!({}));
        let mut bindings = BTreeMap::new();
        bindings.insert(index.clone(), entry);
        Ok(AliasBindings(bindings))
    }

    fn get_mapping(&self, name: &str) -> EngineResult<IndexMappings> {
        self.record(EngineCall::GetMapping(name.to_string()))?;
        let state = self.state.read();
        let index = state
            .resolve(name)
            .ok_or_else(|| EngineError::not_found(name))?;
        let stored = state
            .indices
            .get(&index)
            .ok_or_else(|| EngineError::not_found(&index))?;

        let mut mappings = BTreeMap::new();
        mappings.insert(
            index.clone(),
            IndexMapping {
                mappings: stored.mapping.clone(),
            },
        );
        Ok(IndexMappings(mappings))
    }

    fn refresh_index(&self, name: &str) -> EngineResult<RefreshResponse> {
        self.record(EngineCall::Refresh(name.to_string()))?;
        let mut state = self.state.write();
        let index = state
            .resolve(name)
            .ok_or_else(|| EngineError::not_found(name))?;

        if self.has_fault(Fault::RefreshShardFailure) {
            let mut response = RefreshResponse::ok(1);
            if let Some(shards) = response.shards.as_mut() {
                shards.successful = 0;
                shards.failed = 1;
            }
            return Ok(response);
        }

        if let Some(stored) = state.indices.get_mut(&index) {
            stored.refresh();
        }
        Ok(RefreshResponse::ok(1))
    }

    fn reindex(&self, source: &str, target: &str) -> EngineResult<ReindexResponse> {
        self.record(EngineCall::Reindex {
            source: source.to_string(),
            target: target.to_string(),
        })?;
        if let Some(count) = self.reindex_failures() {
            return Ok(ReindexResponse {
                total: count as u64,
                failures: Some(
                    (0..count)
                        .map(|i| json!({ "id": i.to_string(), "cause": "injected" }))
                        .collect(),
                ),
                ..ReindexResponse::default()
            });
        }

        let mut state = self.state.write();
        let source_name = state
            .resolve(source)
            .ok_or_else(|| EngineError::not_found(source))?;
        let target_name = state
            .resolve(target)
            .ok_or_else(|| EngineError::not_found(target))?;

        // Reindex reads the source's searchable view only.
        let copied: Vec<(String, Value)> = state.indices[&source_name]
            .visible
            .iter()
            .map(|(id, body)| (id.clone(), body.clone()))
            .collect();

        let mut response = ReindexResponse {
            total: copied.len() as u64,
            failures: Some(Vec::new()),
            ..ReindexResponse::default()
        };

        if let Some(dest) = state.indices.get_mut(&target_name) {
            for (id, body) in copied {
                if dest.get(&id).is_some() {
                    response.updated += 1;
                } else {
                    response.created += 1;
                }
                dest.visible.insert(id.clone(), body);
                dest.pending.remove(&id);
            }
        }
        Ok(response)
    }

    fn upsert_document(&self, index: &str, document: &Document) -> EngineResult<()> {
        self.record(EngineCall::Upsert {
            index: index.to_string(),
            id: document.id.clone(),
        })?;
        if self.rejected_documents.lock().contains(&document.id) {
            return Err(EngineError::rejected(
                400,
                format!("mapper_parsing_exception: document {}", document.id),
            ));
        }

        let mut state = self.state.write();
        let name = state
            .resolve(index)
            .ok_or_else(|| EngineError::not_found(index))?;
        if let Some(stored) = state.indices.get_mut(&name) {
            stored
                .pending
                .insert(document.id.clone(), Some(document.body.clone()));
        }
        Ok(())
    }

    fn delete_document(&self, index: &str, id: &str) -> EngineResult<()> {
        self.record(EngineCall::DeleteDocument {
            index: index.to_string(),
            id: id.to_string(),
        })?;

        let mut state = self.state.write();
        let name = state
            .resolve(index)
            .ok_or_else(|| EngineError::not_found(index))?;
        let stored = state
            .indices
            .get_mut(&name)
            .ok_or_else(|| EngineError::not_found(&name))?;

        if stored.get(id).is_none() {
            return Err(EngineError::not_found(format!("{}/{}", name, id)));
        }
        stored.pending.insert(id.to_string(), None);
        Ok(())
    }

    fn count_documents(&self, index: &str) -> EngineResult<CountResponse> {
        self.record(EngineCall::Count(index.to_string()))?;
        let state = self.state.read();
        let name = state
            .resolve(index)
            .ok_or_else(|| EngineError::not_found(index))?;
        Ok(CountResponse {
            count: state.indices[&name].visible.len() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mapping(field: &str) -> Mapping {
        let mut properties = Mapping::new();
        properties.insert(field.to_string(), json!({ "type": "keyword" }));
        let mut mapping = Mapping::new();
        mapping.insert("properties".into(), Value::Object(properties));
        mapping
    }

    fn doc(id: &str) -> Document {
        Document::new(id, json!({ "id": id }))
    }

    #[test]
    fn create_index_twice_fails() {
        let engine = InMemoryEngine::new();
        assert!(engine.create_index("a-even", &mapping("x")).unwrap().acknowledged);
        let result = engine.create_index("a-even", &mapping("x"));
        assert!(matches!(result, Err(EngineError::AlreadyExists { .. })));
    }

    #[test]
    fn alias_rebind_moves_single_binding() {
        let engine = InMemoryEngine::new();
        engine.create_index("a-even", &Mapping::new()).unwrap();
        engine.create_index("a-odd", &Mapping::new()).unwrap();

        engine.create_alias("a-even", "a").unwrap();
        assert_eq!(engine.alias_target("a"), Some("a-even".into()));

        engine.create_alias("a-odd", "a").unwrap();
        assert_eq!(engine.alias_target("a"), Some("a-odd".into()));
        assert!(engine.aliases_of("a-even").is_empty());

        let bindings = engine.get_alias("a").unwrap();
        assert_eq!(bindings.indices_for("a"), vec!["a-odd"]);
    }

    #[test]
    fn get_alias_missing_is_not_found() {
        let engine = InMemoryEngine::new();
        assert!(engine.get_alias("nope").unwrap_err().is_not_found());
    }

    #[test]
    fn wildcard_delete_drops_indices_and_aliases() {
        let engine = InMemoryEngine::new();
        for name in ["p__web__asset-even", "p__web__car-odd", "p__app__asset-even"] {
            engine.create_index(name, &Mapping::new()).unwrap();
        }
        engine.create_alias("p__web__asset-even", "p__web__asset").unwrap();

        engine.delete_index("p__web*").unwrap();

        assert_eq!(engine.indices(), vec!["p__app__asset-even".to_string()]);
        assert_eq!(engine.alias_target("p__web__asset"), None);
    }

    #[test]
    fn exact_delete_of_missing_index_is_not_found() {
        let engine = InMemoryEngine::new();
        assert!(engine.delete_index("missing").unwrap_err().is_not_found());
        assert!(engine.delete_index("missing*").is_ok());
    }

    #[test]
    fn writes_become_visible_on_refresh() {
        let engine = InMemoryEngine::new();
        engine.create_index("a-even", &Mapping::new()).unwrap();
        engine.upsert_document("a-even", &doc("1")).unwrap();

        assert_eq!(engine.count_documents("a-even").unwrap().count, 0);
        assert!(engine.document("a-even", "1").is_some());

        engine.refresh_index("a-even").unwrap();
        assert_eq!(engine.count_documents("a-even").unwrap().count, 1);
    }

    #[test]
    fn reindex_copies_refreshed_documents_only() {
        let engine = InMemoryEngine::new();
        engine.create_index("a-even", &Mapping::new()).unwrap();
        engine.create_index("a-odd", &Mapping::new()).unwrap();
        engine.upsert_document("a-even", &doc("1")).unwrap();
        engine.refresh_index("a-even").unwrap();
        engine.upsert_document("a-even", &doc("2")).unwrap();

        let response = engine.reindex("a-even", "a-odd").unwrap();
        assert!(response.succeeded());
        assert_eq!(response.created, 1);
        assert_eq!(engine.document_ids("a-odd"), vec!["1".to_string()]);
    }

    #[test]
    fn upsert_through_alias_lands_in_bound_index() {
        let engine = InMemoryEngine::new();
        engine.create_index("a-odd", &Mapping::new()).unwrap();
        engine.create_alias("a-odd", "a").unwrap();

        engine.upsert_document("a", &doc("9")).unwrap();
        assert!(engine.document("a-odd", "9").is_some());

        engine.delete_document("a", "9").unwrap();
        assert!(engine.document("a-odd", "9").is_none());
        assert!(engine.delete_document("a", "9").unwrap_err().is_not_found());
    }

    #[test]
    fn upsert_into_missing_index_fails() {
        let engine = InMemoryEngine::new();
        assert!(engine.upsert_document("nope", &doc("1")).unwrap_err().is_not_found());
    }

    #[test]
    fn faults_are_reported() {
        let engine = InMemoryEngine::new();
        engine.inject(Fault::CreateIndexUnacknowledged);
        assert!(!engine.create_index("a-even", &Mapping::new()).unwrap().acknowledged);
        assert!(engine.indices().is_empty());

        engine.clear_faults();
        engine.create_index("a-even", &Mapping::new()).unwrap();
        engine.inject(Fault::RefreshShardFailure);
        assert!(!engine.refresh_index("a-even").unwrap().succeeded());

        engine.inject(Fault::Unavailable);
        assert!(engine.index_exists("a-even").unwrap_err().is_retryable());
    }

    #[test]
    fn rejected_document_fails_upsert() {
        let engine = InMemoryEngine::new();
        engine.create_index("a-even", &Mapping::new()).unwrap();
        engine.reject_document("13");
        assert!(matches!(
            engine.upsert_document("a-even", &doc("13")),
            Err(EngineError::Rejected { status: 400, .. })
        ));
        assert!(engine.upsert_document("a-even", &doc("14")).is_ok());
    }

    #[test]
    fn calls_are_recorded() {
        let engine = InMemoryEngine::new();
        engine.index_exists("a").unwrap();
        engine.create_index("a", &Mapping::new()).unwrap();

        assert_eq!(
            engine.calls(),
            vec![
                EngineCall::IndexExists("a".into()),
                EngineCall::CreateIndex("a".into())
            ]
        );
        assert_eq!(engine.mutating_calls().len(), 1);
        engine.clear_calls();
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn glob_patterns() {
        assert!(matches_pattern("p__web*", "p__web__asset-odd"));
        assert!(matches_pattern("x,p__*-even", "p__a__b-even"));
        assert!(!matches_pattern("p__web*", "p__app__asset"));
        assert!(matches_pattern("*", ""));
        assert!(!matches_pattern("abc", "abcd"));
    }
}
