//! Test fixtures and harness helpers.
//!
//! Provides corpus builders, a recording element store and a harness
//! that wires every component against an [`InMemoryEngine`].

use hubindex_core::{
    CoreResult, DefaultCodec, Element, ElementId, ElementStore, ElementType, EndpointConfig,
    IndexManager, IndexerConfig, LiveIndexer, LogicalIndexName, Mapping, MemoryElementStore,
    RebuildEngine,
};
use hubindex_engine::InMemoryEngine;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::sync::Arc;

/// Index prefix used by the fixtures.
pub const TEST_PREFIX: &str = "prefix";

/// Builds a mapping with one `properties` entry per `(field, type)`.
pub fn mapping(fields: &[(&str, &str)]) -> Mapping {
    let mut properties = Mapping::new();
    for (field, ty) in fields {
        properties.insert((*field).to_string(), json!({ "type": ty }));
    }
    let mut mapping = Mapping::new();
    mapping.insert("properties".into(), Value::Object(properties));
    mapping
}

/// An endpoint indexing assets, with a keyword mapping for both asset indices.
pub fn asset_endpoint(name: &str) -> EndpointConfig {
    EndpointConfig::new(name)
        .with_asset_indexing(true)
        .with_mapping("asset", mapping(&[("key", "keyword")]))
        .with_mapping("assetfolder", mapping(&[("key", "keyword")]))
}

/// An endpoint indexing objects of the given classes.
pub fn object_endpoint(name: &str, classes: &[&str]) -> EndpointConfig {
    let mut endpoint = EndpointConfig::new(name).with_object_indexing(true);
    for class_name in classes {
        endpoint = endpoint.with_class(*class_name);
    }
    endpoint
}

/// Builds element trees. Both families start with a root folder (id 1).
#[derive(Debug, Clone)]
pub struct CorpusBuilder {
    elements: Vec<Element>,
}

impl Default for CorpusBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CorpusBuilder {
    /// Creates a corpus holding only the two root folders.
    pub fn new() -> Self {
        Self {
            elements: vec![Element::asset_folder(1, None), Element::object_folder(1, None)],
        }
    }

    /// Adds an asset folder.
    pub fn asset_folder(mut self, id: u64, parent: u64) -> Self {
        self.elements
            .push(Element::asset_folder(id, Some(parent)).with_key(format!("folder-{}", id)));
        self
    }

    /// Adds an object folder.
    pub fn object_folder(mut self, id: u64, parent: u64) -> Self {
        self.elements
            .push(Element::object_folder(id, Some(parent)).with_key(format!("folder-{}", id)));
        self
    }

    /// Adds one asset per id.
    pub fn assets(mut self, ids: Range<u64>, parent: u64) -> Self {
        for id in ids {
            self.elements
                .push(Element::asset(id, parent).with_key(format!("asset-{}.png", id)));
        }
        self
    }

    /// Adds one object of `class_name` per id.
    pub fn objects(mut self, ids: Range<u64>, class_name: &str, parent: u64) -> Self {
        for id in ids {
            self.elements.push(
                Element::object(id, class_name, parent).with_key(format!("object-{}", id)),
            );
        }
        self
    }

    /// Adds an arbitrary element.
    pub fn element(mut self, element: Element) -> Self {
        self.elements.push(element);
        self
    }

    /// Returns the elements.
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Builds the store.
    pub fn build(self) -> MemoryElementStore {
        MemoryElementStore::from_elements(self.elements)
    }
}

/// A page query seen by a [`RecordingStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageQuery {
    /// Element family.
    pub element_type: ElementType,
    /// First row.
    pub offset: u64,
    /// Row limit.
    pub limit: u64,
}

/// Callback run once, just before an element is loaded.
pub type LoadHook = Box<dyn FnOnce() + Send>;

/// Element store that records every page query and load.
pub struct RecordingStore {
    inner: MemoryElementStore,
    pages: Mutex<Vec<PageQuery>>,
    loads: Mutex<Vec<(ElementType, ElementId)>>,
    broken: Mutex<HashSet<ElementId>>,
    hooks: Mutex<HashMap<ElementId, LoadHook>>,
}

impl std::fmt::Debug for RecordingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingStore")
            .field("inner", &self.inner)
            .field("pages", &self.pages.lock().len())
            .field("loads", &self.loads.lock().len())
            .finish_non_exhaustive()
    }
}

impl RecordingStore {
    /// Wraps a store.
    pub fn new(inner: MemoryElementStore) -> Self {
        Self {
            inner,
            pages: Mutex::new(Vec::new()),
            loads: Mutex::new(Vec::new()),
            broken: Mutex::new(HashSet::new()),
            hooks: Mutex::new(HashMap::new()),
        }
    }

    /// Runs `hook` the first time `id` is loaded.
    pub fn on_load(&self, id: u64, hook: impl FnOnce() + Send + 'static) {
        self.hooks.lock().insert(ElementId(id), Box::new(hook));
    }

    /// Makes loading `id` fail.
    pub fn break_element(&self, id: u64) {
        self.broken.lock().insert(ElementId(id));
    }

    /// Returns the page queries made so far.
    pub fn pages(&self) -> Vec<PageQuery> {
        self.pages.lock().clone()
    }

    /// Returns the loads made so far.
    pub fn loads(&self) -> Vec<(ElementType, ElementId)> {
        self.loads.lock().clone()
    }

    /// Returns the wrapped store.
    pub fn inner(&self) -> &MemoryElementStore {
        &self.inner
    }
}

impl ElementStore for RecordingStore {
    fn count(&self, element_type: ElementType) -> CoreResult<u64> {
        self.inner.count(element_type)
    }

    fn page_ids(
        &self,
        element_type: ElementType,
        offset: u64,
        limit: u64,
    ) -> CoreResult<Vec<ElementId>> {
        self.pages.lock().push(PageQuery {
            element_type,
            offset,
            limit,
        });
        self.inner.page_ids(element_type, offset, limit)
    }

    fn load(&self, element_type: ElementType, id: ElementId) -> CoreResult<Option<Element>> {
        self.loads.lock().push((element_type, id));
        let hook = self.hooks.lock().remove(&id);
        if let Some(hook) = hook {
            hook();
        }
        if self.broken.lock().contains(&id) {
            return Err(hubindex_core::CoreError::store(format!("row {} is corrupt", id)));
        }
        self.inner.load(element_type, id)
    }
}

/// Every component wired against one in-memory engine.
pub struct TestHarness<S: ElementStore = MemoryElementStore> {
    /// The engine.
    pub engine: Arc<InMemoryEngine>,
    /// The element store.
    pub store: Arc<S>,
    /// The lifecycle manager.
    pub manager: Arc<IndexManager<InMemoryEngine>>,
    /// The rebuild engine.
    pub rebuild: RebuildEngine<InMemoryEngine, S, DefaultCodec>,
    /// The live indexer.
    pub live: LiveIndexer<InMemoryEngine, S, DefaultCodec>,
}

impl<S: ElementStore> TestHarness<S> {
    /// Creates a harness with the default test configuration.
    pub fn new(store: S) -> Self {
        Self::with_config(store, IndexerConfig::new(TEST_PREFIX))
    }

    /// Creates a harness with a custom configuration.
    pub fn with_config(store: S, config: IndexerConfig) -> Self {
        let engine = Arc::new(InMemoryEngine::new());
        let store = Arc::new(store);
        let codec = Arc::new(DefaultCodec);
        let manager = Arc::new(IndexManager::new(engine.clone(), config));
        Self {
            rebuild: RebuildEngine::new(manager.clone(), store.clone(), codec.clone()),
            live: LiveIndexer::new(manager.clone(), store.clone(), codec),
            engine,
            store,
            manager,
        }
    }

    /// Returns a logical name under the harness prefix.
    pub fn logical(&self, endpoint: &str, tag: &str) -> LogicalIndexName {
        LogicalIndexName::new(&self.manager.config().index_prefix, endpoint, tag)
            .expect("valid test index name")
    }

    /// Returns the physical index the alias points at.
    pub fn live_index(&self, endpoint: &str, tag: &str) -> Option<String> {
        self.engine.alias_target(self.logical(endpoint, tag).as_str())
    }

    /// Returns the document ids readable through the alias, as numbers.
    pub fn indexed_ids(&self, endpoint: &str, tag: &str) -> Vec<u64> {
        let mut ids: Vec<u64> = self
            .engine
            .document_ids(self.logical(endpoint, tag).as_str())
            .iter()
            .filter_map(|id| id.parse().ok())
            .collect();
        ids.sort_unstable();
        ids
    }
}
