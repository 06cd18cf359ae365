//! Batch rebuild engine.
//!
//! A rebuild walks every element of each enabled family in id order, in
//! windows of `chunk_size`, and writes each element and its ancestor folders
//! into the index currently being built. Per-element failures are recorded
//! and skipped. Only a failed count or page query stops a family.
//!
//! Per family the run moves through
//! `Pending -> Paging -> PerBatchUpsert -> Done | Failed`; a family goes back
//! to `Paging` for every window.

use crate::codec::DocumentCodec;
use crate::config::RebuildStrategy;
use crate::element::{Ancestors, Element, ElementId, ElementStore, ElementType};
use crate::endpoint::EndpointConfig;
use crate::error::{CoreError, CoreResult};
use crate::lifecycle::{IndexManager, ReconcileOptions, ReconcileOutcome, StagedIndex};
use crate::naming::LogicalIndexName;
use hubindex_engine::SearchEngine;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, info_span, warn};
use uuid::Uuid;

/// Rebuild progress of one element family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RebuildState {
    /// Not started.
    #[default]
    Pending,
    /// Counting or fetching a window of ids.
    Paging,
    /// Writing the elements of a window.
    PerBatchUpsert,
    /// Every window was processed.
    Done,
    /// A count or page query failed.
    Failed,
}

impl RebuildState {
    /// Returns true for `Done` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, RebuildState::Done | RebuildState::Failed)
    }
}

impl fmt::Display for RebuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RebuildState::Pending => "pending",
            RebuildState::Paging => "paging",
            RebuildState::PerBatchUpsert => "per-batch-upsert",
            RebuildState::Done => "done",
            RebuildState::Failed => "failed",
        };
        f.pad(name)
    }
}

/// One page of ids: rows `offset..offset + limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchWindow {
    /// Zero-based batch number.
    pub index: u64,
    /// First row.
    pub offset: u64,
    /// Rows in this window.
    pub limit: u64,
}

/// Splits `total` rows into `ceil(total / chunk_size)` windows.
pub fn plan_batches(total: u64, chunk_size: u64) -> Vec<BatchWindow> {
    let chunk_size = chunk_size.max(1);
    (0..total.div_ceil(chunk_size))
        .map(|index| {
            let offset = index * chunk_size;
            BatchWindow {
                index,
                offset,
                limit: chunk_size.min(total - offset),
            }
        })
        .collect()
}

/// Where each logical index is written during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteTargets {
    targets: BTreeMap<LogicalIndexName, String>,
}

impl WriteTargets {
    /// Creates an empty set; every lookup misses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes for `logical` go through its alias.
    pub fn through_aliases<'a>(names: impl IntoIterator<Item = &'a LogicalIndexName>) -> Self {
        let mut targets = Self::new();
        for name in names {
            targets.insert(name.clone(), name.to_string());
        }
        targets
    }

    /// Sets the destination of `logical`.
    pub fn insert(&mut self, logical: LogicalIndexName, destination: impl Into<String>) {
        self.targets.insert(logical, destination.into());
    }

    /// Returns the destination of `logical`.
    pub fn get(&self, logical: &LogicalIndexName) -> Option<&str> {
        self.targets.get(logical).map(String::as_str)
    }
}

/// An element or folder that could not be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementFailure {
    /// Element family.
    pub element_type: ElementType,
    /// Element id.
    pub id: ElementId,
    /// Whether the failure happened during the ancestor walk.
    pub folder: bool,
    /// Error message.
    pub reason: String,
}

/// Outcome for one element family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeReport {
    /// Element family.
    pub element_type: ElementType,
    /// Final state.
    pub state: RebuildState,
    /// Elements counted when the run started.
    pub total: u64,
    /// Windows processed.
    pub batches: u64,
    /// Elements written.
    pub indexed: u64,
    /// Ancestor folder writes.
    pub folders_indexed: u64,
    /// Elements that vanished, were not indexed by the endpoint, or are the root.
    pub skipped: u64,
    /// Recovered per-element failures.
    pub failures: Vec<ElementFailure>,
    /// Why the family failed, if it did.
    pub error: Option<String>,
}

impl TypeReport {
    fn new(element_type: ElementType) -> Self {
        Self {
            element_type,
            state: RebuildState::Pending,
            total: 0,
            batches: 0,
            indexed: 0,
            folders_indexed: 0,
            skipped: 0,
            failures: Vec::new(),
            error: None,
        }
    }
}

/// Outcome of a rebuild run.
#[derive(Debug, Clone)]
pub struct RebuildReport {
    /// Endpoint rebuilt.
    pub endpoint: String,
    /// Run id, also attached to the run's log span.
    pub run_id: Uuid,
    /// Strategy used.
    pub strategy: RebuildStrategy,
    /// One report per enabled family.
    pub types: Vec<TypeReport>,
    /// Alias swaps performed at the end of a staged run.
    pub promoted: Vec<ReconcileOutcome>,
    /// Why promotion stopped, if it did. Indices not promoted were discarded.
    pub promotion_error: Option<String>,
    /// Wall time.
    pub duration: Duration,
}

impl RebuildReport {
    /// Returns true if every family finished.
    pub fn is_complete(&self) -> bool {
        self.types.iter().all(|t| t.state == RebuildState::Done)
    }

    /// Elements written across families.
    pub fn indexed(&self) -> u64 {
        self.types.iter().map(|t| t.indexed).sum()
    }

    /// Recovered failures across families.
    pub fn failure_count(&self) -> usize {
        self.types.iter().map(|t| t.failures.len()).sum()
    }
}

/// Rebuilds every index of an endpoint from the element store.
///
/// Runs are sequential; there is no cancellation. A killed run can be
/// started again from scratch.
pub struct RebuildEngine<E: SearchEngine, S: ElementStore, C: DocumentCodec> {
    manager: Arc<IndexManager<E>>,
    store: Arc<S>,
    codec: Arc<C>,
    states: RwLock<BTreeMap<ElementType, RebuildState>>,
}

impl<E: SearchEngine, S: ElementStore, C: DocumentCodec> RebuildEngine<E, S, C> {
    /// Creates a rebuild engine.
    pub fn new(manager: Arc<IndexManager<E>>, store: Arc<S>, codec: Arc<C>) -> Self {
        Self {
            manager,
            store,
            codec,
            states: RwLock::new(BTreeMap::new()),
        }
    }

    /// Returns the lifecycle manager.
    pub fn manager(&self) -> &Arc<IndexManager<E>> {
        &self.manager
    }

    /// Returns the state of a family in the current or last run.
    pub fn state(&self, element_type: ElementType) -> RebuildState {
        self.states
            .read()
            .get(&element_type)
            .copied()
            .unwrap_or_default()
    }

    fn set_state(&self, element_type: ElementType, state: RebuildState) {
        self.states.write().insert(element_type, state);
    }

    /// Rebuilds every enabled family of `endpoint`.
    ///
    /// # Errors
    ///
    /// Fails if the indices cannot be prepared. A failed family is reported in
    /// the result, not as an error; in that case nothing is promoted and the
    /// live indices keep serving. A failed promotion is reported in
    /// [`RebuildReport::promotion_error`]; the indices promoted before it stay
    /// live and the remaining staged indices are discarded.
    pub fn run(&self, endpoint: &EndpointConfig) -> CoreResult<RebuildReport> {
        let run_id = Uuid::new_v4();
        let span = info_span!("rebuild", endpoint = %endpoint.name, run_id = %run_id);
        let _guard = span.enter();
        let started = Instant::now();
        let strategy = self.manager.config().strategy;

        let families: Vec<ElementType> = ElementType::ALL
            .into_iter()
            .filter(|ty| endpoint.is_type_enabled(*ty))
            .collect();
        for ty in &families {
            self.set_state(*ty, RebuildState::Pending);
        }

        info!(strategy = %strategy, "starting rebuild");
        let names = self.manager.resolver().endpoint_index_names(endpoint)?;
        let mut staged = Vec::new();
        let targets = match self.prepare(endpoint, &names, strategy, &mut staged) {
            Ok(targets) => targets,
            Err(e) => {
                error!(error = %e, "could not prepare indices");
                self.discard(&staged);
                for ty in &families {
                    self.set_state(*ty, RebuildState::Failed);
                }
                return Err(e);
            }
        };

        let types: Vec<TypeReport> = families
            .iter()
            .map(|ty| self.rebuild_type(endpoint, *ty, &targets))
            .collect();

        let mut report = RebuildReport {
            endpoint: endpoint.name.clone(),
            run_id,
            strategy,
            types,
            promoted: Vec::new(),
            promotion_error: None,
            duration: Duration::ZERO,
        };

        if report.is_complete() {
            let mut pending = staged.iter();
            for index in pending.by_ref() {
                match self.manager.promote(index) {
                    Ok(outcome) => report.promoted.push(outcome),
                    Err(e) => {
                        error!(logical = %index.logical, error = %e, "promotion failed");
                        report.promotion_error = Some(e.to_string());
                        self.discard(std::slice::from_ref(index));
                        break;
                    }
                }
            }
            self.discard(pending.as_slice());
        } else {
            warn!("rebuild incomplete, discarding staged indices");
            self.discard(&staged);
        }

        report.duration = started.elapsed();
        info!(
            indexed = report.indexed(),
            failures = report.failure_count(),
            promoted = report.promoted.len(),
            elapsed_ms = report.duration.as_millis() as u64,
            "rebuild finished"
        );
        Ok(report)
    }

    fn prepare(
        &self,
        endpoint: &EndpointConfig,
        names: &[LogicalIndexName],
        strategy: RebuildStrategy,
        staged: &mut Vec<StagedIndex>,
    ) -> CoreResult<WriteTargets> {
        let mut targets = WriteTargets::new();

        for logical in names {
            let live = match self.manager.resolver().try_physical_name(logical)? {
                Some(live) => live,
                None => {
                    let mapping = endpoint.mapping_for(logical.tag());
                    self.manager.ensure_index(logical, &mapping)?.live().clone()
                }
            };

            match strategy {
                RebuildStrategy::Staged => {
                    let index = self.manager.stage_empty(logical)?;
                    targets.insert(logical.clone(), index.staged.to_string());
                    staged.push(index);
                }
                RebuildStrategy::ClearFirst => {
                    let mapping = self.manager.physical_mapping(&live)?;
                    let options = ReconcileOptions::default()
                        .with_force(true)
                        .with_reindex_data(false);
                    self.manager.reconcile_mapping(logical, &mapping, options)?;
                    targets.insert(logical.clone(), logical.to_string());
                }
            }
        }
        Ok(targets)
    }

    fn discard(&self, staged: &[StagedIndex]) {
        for index in staged {
            if let Err(e) = self.manager.prune_stale(&index.logical) {
                warn!(logical = %index.logical, error = %e, "could not discard staged index");
            }
        }
    }

    /// Writes every element of one family into `targets`.
    pub fn rebuild_type(
        &self,
        endpoint: &EndpointConfig,
        element_type: ElementType,
        targets: &WriteTargets,
    ) -> TypeReport {
        let mut report = TypeReport::new(element_type);
        self.set_state(element_type, RebuildState::Paging);

        report.total = match self.store.count(element_type) {
            Ok(total) => total,
            Err(e) => return self.fail(report, e),
        };
        let windows = plan_batches(report.total, self.manager.config().chunk_size);
        info!(
            element_type = %element_type,
            total = report.total,
            batches = windows.len(),
            "rebuilding family"
        );

        for window in windows {
            self.set_state(element_type, RebuildState::Paging);
            let ids = match self.store.page_ids(element_type, window.offset, window.limit) {
                Ok(ids) => ids,
                Err(e) => return self.fail(report, e),
            };

            self.set_state(element_type, RebuildState::PerBatchUpsert);
            debug!(batch = window.index, offset = window.offset, size = ids.len(), "processing batch");
            for id in ids {
                self.index_one(endpoint, element_type, id, targets, &mut report);
            }
            report.batches += 1;
        }

        report.state = RebuildState::Done;
        self.set_state(element_type, RebuildState::Done);
        info!(
            element_type = %element_type,
            indexed = report.indexed,
            skipped = report.skipped,
            failures = report.failures.len(),
            "family done"
        );
        report
    }

    fn fail(&self, mut report: TypeReport, e: CoreError) -> TypeReport {
        error!(element_type = %report.element_type, error = %e, "family failed");
        report.state = RebuildState::Failed;
        report.error = Some(e.to_string());
        self.set_state(report.element_type, RebuildState::Failed);
        report
    }

    fn index_one(
        &self,
        endpoint: &EndpointConfig,
        element_type: ElementType,
        id: ElementId,
        targets: &WriteTargets,
        report: &mut TypeReport,
    ) {
        let element = match self.store.load(element_type, id) {
            Ok(Some(element)) => element,
            Ok(None) => {
                debug!(element_id = %id, "element vanished");
                report.skipped += 1;
                return;
            }
            Err(e) => {
                record(report, element_type, id, false, &e);
                return;
            }
        };

        if element.id == self.manager.config().root_folder_id || !endpoint.accepts(&element.kind) {
            report.skipped += 1;
            return;
        }

        if let Err(e) = self.write(endpoint, &element, targets) {
            record(report, element_type, id, false, &e);
            return;
        }
        debug!(element_id = %id, "indexed element");
        report.indexed += 1;

        let root = self.manager.config().root_folder_id;
        for parent in Ancestors::new(&*self.store, &element, root) {
            let folder = match parent {
                Ok(folder) => folder,
                Err(e) => {
                    record(report, element_type, id, true, &e);
                    break;
                }
            };
            if !endpoint.accepts(&folder.kind) {
                continue;
            }
            match self.write(endpoint, &folder, targets) {
                Ok(()) => report.folders_indexed += 1,
                Err(e) => record(report, element_type, folder.id, true, &e),
            }
        }
    }

    fn write(
        &self,
        endpoint: &EndpointConfig,
        element: &Element,
        targets: &WriteTargets,
    ) -> CoreResult<()> {
        let logical = self
            .manager
            .resolver()
            .logical_name(element, &endpoint.name)?;
        let destination = targets
            .get(&logical)
            .ok_or_else(|| CoreError::alias_not_found(logical.as_str()))?;
        let document = self.codec.encode(element, endpoint)?;
        self.manager
            .engine()
            .upsert_document(destination, &document)?;
        Ok(())
    }
}

fn record(
    report: &mut TypeReport,
    element_type: ElementType,
    id: ElementId,
    folder: bool,
    e: &CoreError,
) {
    warn!(element_type = %element_type, element_id = %id, folder, error = %e, "skipping element");
    report.failures.push(ElementFailure {
        element_type,
        id,
        folder,
        reason: e.to_string(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::DefaultCodec;
    use crate::config::IndexerConfig;
    use crate::element::MemoryElementStore;
    use hubindex_engine::{InMemoryEngine, Mapping};

    type Engine = RebuildEngine<InMemoryEngine, MemoryElementStore, DefaultCodec>;

    fn setup(
        strategy: RebuildStrategy,
        elements: Vec<Element>,
    ) -> (Arc<InMemoryEngine>, Arc<MemoryElementStore>, Engine) {
        let engine = Arc::new(InMemoryEngine::new());
        let config = IndexerConfig::new("prefix").with_strategy(strategy);
        let manager = Arc::new(IndexManager::new(engine.clone(), config));
        let store = Arc::new(MemoryElementStore::from_elements(elements));
        let rebuild = RebuildEngine::new(manager, store.clone(), Arc::new(DefaultCodec));
        (engine, store, rebuild)
    }

    fn assets() -> EndpointConfig {
        EndpointConfig::new("catalog").with_asset_indexing(true)
    }

    #[test]
    fn plans_ceil_batches() {
        let windows = plan_batches(250, 100);
        assert_eq!(
            windows
                .iter()
                .map(|w| (w.index, w.offset, w.limit))
                .collect::<Vec<_>>(),
            vec![(0, 0, 100), (1, 100, 100), (2, 200, 50)]
        );
        assert!(plan_batches(0, 100).is_empty());
        assert_eq!(plan_batches(100, 100).len(), 1);
        assert_eq!(plan_batches(3, 0).len(), 3);
    }

    #[test]
    fn staged_run_promotes_at_end() {
        let mut elements = vec![Element::asset_folder(1, None), Element::asset_folder(2, Some(1))];
        elements.extend((10..15).map(|id| Element::asset(id, 2)));
        let (engine, _, rebuild) = setup(RebuildStrategy::Staged, elements);

        let report = rebuild.run(&assets()).unwrap();
        assert!(report.is_complete());
        assert_eq!(rebuild.state(ElementType::Asset), RebuildState::Done);
        assert_eq!(rebuild.state(ElementType::Object), RebuildState::Pending);
        assert_eq!(report.indexed(), 6);
        assert_eq!(report.types[0].skipped, 1);
        assert_eq!(report.promoted.len(), 2);

        assert_eq!(
            engine.alias_target("prefix__catalog__asset").as_deref(),
            Some("prefix__catalog__asset-odd")
        );
        assert_eq!(engine.document_ids("prefix__catalog__asset").len(), 5);
        assert_eq!(engine.document_ids("prefix__catalog__assetfolder"), vec!["2"]);
    }

    #[test]
    fn failed_count_keeps_live_indices() {
        let (engine, store, rebuild) = setup(RebuildStrategy::Staged, vec![Element::asset(10, 1)]);
        rebuild.run(&assets()).unwrap();
        store.insert(Element::asset(11, 1));
        store.fail_queries(ElementType::Asset);

        let report = rebuild.run(&assets()).unwrap();
        assert!(!report.is_complete());
        assert_eq!(report.types[0].state, RebuildState::Failed);
        assert!(report.promoted.is_empty());
        assert_eq!(rebuild.state(ElementType::Asset), RebuildState::Failed);

        assert_eq!(
            engine.alias_target("prefix__catalog__asset").as_deref(),
            Some("prefix__catalog__asset-odd")
        );
        assert_eq!(engine.document_ids("prefix__catalog__asset"), vec!["10"]);
        assert!(!engine
            .indices()
            .contains(&"prefix__catalog__asset-even".to_string()));
    }

    #[test]
    fn clear_first_writes_through_alias() {
        let (engine, _, rebuild) = setup(
            RebuildStrategy::ClearFirst,
            vec![Element::asset(10, 1), Element::asset(11, 1)],
        );
        let report = rebuild.run(&assets()).unwrap();

        assert!(report.promoted.is_empty());
        assert_eq!(report.indexed(), 2);
        assert_eq!(
            engine.alias_target("prefix__catalog__asset").as_deref(),
            Some("prefix__catalog__asset-odd")
        );
        assert_eq!(engine.document_ids("prefix__catalog__asset"), vec!["10", "11"]);
    }

    #[test]
    fn rejected_document_is_skipped() {
        let (engine, _, rebuild) = setup(
            RebuildStrategy::Staged,
            (10..13).map(|id| Element::asset(id, 1)).collect(),
        );
        engine.reject_document("11");

        let report = rebuild.run(&assets()).unwrap();
        assert!(report.is_complete());
        assert_eq!(report.failure_count(), 1);
        assert_eq!(report.types[0].failures[0].id, ElementId(11));
        assert_eq!(engine.document_ids("prefix__catalog__asset"), vec!["10", "12"]);
    }

    #[test]
    fn disabled_classes_are_skipped() {
        let endpoint = EndpointConfig::new("catalog")
            .with_object_indexing(true)
            .with_class("Car")
            .with_mapping("car", Mapping::new());
        let (engine, _, rebuild) = setup(
            RebuildStrategy::Staged,
            vec![Element::object(20, "Car", 1), Element::object(21, "Bike", 1)],
        );

        let report = rebuild.run(&endpoint).unwrap();
        assert_eq!(report.types[0].element_type, ElementType::Object);
        assert_eq!(report.types[0].indexed, 1);
        assert_eq!(report.types[0].skipped, 1);
        assert_eq!(engine.document_ids("prefix__catalog__car"), vec!["20"]);
    }
}
