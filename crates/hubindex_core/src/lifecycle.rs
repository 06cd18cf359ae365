//! Index lifecycle manager: alias-based blue/green index swapping.
//!
//! Every logical index is an alias bound to one of two physical slots. A
//! mapping change builds the other slot, copies the data over, rebinds the
//! alias in one engine call and drops the old slot:
//!
//! 1. create the target with the new mapping
//! 2. refresh the source and reindex it into the target (optional)
//! 3. rebind the alias to the target
//! 4. delete the source
//!
//! Each step must be acknowledged before the next one starts. A failed step
//! aborts the call and leaves the earlier steps applied; the alias keeps
//! pointing at the source until step 3 succeeds. A crash between steps 3
//! and 4 leaves a stale slot that [`IndexManager::prune_stale`] removes.
//!
//! Slots created by [`IndexManager::stage_empty`] are tracked until they are
//! promoted or pruned, so live writers can reach them too
//! ([`IndexManager::staged_index`]).

use crate::config::IndexerConfig;
use crate::diff::mapping_changed;
use crate::error::{CoreError, CoreResult};
use crate::naming::{validate_segment, LogicalIndexName, Parity, PhysicalIndexName};
use crate::resolver::Resolver;
use hubindex_engine::{EngineError, Mapping, SearchEngine};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Options for [`IndexManager::reconcile_mapping`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Copy the documents of the source into the target.
    pub reindex_data: bool,
    /// Migrate even when the mapping is unchanged.
    pub force: bool,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            reindex_data: true,
            force: false,
        }
    }
}

impl ReconcileOptions {
    /// Sets whether documents are copied.
    #[must_use]
    pub fn with_reindex_data(mut self, reindex_data: bool) -> Self {
        self.reindex_data = reindex_data;
        self
    }

    /// Sets whether an unchanged mapping still migrates.
    #[must_use]
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

/// Result of a reconcile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The mapping matched; nothing was changed.
    Unchanged {
        /// The live index.
        live: PhysicalIndexName,
    },
    /// The alias now points at a new index.
    Migrated {
        /// Index the alias pointed at before.
        from: PhysicalIndexName,
        /// Index the alias points at now.
        to: PhysicalIndexName,
        /// Whether the old index was deleted.
        source_dropped: bool,
    },
}

impl ReconcileOutcome {
    /// Returns the index the alias points at after the call.
    pub fn live(&self) -> &PhysicalIndexName {
        match self {
            ReconcileOutcome::Unchanged { live } => live,
            ReconcileOutcome::Migrated { to, .. } => to,
        }
    }

    /// Returns true if the alias was rebound.
    pub fn migrated(&self) -> bool {
        matches!(self, ReconcileOutcome::Migrated { .. })
    }
}

/// Result of [`IndexManager::ensure_index`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnsureOutcome {
    /// The alias did not exist; the even slot was created and bound.
    Created {
        /// The new live index.
        live: PhysicalIndexName,
    },
    /// The alias existed and was reconciled.
    Reconciled(ReconcileOutcome),
}

impl EnsureOutcome {
    /// Returns the index the alias points at after the call.
    pub fn live(&self) -> &PhysicalIndexName {
        match self {
            EnsureOutcome::Created { live } => live,
            EnsureOutcome::Reconciled(outcome) => outcome.live(),
        }
    }
}

/// An empty inactive slot being filled while the live slot serves reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedIndex {
    /// The alias.
    pub logical: LogicalIndexName,
    /// The slot the alias pointed at when staging began.
    pub live: PhysicalIndexName,
    /// The slot being filled.
    pub staged: PhysicalIndexName,
}

/// Snapshot of one logical index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexStatus {
    /// The alias.
    pub logical: LogicalIndexName,
    /// The bound slot, if any.
    pub live: Option<PhysicalIndexName>,
    /// An unbound slot that still exists.
    pub orphan: Option<PhysicalIndexName>,
    /// Searchable documents behind the alias.
    pub documents: Option<u64>,
}

/// Owns index creation, mapping migration and teardown.
pub struct IndexManager<E: SearchEngine> {
    resolver: Resolver<E>,
    config: IndexerConfig,
    staging: Mutex<BTreeMap<LogicalIndexName, PhysicalIndexName>>,
}

impl<E: SearchEngine> IndexManager<E> {
    /// Creates a manager.
    pub fn new(engine: Arc<E>, config: IndexerConfig) -> Self {
        Self {
            resolver: Resolver::new(config.index_prefix.clone(), engine),
            config,
            staging: Mutex::new(BTreeMap::new()),
        }
    }

    /// Returns the resolver.
    pub fn resolver(&self) -> &Resolver<E> {
        &self.resolver
    }

    /// Returns the configuration.
    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    /// Returns the engine.
    pub fn engine(&self) -> &Arc<E> {
        self.resolver.engine()
    }

    /// Creates the index behind `logical`, or reconciles its mapping.
    ///
    /// Without an alias, the even slot is created with `mapping` and bound.
    /// With one, this is [`IndexManager::reconcile_mapping`] with default
    /// options.
    pub fn ensure_index(
        &self,
        logical: &LogicalIndexName,
        mapping: &Mapping,
    ) -> CoreResult<EnsureOutcome> {
        if self.resolver.try_physical_name(logical)?.is_some() {
            return self
                .reconcile_mapping(logical, mapping, ReconcileOptions::default())
                .map(EnsureOutcome::Reconciled);
        }

        // Unbound slots are leftovers nobody reads.
        for parity in [Parity::Odd, Parity::Even] {
            self.drop_leftover(&logical.physical(parity))?;
        }

        let live = logical.physical(Parity::Even);
        self.create(&live, mapping)?;
        self.bind(logical, &live)?;
        info!(logical = %logical, physical = %live, "created index");
        Ok(EnsureOutcome::Created { live })
    }

    /// Migrates the index behind `logical` to `mapping` if it differs.
    ///
    /// # Errors
    ///
    /// [`CoreError::AliasNotFound`] if the alias is unbound, otherwise the
    /// error of the first failing migration step.
    pub fn reconcile_mapping(
        &self,
        logical: &LogicalIndexName,
        mapping: &Mapping,
        options: ReconcileOptions,
    ) -> CoreResult<ReconcileOutcome> {
        let source = self.resolver.physical_name(logical)?;

        if !options.force && !self.mapping_changed(&source, mapping)? {
            debug!(logical = %logical, physical = %source, "mapping unchanged");
            return Ok(ReconcileOutcome::Unchanged { live: source });
        }

        self.migrate(logical, source, mapping, options.reindex_data)
    }

    /// Drops every document behind `logical`, keeping its mapping.
    ///
    /// # Errors
    ///
    /// [`CoreError::NoMappingFound`] if the index was never created or has
    /// an empty mapping.
    pub fn clear_index_data(&self, logical: &LogicalIndexName) -> CoreResult<ReconcileOutcome> {
        let Some(source) = self.resolver.try_physical_name(logical)? else {
            return Err(CoreError::no_mapping_found(logical.as_str()));
        };
        let mapping = self.physical_mapping(&source)?;
        if mapping.is_empty() {
            return Err(CoreError::no_mapping_found(logical.as_str()));
        }
        self.migrate(logical, source, &mapping, false)
    }

    /// Deletes every physical index and alias of an endpoint.
    ///
    /// Not atomic with respect to concurrent writers.
    pub fn delete_all_physical_indices(&self, endpoint: &str) -> CoreResult<()> {
        validate_segment("endpoint name", endpoint)?;
        let pattern = LogicalIndexName::endpoint_pattern(&self.config.index_prefix, endpoint);
        let owned = pattern.trim_end_matches('*');
        self.staging
            .lock()
            .retain(|logical, _| !logical.as_str().starts_with(owned));
        let ack = self.engine().delete_index(&pattern)?;
        if ack.acknowledged {
            info!(endpoint, pattern = %pattern, "deleted endpoint indices");
        } else {
            warn!(endpoint, pattern = %pattern, "endpoint delete not acknowledged");
        }
        Ok(())
    }

    /// Returns the mapping of an alias or of a physical `-odd`/`-even` index.
    ///
    /// # Errors
    ///
    /// [`CoreError::AliasNotFound`] if `name` is an alias that is not bound.
    pub fn index_mapping(&self, name: &str) -> CoreResult<Mapping> {
        if PhysicalIndexName::has_parity_suffix(name) {
            return self.read_mapping(name);
        }

        if !self.engine().alias_exists(name)? {
            return Err(CoreError::alias_not_found(name));
        }
        let bindings = match self.engine().get_alias(name) {
            Ok(bindings) => bindings,
            Err(EngineError::NotFound { .. }) => return Err(CoreError::alias_not_found(name)),
            Err(e) => return Err(e.into()),
        };
        let index = bindings
            .index_for(name)
            .ok_or_else(|| CoreError::alias_not_found(name))?
            .to_string();
        self.read_mapping(&index)
    }

    /// Returns the mapping of a physical index.
    pub fn physical_mapping(&self, physical: &PhysicalIndexName) -> CoreResult<Mapping> {
        self.read_mapping(physical.as_str())
    }

    /// Returns true if the mapping of `physical` differs from `mapping`.
    pub fn mapping_changed(
        &self,
        physical: &PhysicalIndexName,
        mapping: &Mapping,
    ) -> CoreResult<bool> {
        let current = self.physical_mapping(physical)?;
        Ok(mapping_changed(&current, mapping))
    }

    /// Creates the inactive slot of `logical` empty, with the live mapping.
    ///
    /// The alias is left untouched.
    pub fn stage_empty(&self, logical: &LogicalIndexName) -> CoreResult<StagedIndex> {
        let live = self.resolver.physical_name(logical)?;
        let mapping = self.physical_mapping(&live)?;
        let staged = live.sibling();

        self.unstage(logical);
        self.drop_leftover(&staged)?;
        self.create(&staged, &mapping)?;
        self.staging.lock().insert(logical.clone(), staged.clone());
        info!(logical = %logical, live = %live, staged = %staged, "staged empty index");

        Ok(StagedIndex {
            logical: logical.clone(),
            live,
            staged,
        })
    }

    /// Returns the slot being filled for `logical`, if one is staged.
    pub fn staged_index(&self, logical: &LogicalIndexName) -> Option<PhysicalIndexName> {
        self.staging.lock().get(logical).cloned()
    }

    fn unstage(&self, logical: &LogicalIndexName) {
        self.staging.lock().remove(logical);
    }

    /// Makes a staged slot live and drops the slot it replaces.
    ///
    /// The slot is no longer tracked as staged afterwards, whether or not the
    /// promotion succeeded.
    ///
    /// # Errors
    ///
    /// [`CoreError::AliasSwapFailed`] if the alias no longer points where it
    /// did at staging time, or the rebind is not acknowledged.
    pub fn promote(&self, staged: &StagedIndex) -> CoreResult<ReconcileOutcome> {
        let result = self.swap_in(staged);
        self.unstage(&staged.logical);
        result
    }

    fn swap_in(&self, staged: &StagedIndex) -> CoreResult<ReconcileOutcome> {
        let current = self.resolver.physical_name(&staged.logical)?;
        if current != staged.live {
            let err = CoreError::AliasSwapFailed {
                alias: staged.logical.to_string(),
                index: staged.staged.to_string(),
                reason: format!("alias moved to {} since staging", current),
            };
            error!(error = %err, "promotion aborted");
            return Err(err);
        }

        self.refresh(&staged.staged)?;
        self.bind(&staged.logical, &staged.staged)?;
        let source_dropped = self.drop_source(&staged.live);
        info!(logical = %staged.logical, live = %staged.staged, "promoted staged index");

        Ok(ReconcileOutcome::Migrated {
            from: staged.live.clone(),
            to: staged.staged.clone(),
            source_dropped,
        })
    }

    /// Deletes the unbound slot of `logical` if it exists.
    ///
    /// Returns the deleted index.
    pub fn prune_stale(&self, logical: &LogicalIndexName) -> CoreResult<Option<PhysicalIndexName>> {
        self.unstage(logical);
        let Some(live) = self.resolver.try_physical_name(logical)? else {
            return Ok(None);
        };
        let stale = live.sibling();
        if !self.engine().index_exists(stale.as_str())? {
            return Ok(None);
        }
        self.engine().delete_index(stale.as_str())?;
        info!(logical = %logical, stale = %stale, "pruned stale index");
        Ok(Some(stale))
    }

    /// Reports the bound slot, any orphan slot and the document count.
    pub fn status(&self, logical: &LogicalIndexName) -> CoreResult<IndexStatus> {
        let live = self.resolver.try_physical_name(logical)?;

        let mut orphan = None;
        for parity in [Parity::Odd, Parity::Even] {
            let slot = logical.physical(parity);
            if live.as_ref() != Some(&slot) && self.engine().index_exists(slot.as_str())? {
                orphan = Some(slot);
            }
        }

        let documents = match &live {
            Some(_) => Some(self.engine().count_documents(logical.as_str())?.count),
            None => None,
        };

        Ok(IndexStatus {
            logical: logical.clone(),
            live,
            orphan,
            documents,
        })
    }

    fn migrate(
        &self,
        logical: &LogicalIndexName,
        source: PhysicalIndexName,
        mapping: &Mapping,
        reindex_data: bool,
    ) -> CoreResult<ReconcileOutcome> {
        let target = source.sibling();
        info!(logical = %logical, source = %source, target = %target, reindex_data, "migrating index");

        self.unstage(logical);
        self.drop_leftover(&target)?;
        self.create(&target, mapping)?;
        if reindex_data {
            self.refresh(&source)?;
            self.copy(&source, &target)?;
        }
        self.bind(logical, &target)?;
        let source_dropped = self.drop_source(&source);

        info!(logical = %logical, live = %target, "migration complete");
        Ok(ReconcileOutcome::Migrated {
            from: source,
            to: target,
            source_dropped,
        })
    }

    fn read_mapping(&self, index: &str) -> CoreResult<Mapping> {
        let mappings = self.engine().get_mapping(index)?;
        Ok(mappings
            .mapping_of(index)
            .or_else(|| mappings.single().map(|(_, mapping)| mapping))
            .cloned()
            .unwrap_or_default())
    }

    fn drop_leftover(&self, index: &PhysicalIndexName) -> CoreResult<()> {
        if self.engine().index_exists(index.as_str())? {
            warn!(physical = %index, "deleting leftover unbound index");
            self.engine().delete_index(index.as_str())?;
        }
        Ok(())
    }

    fn create(&self, index: &PhysicalIndexName, mapping: &Mapping) -> CoreResult<()> {
        let reason = match self.engine().create_index(index.as_str(), mapping) {
            Ok(ack) if ack.acknowledged => {
                debug!(physical = %index, "index created");
                return Ok(());
            }
            Ok(_) => "not acknowledged".to_string(),
            Err(e) => e.to_string(),
        };
        error!(physical = %index, reason = %reason, "index creation failed");
        Err(CoreError::IndexCreateFailed {
            index: index.to_string(),
            reason,
        })
    }

    fn refresh(&self, index: &PhysicalIndexName) -> CoreResult<()> {
        let reason = match self.engine().refresh_index(index.as_str()) {
            Ok(response) if response.succeeded() => return Ok(()),
            Ok(response) => match response.shards {
                Some(shards) => format!("{} of {} shards failed", shards.failed, shards.total),
                None => "no shard report".to_string(),
            },
            Err(e) => e.to_string(),
        };
        error!(physical = %index, reason = %reason, "refresh failed");
        Err(CoreError::RefreshFailed {
            index: index.to_string(),
            reason,
        })
    }

    fn copy(&self, source: &PhysicalIndexName, target: &PhysicalIndexName) -> CoreResult<()> {
        let reason = match self.engine().reindex(source.as_str(), target.as_str()) {
            Ok(response) if response.succeeded() => {
                debug!(source = %source, target = %target, copied = response.total, "reindexed");
                return Ok(());
            }
            Ok(response) if response.failures.is_none() => "no failure report".to_string(),
            Ok(response) => format!("{} documents failed", response.failure_count()),
            Err(e) => e.to_string(),
        };
        error!(source = %source, target = %target, reason = %reason, "reindex failed");
        Err(CoreError::ReindexFailed {
            from_index: source.to_string(),
            to_index: target.to_string(),
            reason,
        })
    }

    fn bind(&self, logical: &LogicalIndexName, index: &PhysicalIndexName) -> CoreResult<()> {
        let reason = match self.engine().create_alias(index.as_str(), logical.as_str()) {
            Ok(ack) if ack.acknowledged => return Ok(()),
            Ok(_) => "not acknowledged".to_string(),
            Err(e) => e.to_string(),
        };
        error!(logical = %logical, physical = %index, reason = %reason, "alias swap failed");
        Err(CoreError::AliasSwapFailed {
            alias: logical.to_string(),
            index: index.to_string(),
            reason,
        })
    }

    /// The alias already points elsewhere, so a failure only leaves a stale index.
    fn drop_source(&self, source: &PhysicalIndexName) -> bool {
        match self.engine().delete_index(source.as_str()) {
            Ok(ack) => ack.acknowledged,
            Err(e) if e.is_not_found() => true,
            Err(e) => {
                warn!(physical = %source, error = %e, "could not delete old index");
                false
            }
        }
    }
}
