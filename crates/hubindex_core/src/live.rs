//! Live indexing of single element changes.
//!
//! Writes go through the alias, so they land in whichever index is live at
//! the time of the call. While a staged rebuild fills the inactive slot, the
//! same write goes to that slot as well and survives its promotion.
//!
//! A write that races the alias swap of a mapping migration can still land in
//! the index that is about to be dropped and is then lost. Rebuilding the
//! endpoint recovers it.

use crate::codec::DocumentCodec;
use crate::element::{Ancestors, Element, ElementId, ElementStore, ElementType};
use crate::endpoint::EndpointConfig;
use crate::error::CoreResult;
use crate::lifecycle::IndexManager;
use hubindex_engine::SearchEngine;
use std::sync::Arc;
use tracing::{debug, warn};

/// Counters for one live change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LiveOutcome {
    /// Element documents written or deleted.
    pub written: u64,
    /// Ancestor folder documents written.
    pub folders: u64,
    /// Endpoints that do not index the element, or a missing element.
    pub skipped: u64,
    /// Writes that failed and were logged.
    pub failed: u64,
}

/// Applies element upserts and deletes to every endpoint that indexes them.
pub struct LiveIndexer<E: SearchEngine, S: ElementStore, C: DocumentCodec> {
    manager: Arc<IndexManager<E>>,
    store: Arc<S>,
    codec: Arc<C>,
}

impl<E: SearchEngine, S: ElementStore, C: DocumentCodec> LiveIndexer<E, S, C> {
    /// Creates a live indexer.
    pub fn new(manager: Arc<IndexManager<E>>, store: Arc<S>, codec: Arc<C>) -> Self {
        Self {
            manager,
            store,
            codec,
        }
    }

    /// Loads an element and upserts it and its ancestor folders.
    ///
    /// # Errors
    ///
    /// Only a failed element load is returned; write failures are counted.
    pub fn index_element(
        &self,
        endpoints: &[EndpointConfig],
        element_type: ElementType,
        id: ElementId,
    ) -> CoreResult<LiveOutcome> {
        let mut outcome = LiveOutcome::default();
        let Some(element) = self.store.load(element_type, id)? else {
            debug!(element_type = %element_type, element_id = %id, "element gone, nothing to index");
            outcome.skipped += 1;
            return Ok(outcome);
        };

        for endpoint in endpoints {
            if !self.indexes(endpoint, &element) {
                outcome.skipped += 1;
                continue;
            }
            match self.upsert(endpoint, &element) {
                Ok(()) => outcome.written += 1,
                Err(e) => {
                    warn!(endpoint = %endpoint.name, element_id = %id, error = %e, "upsert failed");
                    outcome.failed += 1;
                    continue;
                }
            }
            self.refresh_folders(endpoint, &element, &mut outcome);
        }
        Ok(outcome)
    }

    /// Deletes an element's document and refreshes its ancestor folders.
    pub fn remove_element(&self, endpoints: &[EndpointConfig], element: &Element) -> LiveOutcome {
        let mut outcome = LiveOutcome::default();
        for endpoint in endpoints {
            if !self.indexes(endpoint, element) {
                outcome.skipped += 1;
                continue;
            }
            match self.delete(endpoint, element) {
                Ok(true) => outcome.written += 1,
                Ok(false) => {
                    debug!(endpoint = %endpoint.name, element_id = %element.id, "document already absent");
                    outcome.skipped += 1;
                }
                Err(e) => {
                    warn!(endpoint = %endpoint.name, element_id = %element.id, error = %e, "delete failed");
                    outcome.failed += 1;
                }
            }
            self.refresh_folders(endpoint, element, &mut outcome);
        }
        outcome
    }

    fn indexes(&self, endpoint: &EndpointConfig, element: &Element) -> bool {
        element.id != self.manager.config().root_folder_id && endpoint.accepts(&element.kind)
    }

    fn upsert(&self, endpoint: &EndpointConfig, element: &Element) -> CoreResult<()> {
        let logical = self
            .manager
            .resolver()
            .logical_name(element, &endpoint.name)?;
        let document = self.codec.encode(element, endpoint)?;
        self.manager
            .engine()
            .upsert_document(logical.as_str(), &document)?;
        if let Some(staged) = self.manager.staged_index(&logical) {
            self.manager
                .engine()
                .upsert_document(staged.as_str(), &document)?;
        }
        Ok(())
    }

    fn delete(&self, endpoint: &EndpointConfig, element: &Element) -> CoreResult<bool> {
        let logical = self
            .manager
            .resolver()
            .logical_name(element, &endpoint.name)?;
        let id = element.id.to_string();
        if let Some(staged) = self.manager.staged_index(&logical) {
            match self.manager.engine().delete_document(staged.as_str(), &id) {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e.into()),
            }
        }
        match self.manager.engine().delete_document(logical.as_str(), &id) {
            Ok(()) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn refresh_folders(&self, endpoint: &EndpointConfig, element: &Element, outcome: &mut LiveOutcome) {
        let root = self.manager.config().root_folder_id;
        for parent in Ancestors::new(&*self.store, element, root) {
            let folder = match parent {
                Ok(folder) => folder,
                Err(e) => {
                    warn!(endpoint = %endpoint.name, element_id = %element.id, error = %e, "ancestor walk failed");
                    outcome.failed += 1;
                    return;
                }
            };
            if !endpoint.accepts(&folder.kind) {
                continue;
            }
            match self.upsert(endpoint, &folder) {
                Ok(()) => outcome.folders += 1,
                Err(e) => {
                    warn!(endpoint = %endpoint.name, folder_id = %folder.id, error = %e, "folder upsert failed");
                    outcome.failed += 1;
                }
            }
        }
    }
}
