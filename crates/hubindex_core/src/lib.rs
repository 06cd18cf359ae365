//! # hubindex Core
//!
//! Index lifecycle and rebuild engine for hubindex.
//!
//! This crate provides:
//! - Logical and physical index naming (`{prefix}__{endpoint}__{tag}`, `-odd` / `-even`)
//! - The element resolver, mapping element kinds to logical indices
//! - The element model and the [`ElementStore`] trait it is read through
//! - Endpoint configuration and the [`DocumentCodec`] seam
//! - The [`IndexManager`]: alias-based blue/green creation, mapping
//!   migration, clearing and teardown
//! - The [`RebuildEngine`]: full rebuilds in fixed-size batches
//! - The [`LiveIndexer`]: single element upserts and deletes
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use hubindex_core::{IndexManager, IndexerConfig, LogicalIndexName, Mapping};
//! use hubindex_engine::InMemoryEngine;
//!
//! let engine = Arc::new(InMemoryEngine::new());
//! let manager = IndexManager::new(engine.clone(), IndexerConfig::new("shop"));
//! let logical = LogicalIndexName::new("shop", "web", "asset").unwrap();
//!
//! let outcome = manager.ensure_index(&logical, &Mapping::new()).unwrap();
//! assert_eq!(outcome.live().as_str(), "shop__web__asset-even");
//! assert_eq!(engine.alias_target("shop__web__asset").as_deref(), Some("shop__web__asset-even"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod config;
mod diff;
mod element;
mod endpoint;
mod error;
mod lifecycle;
mod live;
mod naming;
mod rebuild;
mod resolver;

pub use codec::{DefaultCodec, DocumentCodec};
pub use config::{IndexerConfig, RebuildStrategy, DEFAULT_CHUNK_SIZE, ROOT_FOLDER_ID};
pub use diff::{diff_assoc_recursive, mapping_changed, MappingDiff};
pub use element::{
    Ancestors, Element, ElementId, ElementKind, ElementStore, ElementType, MemoryElementStore,
};
pub use endpoint::{EndpointConfig, WorkspaceRule, Workspaces};
pub use error::{CoreError, CoreResult};
pub use hubindex_engine::Mapping;
pub use lifecycle::{
    EnsureOutcome, IndexManager, IndexStatus, ReconcileOptions, ReconcileOutcome, StagedIndex,
};
pub use live::{LiveIndexer, LiveOutcome};
pub use naming::{
    LogicalIndexName, Parity, PhysicalIndexName, ASSET_FOLDER_TAG, ASSET_TAG, OBJECT_FOLDER_TAG,
    SEGMENT_SEPARATOR,
};
pub use rebuild::{
    plan_batches, BatchWindow, ElementFailure, RebuildEngine, RebuildReport, RebuildState,
    TypeReport, WriteTargets,
};
pub use resolver::{inactive_sibling, type_tag, Resolver, Subject};
