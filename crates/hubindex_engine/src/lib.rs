//! # hubindex Engine
//!
//! Search engine client contract and implementations for hubindex.
//!
//! This crate is the lowest layer of hubindex. It knows how to talk to a
//! search engine (create and drop indices, manage aliases, read mappings,
//! copy documents between indices, write single documents) and nothing
//! about content elements, endpoints or rebuild policy.
//!
//! ## Design Principles
//!
//! - The engine surface is a trait ([`SearchEngine`]) so the lifecycle code
//!   can run against a real cluster or an in-process model
//! - Responses keep the engine's own shape (`acknowledged`, `_shards`,
//!   `failures`) so callers decide what counts as failure
//! - Alias rebinding is a single engine call and is atomic
//! - Implementations must be `Send + Sync`
//!
//! ## Available Engines
//!
//! - [`InMemoryEngine`] - For testing and dry runs, with call recording and fault injection
//! - [`HttpEngine`] - Elasticsearch-compatible REST client over any [`HttpClient`]
//!
//! ## Example
//!
//! ```rust
//! use hubindex_engine::{InMemoryEngine, Mapping, SearchEngine};
//!
//! let engine = InMemoryEngine::new();
//! engine.create_index("shop__web__asset-even", &Mapping::new()).unwrap();
//! engine.create_alias("shop__web__asset-even", "shop__web__asset").unwrap();
//! assert!(engine.alias_exists("shop__web__asset").unwrap());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod engine;
mod error;
mod http;
mod memory;
mod types;

pub use engine::SearchEngine;
pub use error::{EngineError, EngineResult};
pub use http::{HttpClient, HttpEngine, HttpMethod, HttpRequest, HttpResponse};
pub use memory::{EngineCall, Fault, InMemoryEngine};
pub use types::{
    Acknowledged, AliasBindings, CountResponse, Document, IndexAliases, IndexMapping,
    IndexMappings, Mapping, RefreshResponse, ReindexResponse, ShardStats,
};
