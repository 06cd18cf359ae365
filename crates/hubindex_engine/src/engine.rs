//! Search engine trait definition.

use crate::error::EngineResult;
use crate::types::{
    Acknowledged, AliasBindings, CountResponse, Document, IndexMappings, Mapping,
    RefreshResponse, ReindexResponse,
};

/// The search engine surface consumed by hubindex.
///
/// Engines are **dumb index stores**. They create and drop physical indices,
/// bind aliases, copy documents and write single documents. They do not know
/// about logical names, parity suffixes or rebuild policy.
///
/// # Invariants
///
/// - `create_alias` is atomic: after it returns, exactly one index carries the
///   alias, and no observer saw zero or two bindings
/// - A mapping is fixed for the lifetime of an index
/// - Document writes addressed to an alias land in the index it is bound to
/// - Engines must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::InMemoryEngine`] - For testing
/// - [`super::HttpEngine`] - For Elasticsearch-compatible clusters
pub trait SearchEngine: Send + Sync {
    /// Creates an index with the given mapping.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EngineError::AlreadyExists`] if the name is taken.
    fn create_index(&self, name: &str, mapping: &Mapping) -> EngineResult<Acknowledged>;

    /// Deletes every index matching `pattern` (`*` matches any run of characters).
    ///
    /// Aliases bound to a deleted index disappear with it. A pattern without a
    /// wildcard that matches nothing is a [`crate::EngineError::NotFound`].
    fn delete_index(&self, pattern: &str) -> EngineResult<Acknowledged>;

    /// Returns true if a physical index with this name exists.
    fn index_exists(&self, name: &str) -> EngineResult<bool>;

    /// Returns true if some index carries this alias.
    fn alias_exists(&self, name: &str) -> EngineResult<bool>;

    /// Binds `alias` to `index`, removing it from every other index in the same step.
    fn create_alias(&self, index: &str, alias: &str) -> EngineResult<Acknowledged>;

    /// Returns the indices carrying `alias`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EngineError::NotFound`] if no index carries it.
    fn get_alias(&self, alias: &str) -> EngineResult<AliasBindings>;

    /// Returns the mapping of an index (or of the index behind an alias).
    fn get_mapping(&self, name: &str) -> EngineResult<IndexMappings>;

    /// Makes pending writes on `name` visible to readers and to reindex.
    fn refresh_index(&self, name: &str) -> EngineResult<RefreshResponse>;

    /// Copies every document from `source` into `target`, server side.
    fn reindex(&self, source: &str, target: &str) -> EngineResult<ReindexResponse>;

    /// Writes one document, replacing any document with the same id.
    fn upsert_document(&self, index: &str, document: &Document) -> EngineResult<()>;

    /// Deletes one document.
    fn delete_document(&self, index: &str, id: &str) -> EngineResult<()>;

    /// Counts documents in an index or alias.
    fn count_documents(&self, index: &str) -> EngineResult<CountResponse>;
}

impl<E: SearchEngine + ?Sized> SearchEngine for std::sync::Arc<E> {
    fn create_index(&self, name: &str, mapping: &Mapping) -> EngineResult<Acknowledged> {
        (**self).create_index(name, mapping)
    }

    fn delete_index(&self, pattern: &str) -> EngineResult<Acknowledged> {
        (**self).delete_index(pattern)
    }

    fn index_exists(&self, name: &str) -> EngineResult<bool> {
        (**self).index_exists(name)
    }

    fn alias_exists(&self, name: &str) -> EngineResult<bool> {
        (**self).alias_exists(name)
    }

    fn create_alias(&self, index: &str, alias: &str) -> EngineResult<Acknowledged> {
        (**self).create_alias(index, alias)
    }

    fn get_alias(&self, alias: &str) -> EngineResult<AliasBindings> {
        (**self).get_alias(alias)
    }

    fn get_mapping(&self, name: &str) -> EngineResult<IndexMappings> {
        (**self).get_mapping(name)
    }

    fn refresh_index(&self, name: &str) -> EngineResult<RefreshResponse> {
        (**self).refresh_index(name)
    }

    fn reindex(&self, source: &str, target: &str) -> EngineResult<ReindexResponse> {
        (**self).reindex(source, target)
    }

    fn upsert_document(&self, index: &str, document: &Document) -> EngineResult<()> {
        (**self).upsert_document(index, document)
    }

    fn delete_document(&self, index: &str, id: &str) -> EngineResult<()> {
        (**self).delete_document(index, id)
    }

    fn count_documents(&self, index: &str) -> EngineResult<CountResponse> {
        (**self).count_documents(index)
    }
}
