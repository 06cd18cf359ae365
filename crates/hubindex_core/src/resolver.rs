//! Element resolver: element or type tag to logical name, alias to physical.

use crate::element::{Element, ElementKind};
use crate::endpoint::EndpointConfig;
use crate::error::{CoreError, CoreResult};
use crate::naming::{
    LogicalIndexName, PhysicalIndexName, ASSET_FOLDER_TAG, ASSET_TAG, OBJECT_FOLDER_TAG,
};
use hubindex_engine::{EngineError, SearchEngine};
use std::sync::Arc;
use tracing::debug;

/// What a logical index name is resolved from.
#[derive(Debug, Clone, Copy)]
pub enum Subject<'a> {
    /// A loaded element.
    Element(&'a Element),
    /// An element kind.
    Kind(&'a ElementKind),
    /// A raw type tag, used as is.
    Tag(&'a str),
}

impl<'a> From<&'a Element> for Subject<'a> {
    fn from(element: &'a Element) -> Self {
        Subject::Element(element)
    }
}

impl<'a> From<&'a ElementKind> for Subject<'a> {
    fn from(kind: &'a ElementKind) -> Self {
        Subject::Kind(kind)
    }
}

impl<'a> From<&'a str> for Subject<'a> {
    fn from(tag: &'a str) -> Self {
        Subject::Tag(tag)
    }
}

/// Returns the type tag for an element kind.
///
/// Objects are tagged with their lowercased class name.
pub fn type_tag(kind: &ElementKind) -> CoreResult<String> {
    match kind {
        ElementKind::Asset => Ok(ASSET_TAG.to_string()),
        ElementKind::AssetFolder => Ok(ASSET_FOLDER_TAG.to_string()),
        ElementKind::ObjectFolder => Ok(OBJECT_FOLDER_TAG.to_string()),
        ElementKind::Object { class_name } if class_name.trim().is_empty() => Err(
            CoreError::invalid_input("object element has no class name"),
        ),
        ElementKind::Object { class_name } => Ok(class_name.to_lowercase()),
    }
}

/// Returns the other parity slot of `physical`.
pub fn inactive_sibling(physical: &PhysicalIndexName) -> PhysicalIndexName {
    physical.sibling()
}

/// Resolves names against one index prefix and engine.
pub struct Resolver<E: SearchEngine> {
    prefix: String,
    engine: Arc<E>,
}

impl<E: SearchEngine> Resolver<E> {
    /// Creates a resolver.
    pub fn new(prefix: impl Into<String>, engine: Arc<E>) -> Self {
        Self {
            prefix: prefix.into(),
            engine,
        }
    }

    /// Returns the index prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns the engine.
    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    /// Derives the logical index name of a subject under an endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidInput`] for an object without a class name
    /// or a tag that does not form a valid index name.
    pub fn logical_name<'a>(
        &self,
        subject: impl Into<Subject<'a>>,
        endpoint: &str,
    ) -> CoreResult<LogicalIndexName> {
        let tag = match subject.into() {
            Subject::Element(element) => type_tag(&element.kind)?,
            Subject::Kind(kind) => type_tag(kind)?,
            Subject::Tag(tag) => tag.to_string(),
        };
        LogicalIndexName::new(&self.prefix, endpoint, &tag)
    }

    /// Finds the physical index currently bound to the alias.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::AliasNotFound`] if nothing answers to the alias.
    pub fn physical_name(&self, logical: &LogicalIndexName) -> CoreResult<PhysicalIndexName> {
        self.try_physical_name(logical)?
            .ok_or_else(|| CoreError::alias_not_found(logical.as_str()))
    }

    /// Like [`Resolver::physical_name`], with `None` for an unbound alias.
    pub fn try_physical_name(
        &self,
        logical: &LogicalIndexName,
    ) -> CoreResult<Option<PhysicalIndexName>> {
        let bindings = match self.engine.get_alias(logical.as_str()) {
            Ok(bindings) => bindings,
            Err(EngineError::NotFound { .. }) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let indices = bindings.indices_for(logical.as_str());
        let Some(first) = indices.first() else {
            return Ok(None);
        };
        if indices.len() > 1 {
            debug!(
                logical = %logical,
                bound = indices.len(),
                "alias bound to several indices, using the first"
            );
        }

        let physical = PhysicalIndexName::parse(first)?;
        if physical.logical() != logical {
            return Err(CoreError::invalid_input(format!(
                "alias {} is bound to foreign index {}",
                logical, first
            )));
        }
        Ok(Some(physical))
    }

    /// Lists every logical index an endpoint owns.
    ///
    /// Assets contribute `asset` and `assetfolder`; objects contribute
    /// `objectfolder` and one index per enabled class.
    pub fn endpoint_index_names(
        &self,
        endpoint: &EndpointConfig,
    ) -> CoreResult<Vec<LogicalIndexName>> {
        let mut names = Vec::new();
        if endpoint.asset_indexing {
            names.push(self.logical_name(ASSET_TAG, &endpoint.name)?);
            names.push(self.logical_name(ASSET_FOLDER_TAG, &endpoint.name)?);
        }
        if endpoint.object_indexing {
            names.push(self.logical_name(OBJECT_FOLDER_TAG, &endpoint.name)?);
            for class_name in &endpoint.object_classes {
                let kind = ElementKind::Object {
                    class_name: class_name.clone(),
                };
                names.push(self.logical_name(&kind, &endpoint.name)?);
            }
        }
        names.dedup();
        Ok(names)
    }
}
