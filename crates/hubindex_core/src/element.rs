//! Content elements and the store they are read from.
//!
//! Elements come in two families, assets and objects, each forming a tree
//! through parent links. Folders are elements too and live in the same
//! family table as their children.

use crate::error::{CoreError, CoreResult};
use hubindex_engine::Mapping;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Element identifier, unique within its family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(pub u64);

impl ElementId {
    /// Returns the raw id.
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Element family: which table an element lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    /// Assets and asset folders.
    Asset,
    /// Structured objects and object folders.
    Object,
}

impl ElementType {
    /// Both families, in rebuild order.
    pub const ALL: [ElementType; 2] = [ElementType::Asset, ElementType::Object];

    /// Returns the lowercase family name.
    pub fn as_str(self) -> &'static str {
        match self {
            ElementType::Asset => "asset",
            ElementType::Object => "object",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Closed set of element kinds the resolver dispatches on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ElementKind {
    /// A file asset.
    Asset,
    /// A folder in the asset tree.
    AssetFolder,
    /// A structured object of a data class.
    Object {
        /// Data class name as configured (case preserved).
        class_name: String,
    },
    /// A folder in the object tree.
    ObjectFolder,
}

impl ElementKind {
    /// Returns the family this kind belongs to.
    pub fn element_type(&self) -> ElementType {
        match self {
            ElementKind::Asset | ElementKind::AssetFolder => ElementType::Asset,
            ElementKind::Object { .. } | ElementKind::ObjectFolder => ElementType::Object,
        }
    }

    /// Returns true for asset and object folders.
    pub fn is_folder(&self) -> bool {
        matches!(self, ElementKind::AssetFolder | ElementKind::ObjectFolder)
    }
}

/// An asset, object or folder as read from the element store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    /// Element id.
    pub id: ElementId,
    /// Element kind.
    #[serde(flatten)]
    pub kind: ElementKind,
    /// Parent folder (or parent object), `None` for the root.
    #[serde(default)]
    pub parent_id: Option<ElementId>,
    /// Element key (file or object name).
    #[serde(default)]
    pub key: String,
    /// Full path of the parent folder, ending in `/`.
    #[serde(default)]
    pub path: String,
    /// Last modification time, seconds since the epoch.
    #[serde(default)]
    pub modified_at: Option<i64>,
    /// Extracted content fields.
    #[serde(default)]
    pub data: Mapping,
}

impl Element {
    /// Creates an element of the given kind.
    pub fn new(id: u64, kind: ElementKind, parent_id: Option<u64>) -> Self {
        Self {
            id: ElementId(id),
            kind,
            parent_id: parent_id.map(ElementId),
            key: String::new(),
            path: String::new(),
            modified_at: None,
            data: Mapping::new(),
        }
    }

    /// Creates an asset.
    pub fn asset(id: u64, parent_id: u64) -> Self {
        Self::new(id, ElementKind::Asset, Some(parent_id))
    }

    /// Creates an asset folder.
    pub fn asset_folder(id: u64, parent_id: Option<u64>) -> Self {
        Self::new(id, ElementKind::AssetFolder, parent_id)
    }

    /// Creates a structured object.
    pub fn object(id: u64, class_name: impl Into<String>, parent_id: u64) -> Self {
        Self::new(
            id,
            ElementKind::Object {
                class_name: class_name.into(),
            },
            Some(parent_id),
        )
    }

    /// Creates an object folder.
    pub fn object_folder(id: u64, parent_id: Option<u64>) -> Self {
        Self::new(id, ElementKind::ObjectFolder, parent_id)
    }

    /// Sets the key.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Sets the parent path.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Adds a content field.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(name.into(), value);
        self
    }

    /// Returns the element family.
    pub fn element_type(&self) -> ElementType {
        self.kind.element_type()
    }

    /// Returns the full path of the element itself.
    pub fn full_path(&self) -> String {
        format!("{}{}", self.path, self.key)
    }
}

/// Read access to the source-of-truth element store.
///
/// # Invariants
///
/// - `page_ids` orders by id ascending, so a page window is stable while
///   later ids are inserted or deleted
/// - `load` returns `Ok(None)` for ids that no longer exist
pub trait ElementStore: Send + Sync {
    /// Counts the elements of a family.
    fn count(&self, element_type: ElementType) -> CoreResult<u64>;

    /// Returns up to `limit` ids starting at row `offset`, ascending.
    fn page_ids(&self, element_type: ElementType, offset: u64, limit: u64)
        -> CoreResult<Vec<ElementId>>;

    /// Loads one element.
    fn load(&self, element_type: ElementType, id: ElementId) -> CoreResult<Option<Element>>;
}

impl<S: ElementStore + ?Sized> ElementStore for Arc<S> {
    fn count(&self, element_type: ElementType) -> CoreResult<u64> {
        (**self).count(element_type)
    }

    fn page_ids(
        &self,
        element_type: ElementType,
        offset: u64,
        limit: u64,
    ) -> CoreResult<Vec<ElementId>> {
        (**self).page_ids(element_type, offset, limit)
    }

    fn load(&self, element_type: ElementType, id: ElementId) -> CoreResult<Option<Element>> {
        (**self).load(element_type, id)
    }
}

/// An in-memory element store.
///
/// Suitable for tests, and for rebuilding from an exported snapshot.
#[derive(Debug, Default)]
pub struct MemoryElementStore {
    families: RwLock<BTreeMap<ElementType, BTreeMap<ElementId, Element>>>,
    failing: RwLock<HashSet<ElementType>>,
}

impl MemoryElementStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding the given elements.
    pub fn from_elements(elements: impl IntoIterator<Item = Element>) -> Self {
        let store = Self::new();
        for element in elements {
            store.insert(element);
        }
        store
    }

    /// Inserts or replaces an element.
    pub fn insert(&self, element: Element) {
        self.families
            .write()
            .entry(element.element_type())
            .or_default()
            .insert(element.id, element);
    }

    /// Removes an element, returning it.
    pub fn remove(&self, element_type: ElementType, id: ElementId) -> Option<Element> {
        self.families
            .write()
            .get_mut(&element_type)
            .and_then(|family| family.remove(&id))
    }

    /// Number of elements across both families.
    pub fn len(&self) -> usize {
        self.families.read().values().map(BTreeMap::len).sum()
    }

    /// Returns true if the store holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Makes count and page queries for a family fail.
    pub fn fail_queries(&self, element_type: ElementType) {
        self.failing.write().insert(element_type);
    }

    fn check(&self, element_type: ElementType) -> CoreResult<()> {
        if self.failing.read().contains(&element_type) {
            return Err(CoreError::store(format!(
                "query on {}s failed",
                element_type
            )));
        }
        Ok(())
    }
}

impl ElementStore for MemoryElementStore {
    fn count(&self, element_type: ElementType) -> CoreResult<u64> {
        self.check(element_type)?;
        Ok(self
            .families
            .read()
            .get(&element_type)
            .map(|family| family.len() as u64)
            .unwrap_or(0))
    }

    fn page_ids(
        &self,
        element_type: ElementType,
        offset: u64,
        limit: u64,
    ) -> CoreResult<Vec<ElementId>> {
        self.check(element_type)?;
        let families = self.families.read();
        let Some(family) = families.get(&element_type) else {
            return Ok(Vec::new());
        };
        Ok(family
            .keys()
            .skip(offset as usize)
            .take(limit as usize)
            .copied()
            .collect())
    }

    fn load(&self, element_type: ElementType, id: ElementId) -> CoreResult<Option<Element>> {
        Ok(self
            .families
            .read()
            .get(&element_type)
            .and_then(|family| family.get(&id))
            .cloned())
    }
}

/// Iterator over the folder chain above an element, nearest first.
///
/// Parents are weak back-references resolved through the store. The walk
/// stops at the root folder, at the first parent that is not a folder or is
/// missing, at an id it has already produced, and after a store error.
pub struct Ancestors<'a, S: ElementStore + ?Sized> {
    store: &'a S,
    element_type: ElementType,
    next: Option<ElementId>,
    root: ElementId,
    visited: HashSet<ElementId>,
}

impl<'a, S: ElementStore + ?Sized> Ancestors<'a, S> {
    /// Starts a walk at the parent of `element`.
    pub fn new(store: &'a S, element: &Element, root: ElementId) -> Self {
        let mut visited = HashSet::new();
        visited.insert(element.id);
        Self {
            store,
            element_type: element.element_type(),
            next: element.parent_id,
            root,
            visited,
        }
    }
}

impl<S: ElementStore + ?Sized> Iterator for Ancestors<'_, S> {
    type Item = CoreResult<Element>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next.take()?;
        if id == self.root || !self.visited.insert(id) {
            return None;
        }

        match self.store.load(self.element_type, id) {
            Ok(Some(parent)) if parent.kind.is_folder() => {
                self.next = parent.parent_id;
                Some(Ok(parent))
            }
            Ok(_) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree() -> MemoryElementStore {
        MemoryElementStore::from_elements([
            Element::asset_folder(1, None),
            Element::asset_folder(2, Some(1)).with_key("media"),
            Element::asset_folder(3, Some(2)).with_key("logos"),
            Element::asset(10, 3).with_key("logo.png"),
            Element::object_folder(1, None),
            Element::object(20, "Car", 1),
            Element::object(21, "Car", 20),
        ])
    }

    #[test]
    fn kinds_map_to_families() {
        assert_eq!(ElementKind::AssetFolder.element_type(), ElementType::Asset);
        assert_eq!(
            ElementKind::Object {
                class_name: "Car".into()
            }
            .element_type(),
            ElementType::Object
        );
        assert!(ElementKind::ObjectFolder.is_folder());
        assert!(!ElementKind::Asset.is_folder());
    }

    #[test]
    fn store_pages_ascending() {
        let store = MemoryElementStore::from_elements((1..=7).rev().map(|id| Element::asset(id, 1)));
        assert_eq!(store.count(ElementType::Asset).unwrap(), 7);
        assert_eq!(
            store.page_ids(ElementType::Asset, 0, 3).unwrap(),
            vec![ElementId(1), ElementId(2), ElementId(3)]
        );
        assert_eq!(
            store.page_ids(ElementType::Asset, 6, 3).unwrap(),
            vec![ElementId(7)]
        );
        assert!(store.page_ids(ElementType::Object, 0, 3).unwrap().is_empty());
    }

    #[test]
    fn failing_queries() {
        let store = tree();
        store.fail_queries(ElementType::Object);
        assert!(store.count(ElementType::Asset).is_ok());
        assert!(matches!(
            store.count(ElementType::Object),
            Err(CoreError::Store { .. })
        ));
    }

    #[test]
    fn ancestors_stop_at_root() {
        let store = tree();
        let logo = store.load(ElementType::Asset, ElementId(10)).unwrap().unwrap();
        let chain: Vec<ElementId> = Ancestors::new(&store, &logo, ElementId(1))
            .map(|parent| parent.unwrap().id)
            .collect();
        assert_eq!(chain, vec![ElementId(3), ElementId(2)]);
    }

    #[test]
    fn ancestors_stop_at_non_folder_parent() {
        let store = tree();
        let variant = store.load(ElementType::Object, ElementId(21)).unwrap().unwrap();
        assert_eq!(Ancestors::new(&store, &variant, ElementId(1)).count(), 0);
    }

    #[test]
    fn ancestors_survive_cycles() {
        let store = MemoryElementStore::from_elements([
            Element::asset_folder(5, Some(6)),
            Element::asset_folder(6, Some(5)),
            Element::asset(7, 5),
        ]);
        let asset = store.load(ElementType::Asset, ElementId(7)).unwrap().unwrap();
        let chain: Vec<ElementId> = Ancestors::new(&store, &asset, ElementId(1))
            .map(|parent| parent.unwrap().id)
            .collect();
        assert_eq!(chain, vec![ElementId(5), ElementId(6)]);
    }

    #[test]
    fn element_serde_shape() {
        let element: Element = serde_json::from_value(json!({
            "id": 20,
            "kind": "object",
            "class_name": "Car",
            "parent_id": 1,
            "key": "beetle",
            "data": { "color": "red" }
        }))
        .unwrap();

        assert_eq!(
            element.kind,
            ElementKind::Object {
                class_name: "Car".into()
            }
        );
        assert_eq!(element.parent_id, Some(ElementId(1)));
        assert_eq!(element.data["color"], json!("red"));
    }
}
