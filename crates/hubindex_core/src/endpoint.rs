//! Per-endpoint indexing configuration.
//!
//! An endpoint names which element families and object classes are indexed
//! and carries the mapping for each of its logical indices. The core only
//! reads it.

use crate::element::{ElementKind, ElementType};
use hubindex_engine::Mapping;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One workspace rule: a subtree and whether it is readable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceRule {
    /// Subtree path, e.g. `/media`.
    pub path: String,
    /// Whether elements under `path` are exposed.
    #[serde(default)]
    pub read: bool,
}

/// Workspace rules per element family.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspaces {
    /// Asset tree rules.
    #[serde(default)]
    pub asset: Vec<WorkspaceRule>,
    /// Object tree rules.
    #[serde(default)]
    pub object: Vec<WorkspaceRule>,
}

/// Indexing configuration of one named endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Endpoint name, the middle segment of every logical index name.
    pub name: String,
    /// Whether assets and asset folders are indexed.
    #[serde(default)]
    pub asset_indexing: bool,
    /// Whether objects and object folders are indexed.
    #[serde(default)]
    pub object_indexing: bool,
    /// Data classes whose objects are indexed.
    #[serde(default)]
    pub object_classes: BTreeSet<String>,
    /// Workspace rules.
    #[serde(default)]
    pub workspaces: Workspaces,
    /// Mapping per type tag.
    #[serde(default)]
    pub mappings: BTreeMap<String, Mapping>,
}

impl EndpointConfig {
    /// Creates an endpoint with nothing enabled.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            asset_indexing: false,
            object_indexing: false,
            object_classes: BTreeSet::new(),
            workspaces: Workspaces::default(),
            mappings: BTreeMap::new(),
        }
    }

    /// Enables or disables asset indexing.
    #[must_use]
    pub fn with_asset_indexing(mut self, enabled: bool) -> Self {
        self.asset_indexing = enabled;
        self
    }

    /// Enables or disables object indexing.
    #[must_use]
    pub fn with_object_indexing(mut self, enabled: bool) -> Self {
        self.object_indexing = enabled;
        self
    }

    /// Adds an enabled data class.
    #[must_use]
    pub fn with_class(mut self, class_name: impl Into<String>) -> Self {
        self.object_classes.insert(class_name.into());
        self
    }

    /// Sets the mapping for a type tag.
    #[must_use]
    pub fn with_mapping(mut self, tag: impl Into<String>, mapping: Mapping) -> Self {
        self.mappings.insert(tag.into(), mapping);
        self
    }

    /// Adds a workspace rule for a family.
    #[must_use]
    pub fn with_workspace(mut self, element_type: ElementType, rule: WorkspaceRule) -> Self {
        match element_type {
            ElementType::Asset => self.workspaces.asset.push(rule),
            ElementType::Object => self.workspaces.object.push(rule),
        }
        self
    }

    /// Returns true if the family is indexed by this endpoint.
    pub fn is_type_enabled(&self, element_type: ElementType) -> bool {
        match element_type {
            ElementType::Asset => self.asset_indexing,
            ElementType::Object => self.object_indexing,
        }
    }

    /// Returns true if objects of `class_name` are indexed.
    pub fn is_class_enabled(&self, class_name: &str) -> bool {
        self.object_indexing && self.object_classes.contains(class_name)
    }

    /// Returns true if an element of this kind belongs in the endpoint.
    pub fn accepts(&self, kind: &ElementKind) -> bool {
        match kind {
            ElementKind::Object { class_name } => self.is_class_enabled(class_name),
            other => self.is_type_enabled(other.element_type()),
        }
    }

    /// Returns the mapping configured for a type tag, empty if none.
    pub fn mapping_for(&self, tag: &str) -> Mapping {
        self.mappings.get(tag).cloned().unwrap_or_default()
    }

    /// Returns true if the workspace rules differ from `prior`.
    ///
    /// A changed workspace alters which elements the endpoint exposes, so the
    /// endpoint needs a full rebuild.
    pub fn workspace_changed(&self, prior: &EndpointConfig) -> bool {
        self.workspaces.asset != prior.workspaces.asset
            || self.workspaces.object != prior.workspaces.object
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rule(path: &str, read: bool) -> WorkspaceRule {
        WorkspaceRule {
            path: path.into(),
            read,
        }
    }

    #[test]
    fn kinds_follow_flags_and_classes() {
        let endpoint = EndpointConfig::new("catalog")
            .with_asset_indexing(true)
            .with_object_indexing(true)
            .with_class("Car");

        assert!(endpoint.accepts(&ElementKind::Asset));
        assert!(endpoint.accepts(&ElementKind::ObjectFolder));
        assert!(endpoint.accepts(&ElementKind::Object {
            class_name: "Car".into()
        }));
        assert!(!endpoint.accepts(&ElementKind::Object {
            class_name: "Bike".into()
        }));

        let assets_only = EndpointConfig::new("media").with_asset_indexing(true).with_class("Car");
        assert!(!assets_only.accepts(&ElementKind::Object {
            class_name: "Car".into()
        }));
        assert!(!assets_only.is_type_enabled(ElementType::Object));
    }

    #[test]
    fn missing_mapping_is_empty() {
        let endpoint = EndpointConfig::new("catalog").with_mapping(
            "asset",
            json!({"properties": {"key": {"type": "keyword"}}})
                .as_object()
                .cloned()
                .unwrap(),
        );
        assert_eq!(endpoint.mapping_for("asset").len(), 1);
        assert!(endpoint.mapping_for("car").is_empty());
    }

    #[test]
    fn workspace_changes() {
        let prior = EndpointConfig::new("catalog").with_workspace(ElementType::Asset, rule("/", true));
        let same = prior.clone().with_class("Car");
        assert!(!same.workspace_changed(&prior));

        let narrowed = EndpointConfig::new("catalog")
            .with_workspace(ElementType::Asset, rule("/", false));
        assert!(narrowed.workspace_changed(&prior));

        let object_rule = prior.clone().with_workspace(ElementType::Object, rule("/cars", true));
        assert!(object_rule.workspace_changed(&prior));
    }

    #[test]
    fn deserializes_with_defaults() {
        let endpoint: EndpointConfig = serde_json::from_value(json!({
            "name": "catalog",
            "asset_indexing": true,
            "object_classes": ["Car"]
        }))
        .unwrap();
        assert!(endpoint.asset_indexing);
        assert!(!endpoint.object_indexing);
        assert!(endpoint.workspaces.asset.is_empty());
        assert!(endpoint.mappings.is_empty());
    }
}
