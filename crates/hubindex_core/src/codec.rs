//! Element to search document serialization.

use crate::element::{Element, ElementKind};
use crate::endpoint::EndpointConfig;
use crate::error::{CoreError, CoreResult};
use hubindex_engine::Document;
use serde_json::{json, Value};

/// Turns an element into the document stored for it.
///
/// The document id must be the element id, so upserts of the same element
/// overwrite each other.
pub trait DocumentCodec: Send + Sync {
    /// Encodes `element` for `endpoint`.
    fn encode(&self, element: &Element, endpoint: &EndpointConfig) -> CoreResult<Document>;
}

impl<C: DocumentCodec + ?Sized> DocumentCodec for std::sync::Arc<C> {
    fn encode(&self, element: &Element, endpoint: &EndpointConfig) -> CoreResult<Document> {
        (**self).encode(element, endpoint)
    }
}

/// Document shape used by the bundled tooling.
///
/// ```json
/// { "system": { "id": 10, "type": "asset", "subtype": "asset", ... }, "data": { ... } }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCodec;

impl DefaultCodec {
    fn subtype(kind: &ElementKind) -> &'static str {
        match kind {
            ElementKind::Asset => "asset",
            ElementKind::AssetFolder | ElementKind::ObjectFolder => "folder",
            ElementKind::Object { .. } => "object",
        }
    }
}

impl DocumentCodec for DefaultCodec {
    fn encode(&self, element: &Element, endpoint: &EndpointConfig) -> CoreResult<Document> {
        if !endpoint.accepts(&element.kind) {
            return Err(CoreError::codec(
                element.id,
                format!("kind not indexed by endpoint {}", endpoint.name),
            ));
        }

        let class_name = match &element.kind {
            ElementKind::Object { class_name } => Value::String(class_name.clone()),
            _ => Value::Null,
        };

        let body = json!({
            "system": {
                "id": element.id.as_u64(),
                "type": element.element_type().as_str(),
                "subtype": Self::subtype(&element.kind),
                "className": class_name,
                "key": element.key,
                "path": element.path,
                "fullPath": element.full_path(),
                "parentId": element.parent_id.map(|id| id.as_u64()),
                "modificationDate": element.modified_at,
            },
            "data": element.data,
        });
        Ok(Document::new(element.id.to_string(), body))
    }
}
