//! Resource store.
//!
//! Static content behind `resources/list` and `resources/read`, keyed by
//! URI.

use std::collections::HashMap;

use parking_lot::RwLock;

use restbridge_protocol::{ReadResourceResult, Resource, ResourceContents};

/// In-memory resource store.
#[derive(Debug, Default)]
pub struct ResourceStore {
    entries: RwLock<HashMap<String, (Resource, String)>>,
    order: RwLock<Vec<String>>,
}

impl ResourceStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource with its content. Later registrations with the
    /// same URI are ignored.
    pub fn register(&self, resource: Resource, content: impl Into<String>) {
        let mut entries = self.entries.write();
        if entries.contains_key(&resource.uri) {
            return;
        }
        self.order.write().push(resource.uri.clone());
        entries.insert(resource.uri.clone(), (resource, content.into()));
    }

    /// True when nothing is registered; the server then omits the resources
    /// capability.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// All resource definitions, in registration order.
    pub fn list(&self) -> Vec<Resource> {
        let entries = self.entries.read();
        self.order
            .read()
            .iter()
            .filter_map(|uri| entries.get(uri).map(|(resource, _)| resource.clone()))
            .collect()
    }

    /// Read a resource by URI.
    pub fn read(&self, uri: &str) -> Option<ReadResourceResult> {
        let entries = self.entries.read();
        let (resource, content) = entries.get(uri)?;
        Some(ReadResourceResult {
            contents: vec![ResourceContents {
                uri: resource.uri.clone(),
                mime_type: resource.mime_type.clone(),
                text: content.clone(),
            }],
        })
    }
}
