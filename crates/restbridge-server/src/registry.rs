//! Tool registry.
//!
//! Three kinds of tool live behind one lookup: OpenAPI-synthesised tools,
//! the dynamic-mode meta-tools, and custom tools registered by the host
//! application. Lookup is case-insensitive over both display names and tool
//! ids, with OpenAPI tools taking precedence on collision.
//!
//! The synthesised side is immutable once built; only the custom map takes
//! guarded writes, and a name is never overwritten.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use restbridge_executor::MetaTool;
use restbridge_openapi::{Catalog, ToolFilter, ToolMeta, ToolsMode};
use restbridge_protocol::{Tool, ToolInputSchema};

use crate::error::{Result, ServerError};

/// Boxed future returned by custom tool handlers.
pub type CustomToolFuture = Pin<Box<dyn Future<Output = std::result::Result<Value, String>> + Send>>;

/// Handler function backing a custom tool.
pub type CustomToolHandler = Arc<dyn Fn(Value) -> CustomToolFuture + Send + Sync>;

/// A tool registered by the host application rather than synthesised from
/// the spec.
#[derive(Clone)]
pub struct CustomTool {
    /// Display name.
    pub name: String,
    /// Description shown to clients.
    pub description: Option<String>,
    /// Argument schema.
    pub input_schema: ToolInputSchema,
    /// Async handler invoked on `tools/call`.
    pub handler: CustomToolHandler,
}

impl std::fmt::Debug for CustomTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomTool")
            .field("name", &self.name)
            .finish()
    }
}

impl CustomTool {
    /// Project into the MCP wire shape.
    pub fn to_tool(&self) -> Tool {
        Tool {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema.clone(),
            meta: None,
        }
    }
}

/// What a lookup resolved to; the dispatcher branches once on this.
#[derive(Clone)]
pub enum ToolEntry {
    /// A synthesised OpenAPI operation.
    OpenApi(Arc<ToolMeta>),
    /// One of the dynamic-mode meta-tools.
    Meta(MetaTool),
    /// A custom tool.
    Custom(CustomTool),
}

/// The registry, built once at startup before any transport accepts
/// traffic.
pub struct ToolRegistry {
    mode: ToolsMode,
    /// Full synthesised catalog; the meta-tools browse this even though the
    /// registry exposes none of it in dynamic mode.
    catalog: Arc<Catalog>,
    /// Exposed tools after filtering.
    exposed: Vec<Arc<ToolMeta>>,
    /// Lower-cased name and id → index into `exposed`.
    index: HashMap<String, usize>,
    /// Custom tools in registration order.
    custom: RwLock<Vec<CustomTool>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("mode", &self.mode)
            .field("exposed", &self.exposed.len())
            .field("custom", &self.custom.read().len())
            .finish()
    }
}

impl ToolRegistry {
    /// Build the registry from a synthesised catalog and filter settings.
    pub fn new(catalog: Catalog, filter: &ToolFilter) -> Self {
        let exposed: Vec<Arc<ToolMeta>> = filter
            .apply(catalog.tools.clone())
            .into_iter()
            .map(Arc::new)
            .collect();

        let mut index = HashMap::with_capacity(exposed.len() * 2);
        for (position, tool) in exposed.iter().enumerate() {
            index.insert(tool.name.to_lowercase(), position);
            index.entry(tool.id.to_lowercase()).or_insert(position);
        }

        Self {
            mode: filter.mode,
            catalog: Arc::new(catalog),
            exposed,
            index,
            custom: RwLock::new(Vec::new()),
        }
    }

    /// The exposure mode the registry was built with.
    pub fn mode(&self) -> ToolsMode {
        self.mode
    }

    /// The full synthesised catalog (unfiltered).
    pub fn catalog(&self) -> Arc<Catalog> {
        Arc::clone(&self.catalog)
    }

    /// Register a custom tool. Names are never overwritten; re-registration
    /// is an error.
    pub fn register_custom(&self, tool: CustomTool) -> Result<()> {
        if self.lookup(&tool.name).is_some() {
            return Err(ServerError::DuplicateTool(tool.name.clone()));
        }
        self.custom.write().push(tool);
        Ok(())
    }

    /// All visible tool definitions: synthesised (or meta-tools in dynamic
    /// mode) followed by custom tools.
    pub fn list_tools(&self) -> Vec<Tool> {
        let mut tools: Vec<Tool> = match self.mode {
            ToolsMode::Dynamic => MetaTool::ALL.iter().map(MetaTool::definition).collect(),
            _ => self.exposed.iter().map(|tool| tool.to_tool()).collect(),
        };
        tools.extend(self.custom.read().iter().map(CustomTool::to_tool));
        tools
    }

    /// Resolve a selector (display name or tool id, case-insensitive).
    /// OpenAPI tools win, then meta-tools, then custom tools.
    pub fn lookup(&self, selector: &str) -> Option<ToolEntry> {
        let key = selector.to_lowercase();
        if self.mode != ToolsMode::Dynamic
            && let Some(&position) = self.index.get(&key)
        {
            return Some(ToolEntry::OpenApi(Arc::clone(&self.exposed[position])));
        }
        if self.mode == ToolsMode::Dynamic
            && let Some(meta) = MetaTool::from_name(selector)
        {
            return Some(ToolEntry::Meta(meta));
        }
        self.custom
            .read()
            .iter()
            .find(|tool| tool.name.eq_ignore_ascii_case(selector))
            .map(|tool| ToolEntry::Custom(tool.clone()))
    }
}
