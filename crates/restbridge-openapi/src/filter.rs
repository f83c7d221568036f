//! Registry filtering.
//!
//! Three modes decide what the registry exposes after synthesis:
//!
//! - `all` — every tool, narrowed by the include filters below
//! - `dynamic` — no synthesised tools; three fixed meta-tools explore and
//!   invoke the catalog instead
//! - `explicit` — only tools named in `include_tools`, everything else
//!   ignored (an empty list yields an empty registry)

use crate::synth::ToolMeta;

/// Registry exposure mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ToolsMode {
    /// Expose every synthesised tool, subject to the include filters.
    #[default]
    All,
    /// Expose only the meta-tools; operations are invoked by endpoint.
    Dynamic,
    /// Expose exactly the tools listed in `include_tools`.
    Explicit,
}

/// Include filters applied after synthesis.
#[derive(Debug, Clone, Default)]
pub struct ToolFilter {
    /// Exposure mode.
    pub mode: ToolsMode,
    /// Tool ids or names. In `all` mode this is the highest-priority filter:
    /// a tool it matches skips the remaining filters. In `explicit` mode it
    /// is the only filter.
    pub include_tools: Vec<String>,
    /// HTTP methods (case-insensitive).
    pub include_operations: Vec<String>,
    /// Path prefixes (leading `/` optional).
    pub include_resources: Vec<String>,
    /// OpenAPI tags.
    pub include_tags: Vec<String>,
}

impl ToolFilter {
    /// Apply the filter to the synthesised tools.
    ///
    /// `Dynamic` mode returns an empty list; the caller keeps the full
    /// catalog for the meta-tools.
    pub fn apply(&self, tools: Vec<ToolMeta>) -> Vec<ToolMeta> {
        match self.mode {
            ToolsMode::Dynamic => Vec::new(),
            ToolsMode::Explicit => tools
                .into_iter()
                .filter(|tool| self.matches_include_tools(tool))
                .collect(),
            ToolsMode::All => tools
                .into_iter()
                .filter(|tool| {
                    if !self.include_tools.is_empty() && self.matches_include_tools(tool) {
                        return true;
                    }
                    self.matches_operations(tool)
                        && self.matches_resources(tool)
                        && self.matches_tags(tool)
                })
                .collect(),
        }
    }

    fn matches_include_tools(&self, tool: &ToolMeta) -> bool {
        self.include_tools
            .iter()
            .any(|t| t.eq_ignore_ascii_case(&tool.id) || t.eq_ignore_ascii_case(&tool.name))
    }

    fn matches_operations(&self, tool: &ToolMeta) -> bool {
        self.include_operations.is_empty()
            || self
                .include_operations
                .iter()
                .any(|m| m.eq_ignore_ascii_case(&tool.http_method))
    }

    fn matches_resources(&self, tool: &ToolMeta) -> bool {
        if self.include_resources.is_empty() {
            return true;
        }
        let path = tool.original_path.trim_start_matches('/');
        self.include_resources
            .iter()
            .any(|r| path.starts_with(r.trim_start_matches('/')))
    }

    fn matches_tags(&self, tool: &ToolMeta) -> bool {
        self.include_tags.is_empty()
            || self
                .include_tags
                .iter()
                .any(|t| tool.tags.iter().any(|tag| tag.eq_ignore_ascii_case(t)))
    }
}
