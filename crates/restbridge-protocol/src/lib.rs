//! JSON-RPC 2.0 framing and MCP wire types.
//!
//! This crate holds the protocol surface shared by every restbridge
//! transport: the JSON-RPC 2.0 message types with MCP's id semantics, and
//! the MCP-specific request/result shapes (`initialize`, `tools/*`,
//! `prompts/*`, `resources/*`).
//!
//! Nothing in here performs I/O; transports frame these types, the
//! dispatcher consumes them.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod jsonrpc;
pub mod types;

pub use jsonrpc::{
    JSONRPC_VERSION, JsonRpcError, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse, JsonRpcResponsePayload, JsonRpcVersion, ResponseId,
};
pub use types::{
    CallToolRequest, CallToolResult, Content, GetPromptRequest, GetPromptResult, Implementation,
    InitializeRequest, InitializeResult, ListPromptsResult, ListResourcesResult, ListToolsResult,
    Prompt, PromptArgument, PromptMessage, ReadResourceRequest, ReadResourceResult, RequestId,
    Resource, ResourceContents, Role, ServerCapabilities, Tool, ToolInputSchema,
};

/// Protocol version this server speaks by default.
pub const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";

/// Protocol versions the server recognises and will echo back on
/// `initialize`.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2024-11-05", "2025-03-26", "2025-06-18"];
