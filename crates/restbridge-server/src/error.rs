//! Server error types.
//!
//! Protocol-level and lifecycle failures only: tool execution errors never
//! appear here, they ride inside the MCP result envelope with
//! `isError: true`, and per-request protocol errors are built directly as
//! JSON-RPC error replies by the dispatcher.

use thiserror::Error;

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Registry and transport errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A custom tool name is already taken; names are never overwritten.
    #[error("tool {0:?} is already registered")]
    DuplicateTool(String),

    /// Transport setup or I/O failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// Underlying I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
