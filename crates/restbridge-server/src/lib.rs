//! # MCP server: registry, dispatcher, transports
//!
//! Ties the synthesised tool catalog and the request executor together
//! behind the MCP wire protocol. The registry resolves tool lookups to one
//! of three variants (OpenAPI, meta, custom); the dispatcher routes the six
//! MCP methods plus `ping`; the transports frame JSON-RPC over stdio or
//! streamable HTTP with SSE fan-out and `Mcp-Session-Id` sessions.
//!
//! Everything is built before a transport accepts traffic, so no request
//! ever observes a partially loaded registry.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod dispatch;
mod error;
mod prompts;
mod registry;
mod resources;
mod session;
pub mod transport;

pub use dispatch::Dispatcher;
pub use error::{Result, ServerError};
pub use prompts::PromptStore;
pub use registry::{CustomTool, CustomToolFuture, CustomToolHandler, ToolEntry, ToolRegistry};
pub use resources::ResourceStore;
pub use session::{DEFAULT_SESSION_TTL, SessionEvent, SessionManager, generate_session_id};
pub use transport::{HttpConfig, HttpTransport, SESSION_HEADER, serve_stdio, serve_stdio_with_io};
