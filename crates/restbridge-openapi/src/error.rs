//! Error types for spec loading and tool synthesis.
//!
//! All of these are startup-fatal: a spec that cannot be loaded, shaped into
//! tools, or encoded into stable identifiers terminates the process before
//! any transport accepts traffic.

use thiserror::Error;

/// Result type for OpenAPI operations.
pub type Result<T> = std::result::Result<T, OpenApiError>;

/// Errors raised while loading a spec or synthesising tools from it.
#[derive(Debug, Error)]
pub enum OpenApiError {
    /// Failed to fetch the spec over HTTP.
    #[error("failed to fetch OpenAPI spec: {0}")]
    Fetch(#[from] reqwest::Error),

    /// Failed to read the spec from file or stdin.
    #[error("failed to read OpenAPI spec: {0}")]
    Io(#[from] std::io::Error),

    /// The document parsed as neither JSON nor restricted YAML.
    #[error("failed to parse OpenAPI spec: {0}")]
    SpecLoad(String),

    /// The YAML used a construct the restricted schema forbids.
    #[error("unsafe YAML construct rejected: {0}")]
    UnsafeYaml(String),

    /// The document parsed but is not a usable OpenAPI shape.
    #[error("malformed OpenAPI document: {0}")]
    SpecShape(String),

    /// A tool identifier could not be encoded or decoded.
    #[error("invalid tool identifier: {0}")]
    ToolId(String),

    /// A display name violates the MCP constraints and abbreviation is off.
    #[error("tool name violates MCP constraints: {0}")]
    InvalidName(String),
}
