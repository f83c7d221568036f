//! Executor error kinds.
//!
//! Everything here surfaces inside the MCP result envelope (`isError: true`
//! with the `Display` text), never as a JSON-RPC transport error. The
//! `Upstream` variant stores an already-sanitised body: 401/403 bodies are
//! redacted at construction, everything else truncated, so no raw upstream
//! error can leak past this type.

use thiserror::Error;

/// Result type for executor operations.
pub type Result<T> = std::result::Result<T, ExecutorError>;

/// Fixed replacement for 401/403 response bodies.
pub const REDACTED_AUTH_BODY: &str = "[Authentication/Authorization error — details redacted]";

/// Longest upstream error body surfaced to callers, in characters.
pub const MAX_ERROR_BODY_CHARS: usize = 1000;

/// Errors raised while executing a tool invocation.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// A required parameter was not supplied.
    #[error("missing required parameter: {0}")]
    MissingParameter(String),

    /// Arguments were not a JSON object.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// A header value contained CR or LF.
    #[error("header injection rejected: {0}")]
    HeaderInjection(String),

    /// A caller tried to set a system-controlled header.
    #[error("system-controlled header rejected: {0}")]
    SystemHeaderConflict(String),

    /// A caller header collides with the auth provider.
    #[error("auth header conflict: {0}")]
    AuthHeaderConflict(String),

    /// The auth provider failed; its error is surfaced verbatim.
    #[error("{0}")]
    Auth(String),

    /// The request body exceeds the outbound limit.
    #[error("request body of {0} bytes exceeds the {1} byte limit")]
    RequestTooLarge(usize, usize),

    /// The response body exceeds the inbound limit.
    #[error("response body exceeds the {0} byte limit")]
    ResponseTooLarge(usize),

    /// The upstream API answered with an error status. The stored body is
    /// already sanitised.
    #[error("API request failed with status {status}: {body}")]
    Upstream {
        /// HTTP status code.
        status: u16,
        /// Sanitised response body.
        body: String,
    },

    /// The outbound call timed out.
    #[error("request timed out")]
    Timeout,

    /// The outbound call failed before a response arrived.
    #[error("network error: {0}")]
    Network(String),

    /// The inbound MCP request was cancelled.
    #[error("request cancelled")]
    Cancelled,

    /// No operation matches the requested endpoint (dynamic mode).
    #[error("unknown endpoint: {0}")]
    EndpointNotFound(String),

    /// The target URL could not be built.
    #[error("invalid request URL: {0}")]
    Url(String),

    /// The tool id could not be decoded.
    #[error("invalid tool identifier: {0}")]
    ToolId(String),
}

impl ExecutorError {
    /// Build an `Upstream` error, sanitising the body: 401/403 responses are
    /// redacted outright, anything else is truncated to
    /// [`MAX_ERROR_BODY_CHARS`].
    pub fn upstream(status: u16, body: &str) -> Self {
        let body = if status == 401 || status == 403 {
            REDACTED_AUTH_BODY.to_string()
        } else if body.chars().count() > MAX_ERROR_BODY_CHARS {
            let mut truncated: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
            truncated.push_str("… [truncated]");
            truncated
        } else {
            body.to_string()
        };
        Self::Upstream { status, body }
    }
}
