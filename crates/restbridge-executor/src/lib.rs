//! # Request execution engine
//!
//! Turns a tool invocation `(tool, args)` into exactly one outbound HTTP
//! transaction: argument binding into path/query/header/cookie/body
//! locations, auth header injection through a pluggable provider, a single
//! retry on 401/403 when the provider asks for it, and sanitisation of
//! error responses before they reach the caller.
//!
//! Safety contract, enforced before anything touches the network:
//!
//! - header values containing CR/LF are rejected (CRLF injection)
//! - system-controlled headers (`Host`, `Content-Length`,
//!   `Transfer-Encoding`, …) can never be set by callers
//! - caller headers colliding with the auth provider's headers reject the
//!   call; `Authorization`/`Cookie` are caller-settable only when no
//!   provider is configured

#![warn(missing_docs)]
#![warn(clippy::all)]

mod auth;
mod error;
mod execute;
mod headers;
mod meta;

pub use auth::{AuthError, AuthProvider, StaticAuthProvider};
pub use error::{ExecutorError, MAX_ERROR_BODY_CHARS, REDACTED_AUTH_BODY, Result};
pub use execute::{DEFAULT_TIMEOUT, ExecutorConfig, MAX_BODY_BYTES, MAX_REDIRECTS, RequestExecutor};
pub use headers::{SYSTEM_HEADERS, is_system_header, validate_caller_header};
pub use meta::MetaTool;
