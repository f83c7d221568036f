//! Pluggable authentication.
//!
//! The executor only knows two things about authentication: where to get
//! request headers, and whether a 401/403 is worth one retry. Token caching,
//! refresh flows and the like belong inside implementations of this trait,
//! not in the executor.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;

/// Error from an auth provider, surfaced to callers verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthError(pub String);

impl AuthError {
    /// Build a provider error.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for AuthError {}

/// Supplies authentication headers for outbound calls.
///
/// `auth_headers` is called before *every* outbound request (including the
/// retry), so implementations backed by expiring tokens always get a chance
/// to hand out a fresh one.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Headers to merge into the outbound request.
    async fn auth_headers(&self) -> Result<HashMap<String, String>, AuthError>;

    /// Called once when the upstream answers 401 or 403. Returning `true`
    /// asks the executor to refetch headers and retry exactly once.
    async fn handle_auth_error(&self, status: u16) -> Result<bool, AuthError>;
}

/// The trivial provider: a fixed header map, no retries.
#[derive(Debug, Clone, Default)]
pub struct StaticAuthProvider {
    headers: HashMap<String, String>,
}

impl StaticAuthProvider {
    /// Build from a header map.
    pub fn new(headers: HashMap<String, String>) -> Self {
        Self { headers }
    }

    /// True when no headers are configured.
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

#[async_trait]
impl AuthProvider for StaticAuthProvider {
    async fn auth_headers(&self) -> Result<HashMap<String, String>, AuthError> {
        Ok(self.headers.clone())
    }

    async fn handle_auth_error(&self, _status: u16) -> Result<bool, AuthError> {
        // Static headers will not get better by retrying.
        Ok(false)
    }
}
