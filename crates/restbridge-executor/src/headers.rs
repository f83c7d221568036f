//! Header safety checks.
//!
//! Two attack classes are blocked before any outbound request is built:
//! CRLF injection through header values, and request smuggling / host
//! spoofing through system-controlled headers. The checks run at binding
//! time, so a rejected call never reaches the network.

use crate::error::{ExecutorError, Result};

/// Headers whose values belong to the transport layer. A caller-supplied
/// parameter naming any of these is rejected outright.
pub const SYSTEM_HEADERS: &[&str] = &[
    "host",
    "content-length",
    "transfer-encoding",
    "connection",
    "upgrade",
    "te",
    "trailer",
    "proxy-connection",
    "keep-alive",
];

/// Headers reserved for the auth provider; callers may only supply them when
/// no provider is configured.
const AUTH_HEADERS: &[&str] = &["authorization", "cookie"];

/// Case-insensitive membership in the system-controlled set.
pub fn is_system_header(name: &str) -> bool {
    SYSTEM_HEADERS
        .iter()
        .any(|system| system.eq_ignore_ascii_case(name))
}

/// Validate one caller-supplied header parameter.
pub fn validate_caller_header(name: &str, value: &str, has_auth_provider: bool) -> Result<()> {
    if name.contains(['\r', '\n']) || name.is_empty() {
        return Err(ExecutorError::HeaderInjection(format!(
            "invalid header name {name:?}"
        )));
    }
    if value.contains(['\r', '\n']) {
        return Err(ExecutorError::HeaderInjection(format!(
            "header {name:?} value contains CR/LF"
        )));
    }
    if is_system_header(name) {
        return Err(ExecutorError::SystemHeaderConflict(format!(
            "header {name:?} is system-controlled and cannot be set by callers"
        )));
    }
    if has_auth_provider
        && AUTH_HEADERS
            .iter()
            .any(|auth| auth.eq_ignore_ascii_case(name))
    {
        return Err(ExecutorError::AuthHeaderConflict(format!(
            "header {name:?} is managed by the configured auth provider"
        )));
    }
    Ok(())
}

/// Validate a cookie parameter value (it lands in the `Cookie` header).
pub fn validate_cookie_value(name: &str, value: &str) -> Result<()> {
    if name.contains(['\r', '\n', ';', '=']) || value.contains(['\r', '\n']) {
        return Err(ExecutorError::HeaderInjection(format!(
            "cookie parameter {name:?} contains forbidden characters"
        )));
    }
    Ok(())
}
