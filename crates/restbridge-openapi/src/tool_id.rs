//! Bidirectional tool identifier codec.
//!
//! Every OpenAPI operation gets one opaque token of the form
//! `METHOD::encoded-path` that survives MCP's name charset while staying
//! decodable back to the exact `(method, path)` pair:
//!
//! - `/` separators become `__`
//! - `{param}` placeholders become `---param`
//! - a single `:` (Google-RPC action suffix, `/thing:activate`) is preserved
//! - `::` inside a path is rejected outright, it collides with the method
//!   separator
//!
//! Case is preserved inside the token; ids are internal and are never used
//! as MCP display names, so the lower-case name law binds the abbreviator,
//! not this codec.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use regex::Regex;

use crate::error::{OpenApiError, Result};

/// Separator between method and encoded path.
pub const METHOD_SEPARATOR: &str = "::";

/// Characters left as-is when a path parameter value is interpolated.
/// Everything else is percent-encoded (strict URL encoding, RFC 3986
/// unreserved set).
const PATH_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Encode `(method, path)` into a single tool id token.
///
/// # Errors
///
/// Rejects an empty or non-alphabetic method, an empty path, and any path
/// containing `::`.
pub fn encode(method: &str, path: &str) -> Result<String> {
    if method.is_empty() || !method.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(OpenApiError::ToolId(format!(
            "method must be alphabetic and non-empty, got {method:?}"
        )));
    }
    if path.contains(METHOD_SEPARATOR) {
        return Err(OpenApiError::ToolId(format!(
            "path {path:?} contains '::', which collides with the method separator"
        )));
    }
    let trimmed = path.trim_start_matches('/');
    if trimmed.is_empty() {
        return Err(OpenApiError::ToolId(format!("path {path:?} has no segments")));
    }

    let encoded: Vec<String> = trimmed.split('/').map(encode_segment).collect();
    Ok(format!(
        "{}{}{}",
        method.to_ascii_uppercase(),
        METHOD_SEPARATOR,
        encoded.join("__")
    ))
}

/// Encode one path segment: parameter placeholders become `---name`, literal
/// runs keep `[A-Za-z0-9_:-]` and map everything else to `-` (runs collapsed,
/// ends trimmed per literal run so structural `---` markers stay intact).
fn encode_segment(segment: &str) -> String {
    fn flush(literal: &mut String, out: &mut String) {
        let sanitized = sanitize(literal);
        out.push_str(sanitized.trim_matches('-'));
        literal.clear();
    }

    let mut out = String::with_capacity(segment.len() + 2);
    let mut literal = String::new();
    let mut chars = segment.chars();

    while let Some(c) = chars.next() {
        if c == '{' {
            flush(&mut literal, &mut out);
            let mut name = String::new();
            for p in chars.by_ref() {
                if p == '}' {
                    break;
                }
                name.push(p);
            }
            out.push_str("---");
            out.push_str(&sanitize(&name));
        } else {
            literal.push(c);
        }
    }
    flush(&mut literal, &mut out);
    out
}

/// Keep `[A-Za-z0-9_:-]`, replace anything else with `-`, collapse runs.
fn sanitize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_dash = false;
    for c in input.chars() {
        if c.is_ascii_alphanumeric() || c == '_' || c == ':' || c == '-' {
            last_dash = c == '-';
            out.push(c);
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    out
}

/// Decode a tool id back into `(method, path)`.
///
/// # Errors
///
/// Fails when the `::` separator is missing or either side is malformed.
pub fn decode(id: &str) -> Result<(String, String)> {
    let (method, rest) = id.split_once(METHOD_SEPARATOR).ok_or_else(|| {
        OpenApiError::ToolId(format!("id {id:?} is missing the '::' separator"))
    })?;
    if method.is_empty() || !method.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(OpenApiError::ToolId(format!(
            "id {id:?} has an invalid method part"
        )));
    }
    if rest.is_empty() {
        return Err(OpenApiError::ToolId(format!("id {id:?} has an empty path part")));
    }

    let mut path = String::with_capacity(rest.len());
    for segment in rest.split("__") {
        path.push('/');
        path.push_str(&decode_segment(segment));
    }
    Ok((method.to_string(), path))
}

/// Decode one segment: `---name` (terminated by `:` or end of segment)
/// becomes `{name}`.
fn decode_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    let mut remaining = segment;
    while let Some(pos) = remaining.find("---") {
        out.push_str(&remaining[..pos]);
        let after = &remaining[pos + 3..];
        let end = after.find(':').unwrap_or(after.len());
        out.push('{');
        out.push_str(&after[..end]);
        out.push('}');
        remaining = &after[end..];
    }
    out.push_str(remaining);
    out
}

/// Substitute a path parameter value into a path template.
///
/// Handles all three spellings a template can carry: `{param}`, Express-style
/// `:param` (only when followed by `/` or end of string), and the encoded
/// `---param` form (only when followed by `__`, `/`, `:`, or end). The
/// boundary after `---param` notably includes `:` so that
/// `/x/---id:act` with `id=5` yields `/x/5:act`.
///
/// The value is percent-encoded before substitution.
pub fn interpolate(template: &str, param: &str, value: &str) -> String {
    let escaped = regex::escape(param);
    // The regex crate has no lookahead; capture the boundary and re-emit it.
    let pattern = format!(r"\{{{escaped}\}}|:{escaped}(/|$)|---{escaped}(__|/|:|$)");
    let re = match Regex::new(&pattern) {
        Ok(re) => re,
        Err(_) => return template.to_string(),
    };
    let encoded = utf8_percent_encode(value, PATH_VALUE).to_string();
    re.replace_all(template, |caps: &regex::Captures<'_>| {
        let boundary = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str())
            .unwrap_or("");
        format!("{encoded}{boundary}")
    })
    .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_plain_paths() {
        assert_eq!(encode("get", "/users").unwrap(), "GET::users");
        assert_eq!(encode("POST", "/a/b/c").unwrap(), "POST::a__b__c");
    }

    #[test]
    fn encodes_path_parameters() {
        assert_eq!(
            encode("GET", "/users/{id}/posts").unwrap(),
            "GET::users__---id__posts"
        );
    }

    #[test]
    fn preserves_rpc_colon_suffix() {
        // Google-RPC style action suffix survives encoding.
        assert_eq!(
            encode("POST", "/api/widgets/{widgetId}:activate").unwrap(),
            "POST::api__widgets__---widgetId:activate"
        );
    }

    #[test]
    fn rejects_double_colon_in_path() {
        assert!(encode("POST", "/api/x::y").is_err());
    }

    #[test]
    fn rejects_empty_method() {
        assert!(encode("", "/users").is_err());
        assert!(encode("G3T", "/users").is_err());
    }

    #[test]
    fn decode_inverts_encode() {
        for (method, path) in [
            ("GET", "/users"),
            ("POST", "/a/b/c"),
            ("GET", "/users/{id}/posts"),
            ("POST", "/api/widgets/{widgetId}:activate"),
            ("DELETE", "/pet/{petId}"),
            ("PUT", "/orgs/{org_name}/repos/{repo-id}"),
        ] {
            let id = encode(method, path).unwrap();
            assert_eq!(decode(&id).unwrap(), (method.to_string(), path.to_string()));
        }
    }

    #[test]
    fn decode_rejects_malformed_ids() {
        assert!(decode("no-separator").is_err());
        assert!(decode("::users").is_err());
        assert!(decode("get::users").is_err());
        assert!(decode("GET::").is_err());
    }

    #[test]
    fn sanitizes_exotic_characters() {
        let id = encode("GET", "/caf\u{e9} menu/items").unwrap();
        assert_eq!(id, "GET::caf-menu__items");
    }

    #[test]
    fn interpolates_braced_form() {
        assert_eq!(interpolate("/users/{id}", "id", "42"), "/users/42");
    }

    #[test]
    fn interpolates_colon_boundary() {
        // The boundary after ---param includes ':' so the action suffix is
        // kept, not glued onto the value.
        assert_eq!(interpolate("/x/---id:act", "id", "5"), "/x/5:act");
        assert_eq!(
            interpolate("/api/widgets/{widgetId}:activate", "widgetId", "12345"),
            "/api/widgets/12345:activate"
        );
    }

    #[test]
    fn interpolates_express_form() {
        assert_eq!(interpolate("/users/:id/posts", "id", "9"), "/users/9/posts");
        assert_eq!(interpolate("/users/:id", "id", "9"), "/users/9");
        // :idx is a different parameter; no substitution.
        assert_eq!(interpolate("/users/:idx", "id", "9"), "/users/:idx");
    }

    #[test]
    fn interpolates_encoded_form_boundaries() {
        assert_eq!(interpolate("users__---id__posts", "id", "7"), "users__7__posts");
        assert_eq!(interpolate("users__---id", "id", "7"), "users__7");
        // ---idx is a different parameter.
        assert_eq!(interpolate("users__---idx", "id", "7"), "users__---idx");
    }

    #[test]
    fn url_encodes_values() {
        assert_eq!(
            interpolate("/files/{name}", "name", "a b/c"),
            "/files/a%20b%2Fc"
        );
    }
}
