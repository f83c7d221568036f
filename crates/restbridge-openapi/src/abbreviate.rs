//! Display-name abbreviation.
//!
//! MCP tool names must match `^[a-z0-9_-]+$` and stay within 64 characters.
//! OpenAPI `operationId`s routinely blow past that
//! (`EnterpriseUserManagementControllerServiceUpdateConfiguration…`), so the
//! synthesiser derives a shortened, collision-resistant display name. The
//! stages are applied in order and stop as soon as the result fits; the last
//! resort is a deterministic digest suffix so identical inputs always yield
//! identical names.

use sha2::{Digest, Sha256};

use crate::error::{OpenApiError, Result};

/// MCP name length limit.
pub const MAX_NAME_LENGTH: usize = 64;

/// Truncation point leaving room for `-` plus four digest chars.
const TRUNCATE_AT: usize = 59;

/// Tokens carrying no meaning, dropped before abbreviating.
const FILLER_TOKENS: &[&str] = &[
    "controller", "api", "service", "method", "the", "and", "for", "with",
];

/// Fixed abbreviation dictionary.
const ABBREVIATIONS: &[(&str, &str)] = &[
    ("management", "mgmt"),
    ("user", "usr"),
    ("service", "svc"),
    ("resource", "resrc"),
    ("update", "upd"),
    ("configuration", "config"),
    ("authority", "auth"),
    ("list", "lst"),
    ("description", "desc"),
    ("information", "info"),
    ("organization", "org"),
    ("administration", "admin"),
    ("delete", "del"),
];

/// Name abbreviator with an on/off switch.
///
/// With abbreviation disabled only sanitisation and final normalisation run,
/// and a name that still violates the constraints is an error instead of
/// being shortened.
#[derive(Debug, Clone, Copy)]
pub struct Abbreviator {
    enabled: bool,
}

impl Default for Abbreviator {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Abbreviator {
    /// Abbreviating abbreviator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sanitise-only abbreviator (`--disable-abbreviation`).
    pub fn disabled() -> Self {
        Self { enabled: false }
    }

    /// Derive a display name from an operationId (or the synthesised
    /// `METHOD-path` fallback).
    ///
    /// # Errors
    ///
    /// With abbreviation disabled, returns an error when the sanitised name
    /// is empty or exceeds [`MAX_NAME_LENGTH`].
    pub fn abbreviate(&self, original: &str) -> Result<String> {
        let tokens = tokenize(original);

        if !self.enabled {
            let name = normalize(&tokens.join("-"));
            if name.is_empty() {
                return Err(OpenApiError::InvalidName(format!(
                    "operationId {original:?} sanitises to an empty name and abbreviation is disabled"
                )));
            }
            if name.len() > MAX_NAME_LENGTH {
                return Err(OpenApiError::InvalidName(format!(
                    "name {name:?} is {} chars (limit {MAX_NAME_LENGTH}) and abbreviation is disabled",
                    name.len()
                )));
            }
            return Ok(name);
        }

        let assembled = normalize(&tokens.join("-"));
        if fits_nonempty(&assembled) {
            return Ok(assembled);
        }

        // Drop filler tokens.
        let mut tokens: Vec<String> = tokens
            .into_iter()
            .filter(|t| !FILLER_TOKENS.contains(&t.as_str()))
            .collect();
        let assembled = normalize(&tokens.join("-"));
        if fits_nonempty(&assembled) {
            return Ok(assembled);
        }

        // Apply the dictionary.
        for token in &mut tokens {
            if let Some((_, short)) = ABBREVIATIONS.iter().find(|(long, _)| long == token) {
                *token = (*short).to_string();
            }
        }
        let assembled = normalize(&tokens.join("-"));
        if fits_nonempty(&assembled) {
            return Ok(assembled);
        }

        // Strip interior vowels from longer tokens.
        for token in &mut tokens {
            if token.len() > 4 {
                *token = strip_interior_vowels(token);
            }
        }
        let assembled = normalize(&tokens.join("-"));
        if assembled.is_empty() {
            // Everything was filler; fall back to a digest-only name.
            return Ok(format!("tool-{}", digest_hex(original, 8)));
        }
        if assembled.len() <= MAX_NAME_LENGTH {
            return Ok(assembled);
        }

        // Still too long: truncate and pin with a stability digest.
        let truncated: String = assembled.chars().take(TRUNCATE_AT).collect();
        Ok(normalize(&format!(
            "{truncated}-{}",
            digest_hex(original, 4)
        )))
    }
}

fn fits_nonempty(name: &str) -> bool {
    !name.is_empty() && name.len() <= MAX_NAME_LENGTH
}

/// Split on camel-case boundaries, digit boundaries, and separators;
/// lower-case everything.
fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut prev: Option<char> = None;

    for c in input.chars() {
        let boundary = match prev {
            None => false,
            Some(p) => {
                (p.is_lowercase() && c.is_uppercase())
                    || (p.is_ascii_digit() != c.is_ascii_digit()
                        && (p.is_ascii_alphanumeric() && c.is_ascii_alphanumeric()))
            }
        };
        if boundary && !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
        if c.is_ascii_alphanumeric() {
            current.extend(c.to_lowercase());
        } else if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
        prev = Some(c);
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Drop vowels except the first and last character of the token.
fn strip_interior_vowels(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    let last = chars.len() - 1;
    chars
        .iter()
        .enumerate()
        .filter(|(i, c)| *i == 0 || *i == last || !matches!(c, 'a' | 'e' | 'i' | 'o' | 'u'))
        .map(|(_, c)| *c)
        .collect()
}

/// Collapse hyphen runs and trim hyphens from both ends.
fn normalize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_dash = false;
    for c in name.chars() {
        if c == '-' {
            if !last_dash && !out.is_empty() {
                out.push('-');
            }
            last_dash = true;
        } else {
            out.push(c);
            last_dash = false;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// First `n` lower-hex chars of `Sha256(input)`.
fn digest_hex(input: &str, n: usize) -> String {
    let digest = Sha256::digest(input.as_bytes());
    digest
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<String>()
        .chars()
        .take(n)
        .collect()
}
