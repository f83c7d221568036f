//! Spec acquisition and parsing.
//!
//! A spec arrives from exactly one of four places: a URL, a file, stdin, or
//! an inline string. Parsing tries JSON first, then YAML under a restricted
//! schema: tagged nodes are rejected and merge keys (`<<`) are refused
//! rather than expanded. `serde_yaml` only applies merge keys through an
//! explicit `apply_merge` call, which is never made here; rejecting the key
//! outright keeps a spec from silently meaning something else.

use std::path::PathBuf;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::error::{OpenApiError, Result};

/// Timeout for fetching a spec over HTTP.
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Where the OpenAPI document comes from.
#[derive(Debug, Clone)]
pub enum SpecSource {
    /// Fetch from an HTTP(S) URL.
    Url(String),
    /// Read from a file path.
    File(PathBuf),
    /// Drain standard input to EOF.
    Stdin,
    /// Use the given string verbatim.
    Inline(String),
}

impl SpecSource {
    /// Load the raw spec text from this source.
    pub async fn read(&self) -> Result<String> {
        match self {
            Self::Url(url) => {
                debug!(url = %url, "fetching OpenAPI spec");
                let client = reqwest::Client::builder()
                    .timeout(FETCH_TIMEOUT)
                    .build()?;
                let response = client.get(url).send().await?;
                if !response.status().is_success() {
                    return Err(OpenApiError::SpecLoad(format!(
                        "HTTP {} fetching OpenAPI spec from {url}",
                        response.status()
                    )));
                }
                Ok(response.text().await?)
            }
            Self::File(path) => {
                debug!(path = %path.display(), "reading OpenAPI spec");
                Ok(tokio::fs::read_to_string(path).await?)
            }
            Self::Stdin => {
                debug!("reading OpenAPI spec from stdin");
                let mut buffer = String::new();
                tokio::io::stdin().read_to_string(&mut buffer).await?;
                Ok(buffer)
            }
            Self::Inline(text) => Ok(text.clone()),
        }
    }

    /// Load and parse the spec into a JSON document.
    pub async fn load(&self) -> Result<Value> {
        parse_document(&self.read().await?)
    }
}

/// Parse spec text: JSON first, then restricted YAML.
pub fn parse_document(text: &str) -> Result<Value> {
    match serde_json::from_str::<Value>(text) {
        Ok(value) => return require_object(value),
        Err(json_err) => {
            // A document that clearly starts as JSON gets the JSON error;
            // retrying it as YAML would mask the real problem.
            if text.trim_start().starts_with('{') {
                return Err(OpenApiError::SpecLoad(format!("invalid JSON: {json_err}")));
            }
        }
    }

    let yaml: serde_yaml::Value = serde_yaml::from_str(text)
        .map_err(|e| OpenApiError::SpecLoad(format!("invalid YAML: {e}")))?;
    require_object(yaml_to_json(yaml)?)
}

fn require_object(value: Value) -> Result<Value> {
    if value.is_object() {
        Ok(value)
    } else {
        Err(OpenApiError::SpecShape(
            "OpenAPI document root must be an object".to_string(),
        ))
    }
}

/// Convert a YAML value to JSON, rejecting constructs outside the
/// restricted schema.
fn yaml_to_json(value: serde_yaml::Value) -> Result<Value> {
    match value {
        serde_yaml::Value::Null => Ok(Value::Null),
        serde_yaml::Value::Bool(b) => Ok(Value::Bool(b)),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::from(i))
            } else if let Some(u) = n.as_u64() {
                Ok(Value::from(u))
            } else if let Some(f) = n.as_f64() {
                serde_json::Number::from_f64(f)
                    .map(Value::Number)
                    .ok_or_else(|| {
                        OpenApiError::SpecLoad(format!("unrepresentable number: {f}"))
                    })
            } else {
                Err(OpenApiError::SpecLoad("unrepresentable number".to_string()))
            }
        }
        serde_yaml::Value::String(s) => Ok(Value::String(s)),
        serde_yaml::Value::Sequence(seq) => Ok(Value::Array(
            seq.into_iter().map(yaml_to_json).collect::<Result<_>>()?,
        )),
        serde_yaml::Value::Mapping(mapping) => {
            let mut object = Map::with_capacity(mapping.len());
            for (key, value) in mapping {
                let key = match key {
                    serde_yaml::Value::String(s) => s,
                    serde_yaml::Value::Number(n) => n.to_string(),
                    serde_yaml::Value::Bool(b) => b.to_string(),
                    other => {
                        return Err(OpenApiError::UnsafeYaml(format!(
                            "non-scalar mapping key: {other:?}"
                        )));
                    }
                };
                if key == "<<" {
                    return Err(OpenApiError::UnsafeYaml(
                        "merge keys ('<<') are not allowed".to_string(),
                    ));
                }
                object.insert(key, yaml_to_json(value)?);
            }
            Ok(Value::Object(object))
        }
        serde_yaml::Value::Tagged(tagged) => Err(OpenApiError::UnsafeYaml(format!(
            "custom tag {} is not allowed",
            tagged.tag
        ))),
    }
}
