//! Per-operation tool synthesis.
//!
//! Walks `paths` and projects every operation into a [`ToolMeta`]: a stable
//! id (§ tool_id), an abbreviated display name, an object input schema whose
//! properties union path/query/header/cookie parameters with request-body
//! contributions, and the binding metadata the executor needs at call time.
//!
//! Every property carries an `x-parameter-location` annotation recording
//! where its value goes on the wire.

use std::collections::{BTreeMap, HashSet};

use serde_json::{Map, Value, json};
use tracing::warn;

use restbridge_protocol::{Tool, ToolInputSchema};

use crate::abbreviate::{Abbreviator, MAX_NAME_LENGTH};
use crate::error::{OpenApiError, Result};
use crate::resolver;
use crate::tool_id;

/// Annotation key recording a property's binding location.
pub const PARAMETER_LOCATION_KEY: &str = "x-parameter-location";

/// HTTP methods recognised as operations.
const METHODS: &[&str] = &[
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

/// Where a parameter binds on the outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterLocation {
    /// Path template substitution.
    Path,
    /// Query string.
    Query,
    /// Request header.
    Header,
    /// `Cookie` header.
    Cookie,
    /// A property merged into the JSON object body.
    Body,
    /// The entire request body (primitive or array bodies, surfaced as the
    /// single property named `body`).
    RawBody,
}

impl ParameterLocation {
    /// Parse an OpenAPI `in` value.
    pub fn from_openapi(value: &str) -> Option<Self> {
        match value {
            "path" => Some(Self::Path),
            "query" => Some(Self::Query),
            "header" => Some(Self::Header),
            "cookie" => Some(Self::Cookie),
            _ => None,
        }
    }

    /// Wire name used in the `x-parameter-location` annotation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Query => "query",
            Self::Header => "header",
            Self::Cookie => "cookie",
            Self::Body | Self::RawBody => "body",
        }
    }
}

/// One argument the synthesised tool accepts.
#[derive(Debug, Clone)]
pub struct ParameterMeta {
    /// Property name in the input schema (may be `body_`-prefixed).
    pub name: String,
    /// Name at the binding site: the path placeholder, query key, header
    /// name, cookie name, or body property.
    pub target: String,
    /// Where the value binds.
    pub location: ParameterLocation,
    /// Whether the caller must supply it.
    pub required: bool,
}

/// A synthesised tool: one OpenAPI operation, callable over MCP.
#[derive(Debug, Clone)]
pub struct ToolMeta {
    /// Opaque id encoding `(method, path)`.
    pub id: String,
    /// Abbreviated display name, unique across the registry.
    pub name: String,
    /// Description shown to clients.
    pub description: String,
    /// Operation summary, if any.
    pub summary: Option<String>,
    /// Argument schema.
    pub input_schema: ToolInputSchema,
    /// Upper-case HTTP method.
    pub http_method: String,
    /// Path template exactly as it appears in the spec.
    pub original_path: String,
    /// Binding metadata per argument.
    pub parameters: Vec<ParameterMeta>,
    /// Operation tags.
    pub tags: Vec<String>,
    /// First path segment, used by resource filtering.
    pub resource_name: String,
}

impl ToolMeta {
    /// Project into the MCP `Tool` wire shape.
    pub fn to_tool(&self) -> Tool {
        let mut meta = std::collections::HashMap::new();
        meta.insert("method".to_string(), json!(self.http_method));
        meta.insert("path".to_string(), json!(self.original_path));
        if !self.tags.is_empty() {
            meta.insert("tags".to_string(), json!(self.tags));
        }
        if !self.resource_name.is_empty() {
            meta.insert("resourceName".to_string(), json!(self.resource_name));
        }
        Tool {
            name: self.name.clone(),
            description: Some(self.description.clone()),
            input_schema: self.input_schema.clone(),
            meta: Some(meta),
        }
    }
}

/// Everything synthesised from one spec.
#[derive(Debug, Clone)]
pub struct Catalog {
    /// API title from `info`.
    pub title: String,
    /// API version from `info`.
    pub version: String,
    /// All synthesised tools, in path order.
    pub tools: Vec<ToolMeta>,
    /// Whether any operation declares a cookie parameter; the executor only
    /// enables its cookie store when one does.
    pub has_cookie_params: bool,
}

impl Catalog {
    /// Find an operation by its original path, optionally narrowed by
    /// method.
    pub fn find_operation(&self, path: &str, method: Option<&str>) -> Option<&ToolMeta> {
        self.tools.iter().find(|tool| {
            tool.original_path == path
                && method.is_none_or(|m| tool.http_method.eq_ignore_ascii_case(m))
        })
    }

    /// All operations on a path.
    pub fn operations_for(&self, path: &str) -> impl Iterator<Item = &ToolMeta> {
        self.tools.iter().filter(move |t| t.original_path == path)
    }
}

/// Synthesise a tool catalog from a parsed OpenAPI document.
pub fn synthesize(doc: &Value, abbreviator: &Abbreviator) -> Result<Catalog> {
    let paths = doc
        .get("paths")
        .and_then(Value::as_object)
        .ok_or_else(|| OpenApiError::SpecShape("document has no 'paths' object".to_string()))?;

    let title = doc
        .pointer("/info/title")
        .and_then(Value::as_str)
        .unwrap_or("openapi")
        .to_string();
    let version = doc
        .pointer("/info/version")
        .and_then(Value::as_str)
        .unwrap_or("0.0.0")
        .to_string();

    let mut tools = Vec::new();
    let mut used_names: HashSet<String> = HashSet::new();
    let mut used_ids: HashSet<String> = HashSet::new();
    let mut has_cookie_params = false;

    for (path, path_item) in paths {
        if path.starts_with("x-") {
            continue;
        }
        let path_item = match path_item.as_object() {
            Some(item) => item,
            None => continue,
        };
        let path_level_params = collect_parameters(doc, path_item.get("parameters"))?;

        for method in METHODS {
            let Some(operation) = path_item.get(*method).and_then(Value::as_object) else {
                continue;
            };

            let mut tool = synthesize_operation(
                doc,
                path,
                method,
                operation,
                &path_level_params,
                abbreviator,
            )?;

            if !used_ids.insert(tool.id.clone()) {
                return Err(OpenApiError::ToolId(format!(
                    "operations collide on tool id {:?}",
                    tool.id
                )));
            }
            tool.name = deduplicate_name(tool.name, &mut used_names);
            has_cookie_params |= tool
                .parameters
                .iter()
                .any(|p| p.location == ParameterLocation::Cookie);
            tools.push(tool);
        }
    }

    Ok(Catalog {
        title,
        version,
        tools,
        has_cookie_params,
    })
}

/// Resolve a `parameters` array into `(name, in) → parameter` map.
fn collect_parameters(
    doc: &Value,
    parameters: Option<&Value>,
) -> Result<BTreeMap<(String, String), Value>> {
    let mut out = BTreeMap::new();
    let Some(Value::Array(parameters)) = parameters else {
        return Ok(out);
    };
    for parameter in parameters {
        let resolved = resolver::resolve(doc, parameter)?;
        let (Some(name), Some(location)) = (
            resolved.get("name").and_then(Value::as_str),
            resolved.get("in").and_then(Value::as_str),
        ) else {
            warn!("skipping parameter without name/in: {resolved}");
            continue;
        };
        out.insert((name.to_string(), location.to_string()), resolved.clone());
    }
    Ok(out)
}

fn synthesize_operation(
    doc: &Value,
    path: &str,
    method: &str,
    operation: &Map<String, Value>,
    path_level_params: &BTreeMap<(String, String), Value>,
    abbreviator: &Abbreviator,
) -> Result<ToolMeta> {
    let http_method = method.to_ascii_uppercase();
    let id = tool_id::encode(&http_method, path)?;

    // Operation-level parameters override inherited ones by (name, in).
    let mut merged = path_level_params.clone();
    merged.extend(collect_parameters(doc, operation.get("parameters"))?);

    let mut properties = Map::new();
    let mut required = Vec::new();
    let mut parameters = Vec::new();

    for ((name, location), parameter) in &merged {
        let Some(location) = ParameterLocation::from_openapi(location) else {
            warn!(name = %name, location = %location, "unknown parameter location, skipping");
            continue;
        };
        let is_required =
            location == ParameterLocation::Path
                || parameter.get("required").and_then(Value::as_bool) == Some(true);

        let mut schema = parameter
            .get("schema")
            .cloned()
            .unwrap_or_else(|| json!({"type": "string"}));
        if let Value::Object(ref mut map) = schema {
            if let Some(description) = parameter.get("description").and_then(Value::as_str) {
                map.entry("description".to_string())
                    .or_insert_with(|| json!(description));
            }
            map.insert(PARAMETER_LOCATION_KEY.to_string(), json!(location.as_str()));
        }

        properties.insert(name.clone(), schema);
        if is_required {
            required.push(name.clone());
        }
        parameters.push(ParameterMeta {
            name: name.clone(),
            target: name.clone(),
            location,
            required: is_required,
        });
    }

    if let Some(request_body) = operation.get("requestBody") {
        let request_body = resolver::resolve(doc, request_body)?;
        let body_required =
            request_body.get("required").and_then(Value::as_bool) == Some(true);
        if let Some(schema) = json_body_schema(&request_body) {
            merge_body_schema(
                &schema,
                body_required,
                &mut properties,
                &mut required,
                &mut parameters,
            );
        }
    }

    let summary = operation
        .get("summary")
        .and_then(Value::as_str)
        .map(str::to_string);
    let mut description = operation
        .get("description")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| summary.clone())
        .unwrap_or_else(|| format!("{http_method} {path}"));
    if operation.get("deprecated").and_then(Value::as_bool) == Some(true) {
        description.push_str(" (deprecated)");
    }

    let name_source = operation
        .get("operationId")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("{http_method}-{path}"));
    let name = abbreviator.abbreviate(&name_source)?;

    let tags = operation
        .get("tags")
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let resource_name = path
        .trim_start_matches('/')
        .split('/')
        .next()
        .unwrap_or_default()
        .trim_matches(|c| c == '{' || c == '}')
        .to_string();

    Ok(ToolMeta {
        id,
        name,
        description,
        summary,
        input_schema: ToolInputSchema {
            schema_type: "object".to_string(),
            properties: Some(Value::Object(properties)),
            required: if required.is_empty() {
                None
            } else {
                Some(required)
            },
        },
        http_method,
        original_path: path.to_string(),
        parameters,
        tags,
        resource_name,
    })
}

/// Pick the JSON body schema out of a resolved requestBody, if any.
fn json_body_schema(request_body: &Value) -> Option<Value> {
    let content = request_body.get("content")?.as_object()?;
    let media_type = content
        .get("application/json")
        .or_else(|| {
            content
                .iter()
                .find(|(k, _)| k.ends_with("+json"))
                .map(|(_, v)| v)
        })?;
    media_type.get("schema").cloned()
}

/// Fold a request-body schema into the tool's property map.
///
/// Object bodies merge property-by-property, prefixing `body_` on collision
/// with an existing parameter; anything else becomes a single property
/// literally named `body`.
fn merge_body_schema(
    schema: &Value,
    body_required: bool,
    properties: &mut Map<String, Value>,
    required: &mut Vec<String>,
    parameters: &mut Vec<ParameterMeta>,
) {
    let is_object = schema.get("type").and_then(Value::as_str) == Some("object")
        || schema.get("properties").is_some();

    if is_object {
        let body_properties = schema
            .get("properties")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let body_required_list: HashSet<&str> = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|list| list.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        for (property, mut property_schema) in body_properties {
            let exposed = if properties.contains_key(&property) {
                format!("body_{property}")
            } else {
                property.clone()
            };
            if properties.contains_key(&exposed) {
                warn!(property = %property, "body property collides twice, skipping");
                continue;
            }
            if let Value::Object(ref mut map) = property_schema {
                map.insert(PARAMETER_LOCATION_KEY.to_string(), json!("body"));
            }
            let is_required = body_required && body_required_list.contains(property.as_str());
            if is_required {
                required.push(exposed.clone());
            }
            parameters.push(ParameterMeta {
                name: exposed.clone(),
                target: property,
                location: ParameterLocation::Body,
                required: is_required,
            });
            properties.insert(exposed, property_schema);
        }
    } else {
        let exposed = if properties.contains_key("body") {
            "body_body".to_string()
        } else {
            "body".to_string()
        };
        let mut body_schema = schema.clone();
        if let Value::Object(ref mut map) = body_schema {
            map.insert(PARAMETER_LOCATION_KEY.to_string(), json!("body"));
        }
        if body_required {
            required.push(exposed.clone());
        }
        parameters.push(ParameterMeta {
            name: exposed.clone(),
            target: "body".to_string(),
            location: ParameterLocation::RawBody,
            required: body_required,
        });
        properties.insert(exposed, body_schema);
    }
}

/// Make a display name globally unique, keeping it within the length limit.
fn deduplicate_name(name: String, used: &mut HashSet<String>) -> String {
    if used.insert(name.clone()) {
        return name;
    }
    for counter in 2.. {
        let suffix = format!("-{counter}");
        let mut candidate = name.clone();
        candidate.truncate(MAX_NAME_LENGTH.saturating_sub(suffix.len()));
        let candidate = format!("{}{suffix}", candidate.trim_end_matches('-'));
        if used.insert(candidate.clone()) {
            return candidate;
        }
    }
    unreachable!("counter space exhausted");
}
