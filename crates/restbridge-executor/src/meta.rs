//! Dynamic-mode meta-tools.
//!
//! In `dynamic` mode no synthesised tool is exposed; instead three fixed
//! tools let the client explore the API and invoke operations by endpoint,
//! funnelling through the same binding and execution path as ordinary
//! tools.

use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use restbridge_openapi::{Catalog, ToolMeta};
use restbridge_protocol::{Tool, ToolInputSchema};

use crate::error::{ExecutorError, Result};
use crate::execute::RequestExecutor;

/// The three meta-tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaTool {
    /// Enumerate every operation in the spec.
    ListEndpoints,
    /// Show the input schema an operation would have had as a tool.
    GetEndpointSchema,
    /// Bind and execute an operation by endpoint.
    InvokeEndpoint,
}

impl MetaTool {
    /// All meta-tools, in listing order.
    pub const ALL: [MetaTool; 3] = [
        MetaTool::ListEndpoints,
        MetaTool::GetEndpointSchema,
        MetaTool::InvokeEndpoint,
    ];

    /// Wire name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ListEndpoints => "list-api-endpoints",
            Self::GetEndpointSchema => "get-api-endpoint-schema",
            Self::InvokeEndpoint => "invoke-api-endpoint",
        }
    }

    /// Look a meta-tool up by name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|tool| tool.name().eq_ignore_ascii_case(name))
    }

    /// MCP tool definition.
    pub fn definition(&self) -> Tool {
        let (description, properties, required) = match self {
            Self::ListEndpoints => (
                "List every endpoint of the upstream API with its method and summary",
                json!({}),
                None,
            ),
            Self::GetEndpointSchema => (
                "Get the JSON input schema for an endpoint, keyed by HTTP method",
                json!({
                    "endpoint": {
                        "type": "string",
                        "description": "Endpoint path, e.g. /pets/{petId}"
                    }
                }),
                Some(vec!["endpoint".to_string()]),
            ),
            Self::InvokeEndpoint => (
                "Invoke an endpoint with the given parameters",
                json!({
                    "endpoint": {
                        "type": "string",
                        "description": "Endpoint path, e.g. /pets/{petId}"
                    },
                    "method": {
                        "type": "string",
                        "description": "HTTP method; defaults to the first operation on the endpoint"
                    },
                    "params": {
                        "type": "object",
                        "description": "Arguments, exactly as the endpoint's tool schema declares them"
                    }
                }),
                Some(vec!["endpoint".to_string()]),
            ),
        };
        Tool {
            name: self.name().to_string(),
            description: Some(description.to_string()),
            input_schema: ToolInputSchema {
                schema_type: "object".to_string(),
                properties: Some(properties),
                required,
            },
            meta: None,
        }
    }

    /// Execute this meta-tool.
    pub async fn execute(
        &self,
        catalog: &Catalog,
        executor: &RequestExecutor,
        args: &Value,
        cancel: &CancellationToken,
    ) -> Result<String> {
        match self {
            Self::ListEndpoints => list_endpoints(catalog),
            Self::GetEndpointSchema => endpoint_schema(catalog, args),
            Self::InvokeEndpoint => invoke_endpoint(catalog, executor, args, cancel).await,
        }
    }
}

fn list_endpoints(catalog: &Catalog) -> Result<String> {
    let endpoints: Vec<Value> = catalog
        .tools
        .iter()
        .map(|tool| {
            json!({
                "path": tool.original_path,
                "method": tool.http_method,
                "summary": tool.summary.as_deref().unwrap_or(""),
            })
        })
        .collect();
    serde_json::to_string_pretty(&endpoints)
        .map_err(|e| ExecutorError::InvalidArguments(e.to_string()))
}

fn endpoint_schema(catalog: &Catalog, args: &Value) -> Result<String> {
    let endpoint = required_endpoint(args)?;
    let mut schemas = serde_json::Map::new();
    for operation in catalog.operations_for(&endpoint) {
        schemas.insert(
            operation.http_method.clone(),
            serde_json::to_value(&operation.input_schema)
                .map_err(|e| ExecutorError::InvalidArguments(e.to_string()))?,
        );
    }
    if schemas.is_empty() {
        return Err(ExecutorError::EndpointNotFound(endpoint));
    }
    serde_json::to_string_pretty(&Value::Object(schemas))
        .map_err(|e| ExecutorError::InvalidArguments(e.to_string()))
}

async fn invoke_endpoint(
    catalog: &Catalog,
    executor: &RequestExecutor,
    args: &Value,
    cancel: &CancellationToken,
) -> Result<String> {
    let endpoint = required_endpoint(args)?;
    let method = args.get("method").and_then(Value::as_str);
    let operation: &ToolMeta = catalog
        .find_operation(&endpoint, method)
        .ok_or_else(|| ExecutorError::EndpointNotFound(endpoint.clone()))?;
    let params = args.get("params").cloned().unwrap_or(Value::Null);
    executor.execute(operation, &params, cancel).await
}

fn required_endpoint(args: &Value) -> Result<String> {
    let endpoint = args
        .get("endpoint")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            ExecutorError::InvalidArguments("'endpoint' is required".to_string())
        })?;
    Ok(if endpoint.starts_with('/') {
        endpoint.to_string()
    } else {
        format!("/{endpoint}")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use restbridge_openapi::{Abbreviator, synthesize};

    fn catalog() -> Catalog {
        let doc = json!({
            "openapi": "3.0.0",
            "info": {"title": "t", "version": "1"},
            "paths": {
                "/pets": {
                    "get": {"operationId": "listPets", "summary": "List pets",
                            "responses": {"200": {"description": "ok"}}},
                    "post": {"operationId": "createPet",
                             "responses": {"201": {"description": "made"}}}
                }
            }
        });
        synthesize(&doc, &Abbreviator::new()).unwrap()
    }

    #[test]
    fn meta_tool_names_resolve() {
        assert_eq!(
            MetaTool::from_name("list-api-endpoints"),
            Some(MetaTool::ListEndpoints)
        );
        assert_eq!(
            MetaTool::from_name("INVOKE-API-ENDPOINT"),
            Some(MetaTool::InvokeEndpoint)
        );
        assert_eq!(MetaTool::from_name("nope"), None);
    }

    #[test]
    fn definitions_are_valid_tools() {
        for meta in MetaTool::ALL {
            let tool = meta.definition();
            assert!(tool.name.len() <= 64);
            assert!(
                tool.name
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c == '-')
            );
        }
    }

    #[test]
    fn list_endpoints_reports_all_operations() {
        let listing = list_endpoints(&catalog()).unwrap();
        let parsed: Vec<Value> = serde_json::from_str(&listing).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0]["path"], json!("/pets"));
        assert_eq!(parsed[0]["summary"], json!("List pets"));
    }

    #[test]
    fn endpoint_schema_keys_by_method() {
        let schema = endpoint_schema(&catalog(), &json!({"endpoint": "/pets"})).unwrap();
        let parsed: Value = serde_json::from_str(&schema).unwrap();
        assert!(parsed.get("GET").is_some());
        assert!(parsed.get("POST").is_some());

        // Leading slash is optional.
        assert!(endpoint_schema(&catalog(), &json!({"endpoint": "pets"})).is_ok());
    }

    #[test]
    fn unknown_endpoint_is_an_error() {
        let err = endpoint_schema(&catalog(), &json!({"endpoint": "/nope"})).unwrap_err();
        assert!(matches!(err, ExecutorError::EndpointNotFound(_)));

        let err = endpoint_schema(&catalog(), &json!({})).unwrap_err();
        assert!(matches!(err, ExecutorError::InvalidArguments(_)));
    }
}
