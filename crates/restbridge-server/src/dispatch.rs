//! MCP method router.
//!
//! One dispatcher instance serves every transport. Tool execution failures
//! are carried inside the MCP result envelope (`isError: true`); only
//! protocol-level failures (unknown method, malformed frame, unknown tool)
//! become JSON-RPC error replies.

use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use restbridge_executor::RequestExecutor;
use restbridge_protocol::{
    CallToolRequest, CallToolResult, DEFAULT_PROTOCOL_VERSION, GetPromptRequest, Implementation,
    InitializeRequest, InitializeResult, JsonRpcError, JsonRpcMessage, JsonRpcRequest,
    JsonRpcResponse, ListPromptsResult, ListResourcesResult, ListToolsResult,
    ReadResourceRequest, SUPPORTED_PROTOCOL_VERSIONS, ServerCapabilities,
};

use crate::prompts::PromptStore;
use crate::registry::{ToolEntry, ToolRegistry};
use crate::resources::ResourceStore;

/// Routes JSON-RPC requests to their handlers.
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    executor: Arc<RequestExecutor>,
    prompts: Arc<PromptStore>,
    resources: Arc<ResourceStore>,
    server_info: Implementation,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("server", &self.server_info.name)
            .field("registry", &self.registry)
            .finish()
    }
}

impl Dispatcher {
    /// Wire up a dispatcher.
    pub fn new(
        registry: Arc<ToolRegistry>,
        executor: Arc<RequestExecutor>,
        prompts: Arc<PromptStore>,
        resources: Arc<ResourceStore>,
        server_info: Implementation,
    ) -> Self {
        Self {
            registry,
            executor,
            prompts,
            resources,
            server_info,
        }
    }

    /// The tool registry behind this dispatcher.
    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Handle one raw inbound frame. Returns `None` for notifications and
    /// stray responses (nothing goes back on the wire for those).
    pub async fn handle_value(
        &self,
        raw: Value,
        cancel: &CancellationToken,
    ) -> Option<JsonRpcResponse> {
        match serde_json::from_value::<JsonRpcMessage>(raw) {
            Ok(JsonRpcMessage::Request(request)) => {
                Some(self.handle_request(request, cancel).await)
            }
            Ok(JsonRpcMessage::Notification(notification)) => {
                debug!(method = %notification.method, "notification received");
                None
            }
            Ok(JsonRpcMessage::Response(_)) => {
                // This server never initiates requests, so client responses
                // have nothing to correlate with.
                warn!("dropping unexpected response frame");
                None
            }
            Err(error) => Some(JsonRpcResponse::parse_error(error.to_string())),
        }
    }

    /// Handle a well-formed request.
    pub async fn handle_request(
        &self,
        request: JsonRpcRequest,
        cancel: &CancellationToken,
    ) -> JsonRpcResponse {
        match request.method.as_str() {
            "initialize" => self.handle_initialize(&request),
            "ping" => success(&request, serde_json::json!({})),
            "tools/list" => success(
                &request,
                ListToolsResult {
                    tools: self.registry.list_tools(),
                },
            ),
            "tools/call" => self.handle_tools_call(&request, cancel).await,
            "prompts/list" => success(
                &request,
                ListPromptsResult {
                    prompts: self.prompts.list(),
                },
            ),
            "prompts/get" => self.handle_prompts_get(&request),
            "resources/list" => success(
                &request,
                ListResourcesResult {
                    resources: self.resources.list(),
                },
            ),
            "resources/read" => self.handle_resources_read(&request),
            method => JsonRpcResponse::error(
                JsonRpcError::method_not_found(method),
                request.id.clone(),
            ),
        }
    }

    fn handle_initialize(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
        let client_version = request
            .params
            .as_ref()
            .and_then(|params| {
                serde_json::from_value::<InitializeRequest>(params.clone()).ok()
            })
            .map(|init| init.protocol_version);

        let protocol_version = match client_version {
            Some(version) if SUPPORTED_PROTOCOL_VERSIONS.contains(&version.as_str()) => version,
            _ => DEFAULT_PROTOCOL_VERSION.to_string(),
        };

        let capabilities = ServerCapabilities {
            tools: Some(serde_json::json!({})),
            prompts: (!self.prompts.is_empty()).then(|| serde_json::json!({})),
            resources: (!self.resources.is_empty()).then(|| serde_json::json!({})),
        };

        success(
            request,
            InitializeResult {
                protocol_version,
                capabilities,
                server_info: self.server_info.clone(),
            },
        )
    }

    async fn handle_tools_call(
        &self,
        request: &JsonRpcRequest,
        cancel: &CancellationToken,
    ) -> JsonRpcResponse {
        let call: CallToolRequest = match parse_params(request) {
            Ok(call) => call,
            Err(response) => return response,
        };
        let Some(selector) = call.selector() else {
            return JsonRpcResponse::error(
                JsonRpcError::invalid_params("either 'name' or 'id' is required"),
                request.id.clone(),
            );
        };
        let Some(entry) = self.registry.lookup(selector) else {
            return JsonRpcResponse::error(
                JsonRpcError::tool_not_found(selector),
                request.id.clone(),
            );
        };

        let arguments = call.arguments.clone().unwrap_or(Value::Null);
        let result = match entry {
            ToolEntry::OpenApi(tool) => {
                debug!(tool = %tool.name, method = %tool.http_method, path = %tool.original_path, "executing tool");
                match self.executor.execute(&tool, &arguments, cancel).await {
                    Ok(text) => CallToolResult::text(text),
                    Err(error) => CallToolResult::error(error.to_string()),
                }
            }
            ToolEntry::Meta(meta) => {
                let catalog = self.registry.catalog();
                match meta
                    .execute(&catalog, &self.executor, &arguments, cancel)
                    .await
                {
                    Ok(text) => CallToolResult::text(text),
                    Err(error) => CallToolResult::error(error.to_string()),
                }
            }
            ToolEntry::Custom(tool) => match (tool.handler)(arguments).await {
                Ok(value) => CallToolResult::text(render_value(value)),
                Err(message) => CallToolResult::error(message),
            },
        };
        success(request, result)
    }

    fn handle_prompts_get(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
        let params: GetPromptRequest = match parse_params(request) {
            Ok(params) => params,
            Err(response) => return response,
        };
        let arguments = params.arguments.unwrap_or_default();
        match self.prompts.get(&params.name, &arguments) {
            Some(result) => success(request, result),
            None => JsonRpcResponse::error(
                JsonRpcError::invalid_params(format!("unknown prompt: {}", params.name)),
                request.id.clone(),
            ),
        }
    }

    fn handle_resources_read(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
        let params: ReadResourceRequest = match parse_params(request) {
            Ok(params) => params,
            Err(response) => return response,
        };
        match self.resources.read(&params.uri) {
            Some(result) => success(request, result),
            None => JsonRpcResponse::error(
                JsonRpcError::invalid_params(format!("unknown resource: {}", params.uri)),
                request.id.clone(),
            ),
        }
    }
}

fn parse_params<T>(request: &JsonRpcRequest) -> std::result::Result<T, JsonRpcResponse>
where
    T: serde::de::DeserializeOwned,
{
    let params = request.params.clone().unwrap_or(Value::Null);
    serde_json::from_value(params).map_err(|error| {
        JsonRpcResponse::error(
            JsonRpcError::invalid_params(error.to_string()),
            request.id.clone(),
        )
    })
}

fn success<T: serde::Serialize>(request: &JsonRpcRequest, result: T) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(value, request.id.clone()),
        Err(error) => JsonRpcResponse::error(
            JsonRpcError::internal(error.to_string()),
            request.id.clone(),
        ),
    }
}

fn render_value(value: Value) -> String {
    match value {
        Value::String(text) => text,
        other => serde_json::to_string_pretty(&other).unwrap_or_else(|_| other.to_string()),
    }
}
