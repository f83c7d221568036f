//! MCP request and result shapes.
//!
//! Field names follow the MCP wire format (`camelCase` where the protocol
//! says so, `skip_serializing_if` on every optional so frames stay minimal).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// JSON-RPC request identifier: a string or an integer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// String id.
    String(String),
    /// Numeric id.
    Number(i64),
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s}"),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

/// Name/version pair identifying a client or server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Implementation {
    /// Machine-readable name.
    pub name: String,
    /// Version string.
    pub version: String,
}

impl Implementation {
    /// Build an implementation descriptor.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// `initialize` request params.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeRequest {
    /// Protocol version the client proposes.
    pub protocol_version: String,
    /// Client capabilities (opaque to this server).
    #[serde(default)]
    pub capabilities: Value,
    /// Client identification.
    #[serde(default)]
    pub client_info: Option<Implementation>,
}

/// Capabilities advertised in the `initialize` result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerCapabilities {
    /// Tool support marker.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Value>,
    /// Prompt support marker.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompts: Option<Value>,
    /// Resource support marker.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<Value>,
}

/// `initialize` result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    /// Negotiated protocol version.
    pub protocol_version: String,
    /// What this server can do.
    pub capabilities: ServerCapabilities,
    /// Server identification.
    pub server_info: Implementation,
}

/// JSON Schema describing a tool's arguments.
///
/// Always an object schema; the executor reads the per-property
/// `x-parameter-location` annotation to decide where each argument binds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolInputSchema {
    /// Always `"object"`.
    #[serde(rename = "type")]
    pub schema_type: String,
    /// Property name → schema.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Value>,
    /// Required property names.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
}

impl Default for ToolInputSchema {
    fn default() -> Self {
        Self {
            schema_type: "object".to_string(),
            properties: None,
            required: None,
        }
    }
}

/// Tool definition as listed to clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tool {
    /// Tool name (`^[a-z0-9_-]+$`, at most 64 chars).
    pub name: String,
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Argument schema.
    #[serde(rename = "inputSchema")]
    pub input_schema: ToolInputSchema,
    /// Extension metadata (method, path, tags, resource name).
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<HashMap<String, Value>>,
}

/// `tools/list` result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListToolsResult {
    /// All visible tools.
    pub tools: Vec<Tool>,
}

/// `tools/call` params.
///
/// The standard shape carries `name`; the original wire format also accepts
/// `id` as an alternative selector, and both are honoured.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolRequest {
    /// Tool display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Tool id (the internal `METHOD::path` token).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Tool arguments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
}

impl CallToolRequest {
    /// The selector the caller provided, `name` preferred.
    pub fn selector(&self) -> Option<&str> {
        self.name.as_deref().or(self.id.as_deref())
    }
}

/// Role in a prompt message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The user side of the conversation.
    #[default]
    User,
    /// The assistant side.
    Assistant,
}

/// A content block; tool results always use the text variant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Content {
    /// Plain text.
    Text {
        /// The text payload.
        text: String,
    },
}

impl Content {
    /// Build a text block.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// The text payload, if this is a text block.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
        }
    }
}

/// `tools/call` result envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallToolResult {
    /// Content blocks.
    pub content: Vec<Content>,
    /// Set when the call failed; the content then carries the sanitised
    /// error text.
    #[serde(rename = "isError", skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl CallToolResult {
    /// Successful text result.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![Content::text(text)],
            is_error: None,
        }
    }

    /// Failed result with sanitised error text.
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![Content::text(text)],
            is_error: Some(true),
        }
    }

    /// True when `isError` is set.
    pub fn is_error(&self) -> bool {
        self.is_error == Some(true)
    }
}

/// Argument declared by a prompt template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptArgument {
    /// Argument name.
    pub name: String,
    /// What the argument means.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether the argument must be supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
}

/// Prompt definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Prompt {
    /// Prompt name.
    pub name: String,
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Declared arguments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Vec<PromptArgument>>,
}

/// One message of a rendered prompt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptMessage {
    /// Who speaks.
    pub role: Role,
    /// What is said.
    pub content: Content,
}

/// `prompts/list` result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListPromptsResult {
    /// All registered prompts.
    pub prompts: Vec<Prompt>,
}

/// `prompts/get` params.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetPromptRequest {
    /// Prompt name.
    pub name: String,
    /// Template arguments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<HashMap<String, String>>,
}

/// `prompts/get` result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetPromptResult {
    /// Prompt description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Rendered messages.
    pub messages: Vec<PromptMessage>,
}

/// Resource definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Resource {
    /// Resource URI.
    pub uri: String,
    /// Display name.
    pub name: String,
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// MIME type of the content.
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// Contents of a read resource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceContents {
    /// Resource URI.
    pub uri: String,
    /// MIME type of the content.
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Text payload.
    pub text: String,
}

/// `resources/list` result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResourcesResult {
    /// All registered resources.
    pub resources: Vec<Resource>,
}

/// `resources/read` params.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadResourceRequest {
    /// URI to read.
    pub uri: String,
}

/// `resources/read` result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadResourceResult {
    /// Content blocks (one per matching resource).
    pub contents: Vec<ResourceContents>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn call_tool_request_accepts_name_or_id() {
        let by_name: CallToolRequest =
            serde_json::from_value(json!({"name": "getPetById", "arguments": {"petId": 10}}))
                .unwrap();
        assert_eq!(by_name.selector(), Some("getPetById"));

        let by_id: CallToolRequest =
            serde_json::from_value(json!({"id": "GET::pet__---petId", "arguments": {}})).unwrap();
        assert_eq!(by_id.selector(), Some("GET::pet__---petId"));

        let neither: CallToolRequest = serde_json::from_value(json!({})).unwrap();
        assert_eq!(neither.selector(), None);
    }

    #[test]
    fn tool_result_envelope_shape() {
        let ok = CallToolResult::text("hello");
        let v = serde_json::to_value(&ok).unwrap();
        assert_eq!(v["content"][0]["type"], json!("text"));
        assert_eq!(v["content"][0]["text"], json!("hello"));
        assert!(v.get("isError").is_none());

        let err = CallToolResult::error("boom");
        let v = serde_json::to_value(&err).unwrap();
        assert_eq!(v["isError"], json!(true));
    }

    #[test]
    fn input_schema_serialises_as_object_schema() {
        let schema = ToolInputSchema {
            schema_type: "object".into(),
            properties: Some(json!({"q": {"type": "string"}})),
            required: Some(vec!["q".into()]),
        };
        let v = serde_json::to_value(&schema).unwrap();
        assert_eq!(v["type"], json!("object"));
        assert_eq!(v["required"], json!(["q"]));
    }

    #[test]
    fn initialize_result_wire_names() {
        let result = InitializeResult {
            protocol_version: "2024-11-05".into(),
            capabilities: ServerCapabilities {
                tools: Some(json!({})),
                ..Default::default()
            },
            server_info: Implementation::new("restbridge", "0.4.2"),
        };
        let v = serde_json::to_value(&result).unwrap();
        assert!(v.get("protocolVersion").is_some());
        assert!(v.get("serverInfo").is_some());
        assert!(v["capabilities"].get("prompts").is_none());
    }
}
