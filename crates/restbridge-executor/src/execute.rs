//! Outbound request execution.
//!
//! One tool invocation becomes exactly one outbound HTTP transaction (two
//! when the auth provider asks for the single permitted retry). The flow:
//! decode the tool id, bind arguments into path/query/header/cookie/body
//! locations, run the header safety checks, merge auth headers, send
//! through the bounded client, and sanitise whatever comes back.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use reqwest::header::{CONTENT_TYPE, COOKIE, HeaderMap, HeaderName, HeaderValue};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use restbridge_openapi::{ParameterLocation, ToolMeta, tool_id};

use crate::auth::AuthProvider;
use crate::error::{ExecutorError, Result};
use crate::headers;

/// Default wall-clock bound per outbound call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Request and response body cap.
pub const MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

/// Redirect hop limit.
pub const MAX_REDIRECTS: usize = 5;

/// Methods whose undeclared arguments go to the query string instead of the
/// body.
const QUERY_METHODS: &[&str] = &["GET", "DELETE", "HEAD", "OPTIONS"];

/// Characters percent-encoded in query keys and values. Commas stay literal
/// so array parameters serialise as `tags=a,b`.
const QUERY_VALUE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'&')
    .add(b'=')
    .add(b'+')
    .add(b'%');

/// Outbound client configuration.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Base URL the spec's paths are appended to.
    pub base_url: String,
    /// Per-call timeout.
    pub timeout: Duration,
    /// Request body cap in bytes.
    pub max_request_bytes: usize,
    /// Response body cap in bytes.
    pub max_response_bytes: usize,
    /// Redirect hop limit.
    pub max_redirects: usize,
    /// Enable the cookie jar; only set when the spec declares cookie
    /// parameters.
    pub enable_cookies: bool,
}

impl ExecutorConfig {
    /// Config with the default limits.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
            max_request_bytes: MAX_BODY_BYTES,
            max_response_bytes: MAX_BODY_BYTES,
            max_redirects: MAX_REDIRECTS,
            enable_cookies: false,
        }
    }

    /// Enable or disable the cookie jar.
    #[must_use]
    pub fn with_cookies(mut self, enable: bool) -> Self {
        self.enable_cookies = enable;
        self
    }
}

/// Executes tool invocations against the upstream API.
///
/// Stateless apart from the shared client; safe to share across request
/// tasks.
pub struct RequestExecutor {
    client: reqwest::Client,
    config: ExecutorConfig,
    auth: Option<Arc<dyn AuthProvider>>,
}

impl std::fmt::Debug for RequestExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestExecutor")
            .field("base_url", &self.config.base_url)
            .field("has_auth", &self.auth.is_some())
            .finish()
    }
}

impl RequestExecutor {
    /// Build the executor and its bounded client.
    pub fn new(config: ExecutorConfig, auth: Option<Arc<dyn AuthProvider>>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .cookie_store(config.enable_cookies)
            .build()
            .map_err(|e| ExecutorError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            config,
            auth,
        })
    }

    /// True when an auth provider is configured.
    pub fn has_auth_provider(&self) -> bool {
        self.auth.is_some()
    }

    /// Execute a tool invocation and return the response body as text
    /// (pretty-printed when it is JSON).
    pub async fn execute(
        &self,
        tool: &ToolMeta,
        args: &Value,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let args = argument_map(args)?;
        let (method, template) =
            tool_id::decode(&tool.id).map_err(|e| ExecutorError::ToolId(e.to_string()))?;
        let bound = bind(tool, &method, &template, &args, self.auth.is_some())?;
        self.send(&method, bound, cancel).await
    }

    async fn send(
        &self,
        method: &str,
        bound: BoundRequest,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let url = self.build_url(&bound)?;
        let method = reqwest::Method::from_bytes(method.as_bytes())
            .map_err(|_| ExecutorError::Network(format!("unsupported method {method:?}")))?;

        let body_bytes = match &bound.body {
            Some(body) => {
                let bytes = serde_json::to_vec(body)
                    .map_err(|e| ExecutorError::InvalidArguments(e.to_string()))?;
                if bytes.len() > self.config.max_request_bytes {
                    return Err(ExecutorError::RequestTooLarge(
                        bytes.len(),
                        self.config.max_request_bytes,
                    ));
                }
                Some(bytes)
            }
            None => None,
        };

        let mut retried = false;
        loop {
            let header_map = self.assemble_headers(&bound).await?;

            let mut request = self.client.request(method.clone(), url.clone());
            request = request.headers(header_map);
            if let Some(bytes) = &body_bytes {
                request = request
                    .header(CONTENT_TYPE, "application/json")
                    .body(bytes.clone());
            }

            debug!(method = %method, url = %url, retried, "sending upstream request");
            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ExecutorError::Cancelled),
                result = request.send() => result.map_err(|e| {
                    if e.is_timeout() {
                        ExecutorError::Timeout
                    } else {
                        ExecutorError::Network(e.to_string())
                    }
                })?,
            };

            let status = response.status();
            if (status.as_u16() == 401 || status.as_u16() == 403)
                && !retried
                && let Some(provider) = &self.auth
            {
                let retry = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(ExecutorError::Cancelled),
                    result = provider.handle_auth_error(status.as_u16()) => {
                        result.map_err(|e| ExecutorError::Auth(e.to_string()))?
                    }
                };
                if retry {
                    debug!(status = status.as_u16(), "auth provider requested a retry");
                    retried = true;
                    continue;
                }
            }

            let body_text = self.read_body(response, cancel).await?;
            if !status.is_success() {
                return Err(ExecutorError::upstream(status.as_u16(), &body_text));
            }
            return Ok(prettify(body_text));
        }
    }

    fn build_url(&self, bound: &BoundRequest) -> Result<Url> {
        let full = format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            bound.path.trim_start_matches('/')
        );
        let mut url = Url::parse(&full).map_err(|e| ExecutorError::Url(e.to_string()))?;
        if !bound.query.is_empty() {
            let query = bound
                .query
                .iter()
                .map(|(key, value)| {
                    format!(
                        "{}={}",
                        utf8_percent_encode(key, QUERY_VALUE),
                        utf8_percent_encode(value, QUERY_VALUE)
                    )
                })
                .collect::<Vec<_>>()
                .join("&");
            url.set_query(Some(&query));
        }
        Ok(url)
    }

    /// Bound headers plus fresh auth headers; called per attempt so a retry
    /// observes refreshed credentials.
    async fn assemble_headers(&self, bound: &BoundRequest) -> Result<HeaderMap> {
        let mut header_map = HeaderMap::new();
        let mut caller_names: HashSet<String> = HashSet::new();

        for (name, value) in &bound.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| ExecutorError::HeaderInjection(format!("invalid header name {name:?}")))?;
            let header_value = HeaderValue::from_str(value).map_err(|_| {
                ExecutorError::HeaderInjection(format!("invalid value for header {name:?}"))
            })?;
            caller_names.insert(name.to_ascii_lowercase());
            header_map.append(header_name, header_value);
        }

        if !bound.cookie_pairs.is_empty() {
            let cookie = bound
                .cookie_pairs
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; ");
            let header_value = HeaderValue::from_str(&cookie)
                .map_err(|_| ExecutorError::HeaderInjection("invalid cookie value".to_string()))?;
            caller_names.insert("cookie".to_string());
            header_map.insert(COOKIE, header_value);
        }

        if let Some(provider) = &self.auth {
            let auth_headers = provider
                .auth_headers()
                .await
                .map_err(|e| ExecutorError::Auth(e.to_string()))?;
            for (name, value) in auth_headers {
                if headers::is_system_header(&name) {
                    warn!(header = %name, "auth provider tried to set a system header, skipping");
                    continue;
                }
                if caller_names.contains(&name.to_ascii_lowercase()) {
                    return Err(ExecutorError::AuthHeaderConflict(format!(
                        "caller-supplied header {name:?} collides with the auth provider"
                    )));
                }
                let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                    ExecutorError::Auth(format!("auth provider produced invalid header name {name:?}"))
                })?;
                let header_value = HeaderValue::from_str(&value).map_err(|_| {
                    ExecutorError::Auth(format!("auth provider produced invalid value for {name:?}"))
                })?;
                header_map.insert(header_name, header_value);
            }
        }

        Ok(header_map)
    }

    async fn read_body(
        &self,
        mut response: reqwest::Response,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let mut buffer: Vec<u8> = Vec::new();
        loop {
            let chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ExecutorError::Cancelled),
                result = response.chunk() => result.map_err(|e| {
                    if e.is_timeout() {
                        ExecutorError::Timeout
                    } else {
                        ExecutorError::Network(e.to_string())
                    }
                })?,
            };
            match chunk {
                Some(bytes) => {
                    if buffer.len() + bytes.len() > self.config.max_response_bytes {
                        return Err(ExecutorError::ResponseTooLarge(
                            self.config.max_response_bytes,
                        ));
                    }
                    buffer.extend_from_slice(&bytes);
                }
                None => break,
            }
        }
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

/// Arguments bound to their wire locations, ready to send.
#[derive(Debug, Default, Clone)]
struct BoundRequest {
    path: String,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    cookie_pairs: Vec<(String, String)>,
    body: Option<Value>,
}

fn argument_map(args: &Value) -> Result<Map<String, Value>> {
    match args {
        Value::Object(map) => Ok(map.clone()),
        Value::Null => Ok(Map::new()),
        other => Err(ExecutorError::InvalidArguments(format!(
            "arguments must be an object, got {other}"
        ))),
    }
}

/// Bind caller arguments into path/query/header/cookie/body locations.
///
/// Declared parameters bind per their recorded location; anything the tool
/// does not declare goes to the query string for GET/DELETE/HEAD/OPTIONS and
/// into the body object otherwise.
fn bind(
    tool: &ToolMeta,
    method: &str,
    template: &str,
    args: &Map<String, Value>,
    has_auth_provider: bool,
) -> Result<BoundRequest> {
    let mut bound = BoundRequest {
        path: template.to_string(),
        ..Default::default()
    };
    let mut body_object = Map::new();
    let mut whole_body: Option<Value> = None;

    for param in &tool.parameters {
        let value = match args.get(&param.name) {
            Some(value) => value,
            None if param.required => {
                return Err(ExecutorError::MissingParameter(param.name.clone()));
            }
            None => continue,
        };
        match param.location {
            ParameterLocation::Path => {
                let text = scalar_string(value);
                bound.path = tool_id::interpolate(&bound.path, &param.target, &text);
            }
            ParameterLocation::Query => {
                bound.query.push((param.target.clone(), query_string(value)));
            }
            ParameterLocation::Header => {
                let text = scalar_string(value);
                headers::validate_caller_header(&param.target, &text, has_auth_provider)?;
                bound.headers.push((param.target.clone(), text));
            }
            ParameterLocation::Cookie => {
                let text = scalar_string(value);
                headers::validate_cookie_value(&param.target, &text)?;
                bound.cookie_pairs.push((param.target.clone(), text));
            }
            ParameterLocation::Body => {
                body_object.insert(param.target.clone(), value.clone());
            }
            ParameterLocation::RawBody => {
                whole_body = Some(value.clone());
            }
        }
    }

    // Route anything the tool does not declare.
    let declared: HashSet<&str> = tool.parameters.iter().map(|p| p.name.as_str()).collect();
    let to_query = QUERY_METHODS.contains(&method);
    for (key, value) in args {
        if declared.contains(key.as_str()) {
            continue;
        }
        if to_query {
            bound.query.push((key.clone(), query_string(value)));
        } else if whole_body.is_none() {
            body_object.insert(key.clone(), value.clone());
        } else {
            warn!(argument = %key, "dropping undeclared argument, body is not an object");
        }
    }

    bound.body = whole_body.or_else(|| {
        if body_object.is_empty() {
            None
        } else {
            Some(Value::Object(body_object))
        }
    });
    Ok(bound)
}

/// Render a scalar argument for path/header/cookie binding.
fn scalar_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

/// Render a query argument; arrays comma-join their elements.
fn query_string(value: &Value) -> String {
    match value {
        Value::Array(items) => items
            .iter()
            .map(scalar_string)
            .collect::<Vec<_>>()
            .join(","),
        other => scalar_string(other),
    }
}

/// Pretty-print JSON bodies; pass anything else through.
fn prettify(body: String) -> String {
    match serde_json::from_str::<Value>(&body) {
        Ok(json) => serde_json::to_string_pretty(&json).unwrap_or(body),
        Err(_) => body,
    }
}
