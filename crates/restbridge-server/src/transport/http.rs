//! Streamable HTTP transport.
//!
//! One endpoint, three verbs, plus a sessionless health probe:
//!
//! - `POST /mcp` — JSON-RPC frames. `initialize` without a session header
//!   mints a session and returns its response directly (there is no stream
//!   yet); everything else requires a valid `Mcp-Session-Id`, dispatches on
//!   its own task, and the response is enqueued on the session's SSE sink
//!   or buffer.
//! - `GET /mcp` — attaches the session's SSE stream
//!   (`Accept: text/event-stream`).
//! - `DELETE /mcp` — terminates the session.
//! - `GET /health` — liveness.
//!
//! Gates, in order: origin allow-list (403, DNS-rebinding defence),
//! content type (415), session validity (400).

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use restbridge_protocol::{JsonRpcMessage, JsonRpcResponse};

use crate::dispatch::Dispatcher;
use crate::error::{Result, ServerError};
use crate::session::{DEFAULT_SESSION_TTL, SessionEvent, SessionManager};

/// Session id header name.
pub const SESSION_HEADER: &str = "Mcp-Session-Id";

/// How often idle sessions are swept.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// HTTP transport configuration.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Bind host.
    pub host: String,
    /// Bind port (0 picks an ephemeral port).
    pub port: u16,
    /// MCP endpoint path.
    pub path: String,
    /// Idle session TTL.
    pub session_ttl: Duration,
    /// Extra allowed `Origin` hosts (the bind host and the loopback names
    /// are always allowed).
    pub allowed_origins: Vec<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            path: "/mcp".to_string(),
            session_ttl: DEFAULT_SESSION_TTL,
            allowed_origins: Vec::new(),
        }
    }
}

#[derive(Clone)]
struct AppState {
    dispatcher: Arc<Dispatcher>,
    sessions: Arc<SessionManager>,
    config: Arc<HttpConfig>,
}

/// A bound, ready-to-serve HTTP transport.
pub struct HttpTransport {
    listener: tokio::net::TcpListener,
    local_addr: SocketAddr,
    app: Router,
    sessions: Arc<SessionManager>,
    shutdown: CancellationToken,
}

impl HttpTransport {
    /// Bind the listener and build the router. Binding before serving keeps
    /// the "registry ready before traffic" ordering observable.
    pub async fn bind(
        dispatcher: Arc<Dispatcher>,
        mut config: HttpConfig,
        shutdown: CancellationToken,
    ) -> Result<Self> {
        if !config.path.starts_with('/') {
            config.path = format!("/{}", config.path);
        }
        let sessions = Arc::new(SessionManager::new(config.session_ttl));
        let state = AppState {
            dispatcher,
            sessions: Arc::clone(&sessions),
            config: Arc::new(config.clone()),
        };
        let app = Router::new()
            .route(
                &config.path,
                post(mcp_post).get(mcp_get).delete(mcp_delete),
            )
            .route("/health", get(health))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port))
            .await
            .map_err(|e| ServerError::Transport(format!("bind failed: {e}")))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::Transport(e.to_string()))?;

        Ok(Self {
            listener,
            local_addr,
            app,
            sessions,
            shutdown,
        })
    }

    /// The address the transport is listening on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve until the shutdown token fires, then drain sessions (each
    /// attached stream gets a final `close` event).
    pub async fn serve(self) -> Result<()> {
        info!(addr = %self.local_addr, "streamable HTTP transport listening");

        let sweeper = tokio::spawn({
            let sessions = Arc::clone(&self.sessions);
            let shutdown = self.shutdown.clone();
            async move {
                let mut tick = tokio::time::interval(SWEEP_INTERVAL);
                loop {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tick.tick() => {
                            let swept = sessions.sweep();
                            if swept > 0 {
                                info!(swept, "expired idle sessions");
                            }
                        }
                    }
                }
            }
        });

        // Sessions must close as soon as shutdown fires: graceful shutdown
        // waits for open connections, and an attached SSE stream only ends
        // once its session sends the final close event.
        let closer = tokio::spawn({
            let sessions = Arc::clone(&self.sessions);
            let shutdown = self.shutdown.clone();
            async move {
                shutdown.cancelled().await;
                sessions.shutdown();
            }
        });

        let shutdown = self.shutdown.clone();
        axum::serve(self.listener, self.app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(|e| ServerError::Transport(e.to_string()))?;

        self.sessions.shutdown();
        sweeper.abort();
        closer.abort();
        info!("streamable HTTP transport stopped");
        Ok(())
    }
}

async fn health() -> Json<Value> {
    Json(json!({"status": "healthy"}))
}

async fn mcp_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(rejection) = check_origin(&state.config, &headers) {
        return rejection;
    }
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if !content_type.starts_with("application/json") {
        return (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Json(json!({"error": "Content-Type must be application/json"})),
        )
            .into_response();
    }

    let raw: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(error) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(
                    serde_json::to_value(JsonRpcResponse::parse_error(error.to_string()))
                        .unwrap_or_default(),
                ),
            )
                .into_response();
        }
    };
    let session_id = headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    match serde_json::from_value::<JsonRpcMessage>(raw.clone()) {
        // initialize is the only method allowed without a session; its
        // response travels in the POST body because no stream can exist yet.
        Ok(JsonRpcMessage::Request(request))
            if request.method == "initialize" && session_id.is_none() =>
        {
            let id = state.sessions.create();
            let cancel = state
                .sessions
                .request_token(&id)
                .unwrap_or_default();
            let response = state.dispatcher.handle_request(request, &cancel).await;

            let mut response_headers = HeaderMap::new();
            if let Ok(value) = HeaderValue::from_str(&id) {
                response_headers.insert(SESSION_HEADER, value);
            }
            (
                StatusCode::OK,
                response_headers,
                Json(serde_json::to_value(&response).unwrap_or_default()),
            )
                .into_response()
        }
        Ok(JsonRpcMessage::Request(request)) => {
            let Some(session_id) = valid_session(&state, session_id) else {
                return session_rejection();
            };
            let Some(cancel) = state.sessions.request_token(&session_id) else {
                return session_rejection();
            };
            let dispatcher = Arc::clone(&state.dispatcher);
            let sessions = Arc::clone(&state.sessions);
            tokio::spawn(async move {
                let response = dispatcher.handle_request(request, &cancel).await;
                match serde_json::to_string(&response) {
                    Ok(frame) => {
                        sessions.deliver(&session_id, frame);
                    }
                    Err(error) => warn!(%error, "failed to serialize response"),
                }
            });
            (StatusCode::OK, Json(json!({"status": "accepted"}))).into_response()
        }
        Ok(JsonRpcMessage::Notification(_)) => {
            let Some(session_id) = valid_session(&state, session_id) else {
                return session_rejection();
            };
            let cancel = state
                .sessions
                .request_token(&session_id)
                .unwrap_or_default();
            let _ = state.dispatcher.handle_value(raw, &cancel).await;
            StatusCode::ACCEPTED.into_response()
        }
        Ok(JsonRpcMessage::Response(_)) => {
            // This server never initiates requests; acknowledge and drop.
            StatusCode::ACCEPTED.into_response()
        }
        Err(error) => (
            StatusCode::BAD_REQUEST,
            Json(
                serde_json::to_value(JsonRpcResponse::parse_error(error.to_string()))
                    .unwrap_or_default(),
            ),
        )
            .into_response(),
    }
}

async fn mcp_get(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(rejection) = check_origin(&state.config, &headers) {
        return rejection;
    }
    let accept = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if !accept.contains("text/event-stream") && !accept.contains("*/*") {
        return StatusCode::NOT_ACCEPTABLE.into_response();
    }
    let session_id = headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let Some(session_id) = valid_session(&state, session_id) else {
        return session_rejection();
    };
    let Some(mut receiver) = state.sessions.attach_stream(&session_id) else {
        return session_rejection();
    };

    let stream = async_stream::stream! {
        while let Some(event) = receiver.recv().await {
            match event {
                SessionEvent::Message(data) => {
                    yield Ok::<Event, Infallible>(Event::default().event("message").data(data));
                }
                SessionEvent::Close => {
                    yield Ok(Event::default().event("close").data(""));
                    break;
                }
            }
        }
    };

    Sse::new(stream)
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(30)))
        .into_response()
}

async fn mcp_delete(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let session_id = headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if state.sessions.remove(session_id) {
        (StatusCode::OK, Json(json!({"status": "terminated"}))).into_response()
    } else {
        session_rejection()
    }
}

fn valid_session(state: &AppState, session_id: Option<String>) -> Option<String> {
    let session_id = session_id?;
    state.sessions.touch(&session_id).then_some(session_id)
}

fn session_rejection() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"error": "missing or unknown Mcp-Session-Id"})),
    )
        .into_response()
}

/// Origin allow-list check. Absent `Origin` headers pass (non-browser
/// clients); present ones must name an allowed host.
fn check_origin(config: &HttpConfig, headers: &HeaderMap) -> std::result::Result<(), Response> {
    let Some(origin) = headers.get(header::ORIGIN).and_then(|v| v.to_str().ok()) else {
        return Ok(());
    };
    if origin_allowed(config, origin) {
        Ok(())
    } else {
        warn!(origin, "rejecting request with disallowed origin");
        Err((
            StatusCode::FORBIDDEN,
            Json(json!({"error": "origin not allowed"})),
        )
            .into_response())
    }
}

fn origin_allowed(config: &HttpConfig, origin: &str) -> bool {
    let host = origin_host(origin);
    let allowed_host = |candidate: &str| {
        host.eq_ignore_ascii_case(candidate) || origin.eq_ignore_ascii_case(candidate)
    };
    allowed_host(&config.host)
        || allowed_host("localhost")
        || allowed_host("127.0.0.1")
        || allowed_host("[::1]")
        || config.allowed_origins.iter().any(|entry| allowed_host(entry))
}

/// Extract the host part of an origin, without scheme or port.
fn origin_host(origin: &str) -> String {
    let rest = origin.split_once("://").map_or(origin, |(_, rest)| rest);
    let rest = rest.split('/').next().unwrap_or(rest);
    if let Some(stripped) = rest.strip_prefix('[') {
        // IPv6 literal: keep the brackets, drop the port.
        return match stripped.split_once(']') {
            Some((host, _)) => format!("[{host}]"),
            None => rest.to_string(),
        };
    }
    rest.split(':').next().unwrap_or(rest).to_string()
}
