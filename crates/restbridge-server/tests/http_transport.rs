//! Streamable HTTP transport tests against a live listener.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use restbridge_executor::{ExecutorConfig, RequestExecutor};
use restbridge_openapi::{Abbreviator, ToolFilter, synthesize};
use restbridge_protocol::Implementation;
use restbridge_server::{
    Dispatcher, HttpConfig, HttpTransport, PromptStore, ResourceStore, SESSION_HEADER,
    ToolRegistry,
};

struct TestServer {
    base: String,
    shutdown: CancellationToken,
    client: reqwest::Client,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn start_server(upstream: &str) -> TestServer {
    let doc = json!({
        "openapi": "3.0.0",
        "info": {"title": "t", "version": "1"},
        "paths": {
            "/pets": {
                "get": {"operationId": "listPets",
                        "responses": {"200": {"description": "ok"}}}
            }
        }
    });
    let catalog = synthesize(&doc, &Abbreviator::new()).unwrap();
    let registry = Arc::new(ToolRegistry::new(catalog, &ToolFilter::default()));
    let executor =
        Arc::new(RequestExecutor::new(ExecutorConfig::new(upstream), None).unwrap());
    let dispatcher = Arc::new(Dispatcher::new(
        registry,
        executor,
        Arc::new(PromptStore::new()),
        Arc::new(ResourceStore::new()),
        Implementation::new("restbridge-test", "0.0.0"),
    ));

    let shutdown = CancellationToken::new();
    let transport = HttpTransport::bind(
        dispatcher,
        HttpConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            ..Default::default()
        },
        shutdown.clone(),
    )
    .await
    .unwrap();
    let base = format!("http://{}", transport.local_addr());
    tokio::spawn(transport.serve());

    TestServer {
        base,
        shutdown,
        client: reqwest::Client::new(),
    }
}

fn initialize_frame() -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": "init-1",
        "method": "initialize",
        "params": {
            "protocolVersion": "2024-11-05",
            "capabilities": {},
            "clientInfo": {"name": "test-client", "version": "1.0.0"}
        }
    })
}

async fn open_session(server: &TestServer) -> String {
    let response = server
        .client
        .post(format!("{}/mcp", server.base))
        .json(&initialize_frame())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let session = response
        .headers()
        .get(SESSION_HEADER)
        .expect("initialize must set a session header")
        .to_str()
        .unwrap()
        .to_string();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["result"]["serverInfo"]["name"], json!("restbridge-test"));
    session
}

#[tokio::test]
async fn health_needs_no_session() {
    let server = start_server("http://127.0.0.1:1").await;
    let response = server
        .client
        .get(format!("{}/health", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"status": "healthy"}));
}

#[tokio::test]
async fn session_lifecycle_initialize_use_delete() {
    let server = start_server("http://127.0.0.1:1").await;
    let session = open_session(&server).await;

    // POST with a valid session is accepted.
    let response = server
        .client
        .post(format!("{}/mcp", server.base))
        .header(SESSION_HEADER, &session)
        .json(&json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    // DELETE terminates it.
    let response = server
        .client
        .delete(format!("{}/mcp", server.base))
        .header(SESSION_HEADER, &session)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    // The id is dead afterwards.
    let response = server
        .client
        .post(format!("{}/mcp", server.base))
        .header(SESSION_HEADER, &session)
        .json(&json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn non_initialize_without_session_is_rejected() {
    let server = start_server("http://127.0.0.1:1").await;
    let response = server
        .client
        .post(format!("{}/mcp", server.base))
        .json(&json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn wrong_content_type_is_415() {
    let server = start_server("http://127.0.0.1:1").await;
    let response = server
        .client
        .post(format!("{}/mcp", server.base))
        .header("Content-Type", "text/plain")
        .body("{}")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 415);
}

#[tokio::test]
async fn foreign_origin_is_403() {
    let server = start_server("http://127.0.0.1:1").await;
    let response = server
        .client
        .post(format!("{}/mcp", server.base))
        .header("Origin", "https://evil.example.com")
        .json(&initialize_frame())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);

    // Loopback origins pass.
    let response = server
        .client
        .post(format!("{}/mcp", server.base))
        .header("Origin", "http://localhost:3000")
        .json(&initialize_frame())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn sse_stream_delivers_buffered_responses() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"name": "rex"}])))
        .mount(&upstream)
        .await;

    let server = start_server(&upstream.uri()).await;
    let session = open_session(&server).await;

    // Fire a tools/call; with no stream attached the response is buffered.
    let response = server
        .client
        .post(format!("{}/mcp", server.base))
        .header(SESSION_HEADER, &session)
        .json(&json!({
            "jsonrpc": "2.0",
            "id": "call-1",
            "method": "tools/call",
            "params": {"name": "list-pets", "arguments": {}}
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    // Attach the stream; the buffered response must flush into it.
    let mut stream = server
        .client
        .get(format!("{}/mcp", server.base))
        .header(SESSION_HEADER, &session)
        .header("Accept", "text/event-stream")
        .send()
        .await
        .unwrap();
    assert_eq!(stream.status(), 200);

    let collected = tokio::time::timeout(Duration::from_secs(10), async {
        let mut collected = String::new();
        while let Some(chunk) = stream.chunk().await.unwrap() {
            collected.push_str(&String::from_utf8_lossy(&chunk));
            if collected.contains("call-1") {
                break;
            }
        }
        collected
    })
    .await
    .expect("response did not arrive on the SSE stream");

    assert!(collected.contains("event: message"));
    assert!(collected.contains("rex"));
    assert!(!collected.contains("\"isError\""));
}

#[tokio::test]
async fn sse_requires_event_stream_accept() {
    let server = start_server("http://127.0.0.1:1").await;
    let session = open_session(&server).await;
    let response = server
        .client
        .get(format!("{}/mcp", server.base))
        .header(SESSION_HEADER, &session)
        .header("Accept", "application/json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 406);
}

#[tokio::test]
async fn delete_with_unknown_session_is_400() {
    let server = start_server("http://127.0.0.1:1").await;
    let response = server
        .client
        .delete(format!("{}/mcp", server.base))
        .header(SESSION_HEADER, "mcp-deadbeefdeadbeefdeadbeefdeadbeef")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn notifications_are_accepted_without_response() {
    let server = start_server("http://127.0.0.1:1").await;
    let session = open_session(&server).await;
    let response = server
        .client
        .post(format!("{}/mcp", server.base))
        .header(SESSION_HEADER, &session)
        .json(&json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 202);
}
