//! Wire-level executor tests against a mock upstream.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use restbridge_executor::{
    AuthError, AuthProvider, ExecutorConfig, ExecutorError, REDACTED_AUTH_BODY, RequestExecutor,
    StaticAuthProvider,
};
use restbridge_openapi::{Abbreviator, Catalog, ToolMeta, synthesize};

fn catalog() -> Catalog {
    let doc = json!({
        "openapi": "3.0.0",
        "info": {"title": "Test", "version": "1.0.0"},
        "paths": {
            "/search": {
                "get": {
                    "operationId": "search",
                    "parameters": [
                        {"name": "tags", "in": "query",
                         "schema": {"type": "array", "items": {"type": "string"}}},
                        {"name": "categories", "in": "query",
                         "schema": {"type": "array", "items": {"type": "integer"}}}
                    ],
                    "responses": {"200": {"description": "ok"}}
                }
            },
            "/items/{id}": {
                "post": {
                    "operationId": "updateItem",
                    "parameters": [
                        {"name": "id", "in": "path", "required": true,
                         "schema": {"type": "string"}}
                    ],
                    "requestBody": {
                        "required": true,
                        "content": {"application/json": {"schema": {
                            "type": "object",
                            "properties": {
                                "id": {"type": "string"},
                                "value": {"type": "string"}
                            },
                            "required": ["value"]
                        }}}
                    },
                    "responses": {"200": {"description": "ok"}}
                }
            },
            "/secure": {
                "get": {
                    "operationId": "secureThing",
                    "responses": {"200": {"description": "ok"}}
                }
            },
            "/traced": {
                "get": {
                    "operationId": "traced",
                    "parameters": [
                        {"name": "X-Api-Key", "in": "header",
                         "schema": {"type": "string"}}
                    ],
                    "responses": {"200": {"description": "ok"}}
                }
            },
            "/session": {
                "get": {
                    "operationId": "whoAmI",
                    "parameters": [
                        {"name": "sid", "in": "cookie", "schema": {"type": "string"}}
                    ],
                    "responses": {"200": {"description": "ok"}}
                }
            }
        }
    });
    synthesize(&doc, &Abbreviator::new()).unwrap()
}

fn tool(catalog: &Catalog, path: &str, method: &str) -> ToolMeta {
    catalog.find_operation(path, Some(method)).unwrap().clone()
}

fn executor(base_url: &str, auth: Option<Arc<dyn AuthProvider>>) -> RequestExecutor {
    RequestExecutor::new(ExecutorConfig::new(base_url), auth).unwrap()
}

/// Provider that counts header fetches and answers 401s as instructed.
struct RetryingProvider {
    retry: bool,
    header_fetches: AtomicUsize,
}

impl RetryingProvider {
    fn new(retry: bool) -> Self {
        Self {
            retry,
            header_fetches: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl AuthProvider for RetryingProvider {
    async fn auth_headers(&self) -> Result<HashMap<String, String>, AuthError> {
        self.header_fetches.fetch_add(1, Ordering::SeqCst);
        let mut headers = HashMap::new();
        headers.insert("Authorization".to_string(), "Bearer token".to_string());
        Ok(headers)
    }

    async fn handle_auth_error(&self, _status: u16) -> Result<bool, AuthError> {
        Ok(self.retry)
    }
}

#[tokio::test]
async fn get_with_query_arrays_comma_joins() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("tags", "a,b"))
        .and(query_param("categories", "1,2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"hits": 3})))
        .expect(1)
        .mount(&server)
        .await;

    let catalog = catalog();
    let result = executor(&server.uri(), None)
        .execute(
            &tool(&catalog, "/search", "GET"),
            &json!({"tags": ["a", "b"], "categories": [1, 2]}),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert!(result.contains("\"hits\": 3"));
}

#[tokio::test]
async fn post_binds_path_and_object_body_with_collision() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/items/abc"))
        .and(body_json(json!({"id": "xyz", "value": "v"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let catalog = catalog();
    executor(&server.uri(), None)
        .execute(
            &tool(&catalog, "/items/{id}", "POST"),
            &json!({"id": "abc", "body_id": "xyz", "value": "v"}),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn auth_retry_happens_exactly_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/secure"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "bad token"})))
        .expect(2)
        .mount(&server)
        .await;

    let provider = Arc::new(RetryingProvider::new(true));
    let catalog = catalog();
    let err = executor(&server.uri(), Some(provider.clone()))
        .execute(
            &tool(&catalog, "/secure", "GET"),
            &json!({}),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    // Two outbound attempts means two fresh header fetches.
    assert_eq!(provider.header_fetches.load(Ordering::SeqCst), 2);
    let text = err.to_string();
    assert!(text.contains(REDACTED_AUTH_BODY));
    assert!(!text.contains("bad token"));
}

#[tokio::test]
async fn no_retry_when_provider_declines() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/secure"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"err": "x"})))
        .expect(1)
        .mount(&server)
        .await;

    let provider = Arc::new(RetryingProvider::new(false));
    let catalog = catalog();
    let err = executor(&server.uri(), Some(provider))
        .execute(
            &tool(&catalog, "/secure", "GET"),
            &json!({}),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    let text = err.to_string();
    assert!(text.contains(REDACTED_AUTH_BODY));
    assert!(!text.contains("\"x\""));
}

#[tokio::test]
async fn forbidden_is_redacted_without_provider() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/secure"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden detail"))
        .expect(1)
        .mount(&server)
        .await;

    let catalog = catalog();
    let err = executor(&server.uri(), None)
        .execute(
            &tool(&catalog, "/secure", "GET"),
            &json!({}),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    let text = err.to_string();
    assert!(text.contains(REDACTED_AUTH_BODY));
    assert!(!text.contains("forbidden detail"));
}

#[tokio::test]
async fn long_error_bodies_are_truncated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/secure"))
        .respond_with(ResponseTemplate::new(500).set_body_string("e".repeat(4000)))
        .mount(&server)
        .await;

    let catalog = catalog();
    let err = executor(&server.uri(), None)
        .execute(
            &tool(&catalog, "/secure", "GET"),
            &json!({}),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    let ExecutorError::Upstream { status, body } = err else {
        panic!("expected upstream error");
    };
    assert_eq!(status, 500);
    assert!(body.ends_with("… [truncated]"));
    assert!(body.chars().count() < 1100);
}

#[tokio::test]
async fn auth_headers_are_injected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/secure"))
        .and(header("Authorization", "Bearer static-token"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let mut headers = HashMap::new();
    headers.insert("Authorization".to_string(), "Bearer static-token".to_string());
    let provider: Arc<dyn AuthProvider> = Arc::new(StaticAuthProvider::new(headers));

    let catalog = catalog();
    executor(&server.uri(), Some(provider))
        .execute(
            &tool(&catalog, "/secure", "GET"),
            &json!({}),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn caller_header_colliding_with_provider_is_rejected() {
    let server = MockServer::start().await;
    // No expectation mounted: a blocked call must never reach the network.

    let mut headers = HashMap::new();
    headers.insert("X-Api-Key".to_string(), "provider-key".to_string());
    let provider: Arc<dyn AuthProvider> = Arc::new(StaticAuthProvider::new(headers));

    let catalog = catalog();
    let err = executor(&server.uri(), Some(provider))
        .execute(
            &tool(&catalog, "/traced", "GET"),
            &json!({"X-Api-Key": "caller-key"}),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutorError::AuthHeaderConflict(_)));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn cookie_parameters_build_a_cookie_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/session"))
        .and(header("Cookie", "sid=abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let catalog = catalog();
    let config = ExecutorConfig::new(server.uri()).with_cookies(catalog.has_cookie_params);
    RequestExecutor::new(config, None)
        .unwrap()
        .execute(
            &tool(&catalog, "/session", "GET"),
            &json!({"sid": "abc123"}),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn non_json_success_bodies_pass_through() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/secure"))
        .respond_with(ResponseTemplate::new(200).set_body_string("plain text"))
        .mount(&server)
        .await;

    let catalog = catalog();
    let result = executor(&server.uri(), None)
        .execute(
            &tool(&catalog, "/secure", "GET"),
            &json!({}),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(result, "plain text");
}

#[tokio::test]
async fn cancelled_requests_abort() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/secure"))
        .respond_with(
            ResponseTemplate::new(200).set_delay(std::time::Duration::from_secs(30)),
        )
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    let catalog = catalog();
    let exec = executor(&server.uri(), None);
    let tool = tool(&catalog, "/secure", "GET");

    let handle = tokio::spawn({
        let cancel = cancel.clone();
        async move { exec.execute(&tool, &json!({}), &cancel).await }
    });
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    cancel.cancel();

    let err = handle.await.unwrap().unwrap_err();
    assert!(matches!(err, ExecutorError::Cancelled));
}
