//! Stdio transport tests over an in-memory duplex.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;

use restbridge_executor::{ExecutorConfig, RequestExecutor};
use restbridge_openapi::{Abbreviator, ToolFilter, synthesize};
use restbridge_protocol::Implementation;
use restbridge_server::{
    Dispatcher, PromptStore, ResourceStore, ToolRegistry, serve_stdio_with_io,
};

fn dispatcher() -> Arc<Dispatcher> {
    let doc = json!({
        "openapi": "3.0.0",
        "info": {"title": "Petstore", "version": "1.0.0"},
        "paths": {
            "/pet/{petId}": {
                "get": {
                    "operationId": "getPetById",
                    "parameters": [
                        {"name": "petId", "in": "path", "required": true,
                         "schema": {"type": "integer"}}
                    ],
                    "responses": {"200": {"description": "ok"}}
                }
            }
        }
    });
    let catalog = synthesize(&doc, &Abbreviator::new()).unwrap();
    let registry = Arc::new(ToolRegistry::new(catalog, &ToolFilter::default()));
    let executor = Arc::new(
        RequestExecutor::new(ExecutorConfig::new("http://127.0.0.1:1"), None).unwrap(),
    );
    Arc::new(Dispatcher::new(
        registry,
        executor,
        Arc::new(PromptStore::new()),
        Arc::new(ResourceStore::new()),
        Implementation::new("petstore-mcp-server", "1.0.0"),
    ))
}

/// Drive the transport with the given input lines and collect `expected`
/// response frames.
async fn run_frames(lines: &[Value], expected: usize) -> Vec<Value> {
    let (mut stdin_tx, stdin_rx) = tokio::io::duplex(64 * 1024);
    let (stdout_tx, stdout_rx) = tokio::io::duplex(64 * 1024);

    let shutdown = CancellationToken::new();
    let server = tokio::spawn(serve_stdio_with_io(
        dispatcher(),
        stdin_rx,
        stdout_tx,
        shutdown.clone(),
    ));

    for line in lines {
        let mut frame = serde_json::to_string(line).unwrap();
        frame.push('\n');
        stdin_tx.write_all(frame.as_bytes()).await.unwrap();
    }

    let mut reader = BufReader::new(stdout_rx);
    let mut frames = Vec::new();
    for _ in 0..expected {
        let mut line = String::new();
        tokio::time::timeout(Duration::from_secs(10), reader.read_line(&mut line))
            .await
            .expect("timed out waiting for a response frame")
            .unwrap();
        frames.push(serde_json::from_str(&line).unwrap());
    }

    // EOF on stdin is a clean shutdown.
    drop(stdin_tx);
    tokio::time::timeout(Duration::from_secs(10), server)
        .await
        .expect("transport did not stop on EOF")
        .unwrap()
        .unwrap();
    frames
}

fn frame_by_id<'a>(frames: &'a [Value], id: &str) -> &'a Value {
    frames
        .iter()
        .find(|frame| frame["id"] == json!(id))
        .unwrap_or_else(|| panic!("no frame with id {id}"))
}

#[tokio::test]
async fn initialize_then_list_then_call() {
    let frames = run_frames(
        &[
            json!({
                "jsonrpc": "2.0", "id": "init-1", "method": "initialize",
                "params": {
                    "protocolVersion": "2024-11-05",
                    "capabilities": {},
                    "clientInfo": {"name": "test-client", "version": "1.0.0"}
                }
            }),
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
            json!({"jsonrpc": "2.0", "id": "list-1", "method": "tools/list"}),
            json!({
                "jsonrpc": "2.0", "id": "call-1", "method": "tools/call",
                "params": {"name": "getPetById", "arguments": {}}
            }),
        ],
        3,
    )
    .await;

    let init = frame_by_id(&frames, "init-1");
    assert_eq!(
        init["result"]["serverInfo"]["name"],
        json!("petstore-mcp-server")
    );

    let list = frame_by_id(&frames, "list-1");
    let tools = list["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0]["name"], json!("get-pet-by-id"));
    assert_eq!(tools[0]["inputSchema"]["type"], json!("object"));

    // Missing required path parameter: an isError result, not a transport
    // error.
    let call = frame_by_id(&frames, "call-1");
    assert_eq!(call["result"]["isError"], json!(true));
    let text = call["result"]["content"][0]["text"].as_str().unwrap();
    assert!(text.contains("petId"));
}

#[tokio::test]
async fn call_by_tool_id_resolves() {
    let frames = run_frames(
        &[json!({
            "jsonrpc": "2.0", "id": "call-2", "method": "tools/call",
            "params": {"id": "GET::pet__---petId", "arguments": {"petId": 10}}
        })],
        1,
    )
    .await;
    // Lookup by id worked; the upstream port is closed so the execution
    // itself fails inside the envelope.
    let call = frame_by_id(&frames, "call-2");
    assert_eq!(call["result"]["isError"], json!(true));
}

#[tokio::test]
async fn malformed_line_gets_parse_error_and_processing_continues() {
    let (mut stdin_tx, stdin_rx) = tokio::io::duplex(64 * 1024);
    let (stdout_tx, stdout_rx) = tokio::io::duplex(64 * 1024);
    let shutdown = CancellationToken::new();
    let server = tokio::spawn(serve_stdio_with_io(
        dispatcher(),
        stdin_rx,
        stdout_tx,
        shutdown.clone(),
    ));

    stdin_tx.write_all(b"this is not json\n").await.unwrap();
    stdin_tx
        .write_all(
            format!(
                "{}\n",
                json!({"jsonrpc": "2.0", "id": "after", "method": "tools/list"})
            )
            .as_bytes(),
        )
        .await
        .unwrap();

    let mut reader = BufReader::new(stdout_rx);
    let mut first = String::new();
    reader.read_line(&mut first).await.unwrap();
    let first: Value = serde_json::from_str(&first).unwrap();
    assert_eq!(first["error"]["code"], json!(-32700));
    assert_eq!(first["id"], Value::Null);

    let mut second = String::new();
    reader.read_line(&mut second).await.unwrap();
    let second: Value = serde_json::from_str(&second).unwrap();
    assert_eq!(second["id"], json!("after"));
    assert!(second["result"]["tools"].is_array());

    drop(stdin_tx);
    tokio::time::timeout(Duration::from_secs(10), server)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn unknown_tool_is_a_jsonrpc_error_reply() {
    let frames = run_frames(
        &[json!({
            "jsonrpc": "2.0", "id": "missing", "method": "tools/call",
            "params": {"name": "no-such-tool", "arguments": {}}
        })],
        1,
    )
    .await;
    let reply = frame_by_id(&frames, "missing");
    assert_eq!(reply["error"]["code"], json!(-32001));
    assert!(
        reply["error"]["message"]
            .as_str()
            .unwrap()
            .contains("no-such-tool")
    );
}
