//! Stdio transport: line-delimited JSON-RPC over stdin/stdout.
//!
//! Frames are newline-delimited JSON. Each request is dispatched on its own
//! task; a single writer task serialises responses onto stdout, so frames
//! are delivered whole in completion order (which is not required to match
//! submission order). Lines that fail to parse get a parse-error frame with
//! a null id, and processing continues. EOF on stdin is a clean shutdown.
//!
//! Logging must go to stderr; stdout carries nothing but frames.

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use restbridge_protocol::JsonRpcResponse;

use crate::dispatch::Dispatcher;
use crate::error::{Result, ServerError};

/// Upper bound on a single inbound frame.
const MAX_LINE_BYTES: usize = 10 * 1024 * 1024;

/// Run the transport over the current process's stdin/stdout.
pub async fn serve(dispatcher: Arc<Dispatcher>, shutdown: CancellationToken) -> Result<()> {
    serve_with_io(
        dispatcher,
        tokio::io::stdin(),
        tokio::io::stdout(),
        shutdown,
    )
    .await
}

/// Run the transport over arbitrary byte streams (tests drive this with an
/// in-memory duplex).
pub async fn serve_with_io<R, W>(
    dispatcher: Arc<Dispatcher>,
    input: R,
    output: W,
    shutdown: CancellationToken,
) -> Result<()>
where
    R: AsyncRead + Send + Unpin + 'static,
    W: AsyncWrite + Send + Unpin + 'static,
{
    let mut reader = FramedRead::new(
        BufReader::new(input),
        LinesCodec::new_with_max_length(MAX_LINE_BYTES),
    );

    // Single writer task: responses from concurrent request tasks are
    // funnelled through one channel so frames never interleave.
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let writer = tokio::spawn(async move {
        let mut sink = FramedWrite::new(output, LinesCodec::new());
        while let Some(frame) = rx.recv().await {
            if let Err(error) = sink.send(frame).await {
                warn!(%error, "failed to write response frame");
                break;
            }
        }
    });

    info!("stdio transport ready");
    loop {
        let line = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            line = reader.next() => line,
        };
        let line = match line {
            Some(Ok(line)) => line,
            Some(Err(error)) => {
                warn!(%error, "failed to read frame");
                let _ = tx.send(frame_string(&JsonRpcResponse::parse_error(
                    error.to_string(),
                )));
                continue;
            }
            None => {
                debug!("stdin closed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let raw: serde_json::Value = match serde_json::from_str(&line) {
            Ok(value) => value,
            Err(error) => {
                let _ = tx.send(frame_string(&JsonRpcResponse::parse_error(
                    error.to_string(),
                )));
                continue;
            }
        };

        let dispatcher = Arc::clone(&dispatcher);
        let tx = tx.clone();
        let cancel = shutdown.child_token();
        tokio::spawn(async move {
            if let Some(response) = dispatcher.handle_value(raw, &cancel).await {
                let _ = tx.send(frame_string(&response));
            }
        });
    }

    // Dropping the sender ends the writer once in-flight responses drain.
    drop(tx);
    writer
        .await
        .map_err(|e| ServerError::Transport(e.to_string()))?;
    info!("stdio transport stopped");
    Ok(())
}

fn frame_string(response: &JsonRpcResponse) -> String {
    serde_json::to_string(response).unwrap_or_else(|_| {
        r#"{"jsonrpc":"2.0","error":{"code":-32603,"message":"Internal error"},"id":null}"#
            .to_string()
    })
}
