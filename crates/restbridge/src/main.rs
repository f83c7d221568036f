//! restbridge: serve an OpenAPI 3.x API as MCP tools.

mod cli;
mod config;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use restbridge_executor::{AuthProvider, ExecutorConfig, RequestExecutor, StaticAuthProvider};
use restbridge_openapi::synthesize;
use restbridge_server::{
    Dispatcher, HttpTransport, PromptStore, ResourceStore, ToolRegistry, serve_stdio,
};

use crate::cli::{Cli, TransportKind};
use crate::config::ServerConfig;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // stdout belongs to the stdio transport; all diagnostics go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.log_level.clone())),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(error) = run(cli).await {
        error!(error = %format!("{error:#}"), "startup failed");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = ServerConfig::from_cli(cli)?;

    let document = config
        .spec_source
        .load()
        .await
        .context("failed to load OpenAPI spec")?;
    let base_url = config.resolve_base_url(&document)?;
    let catalog =
        synthesize(&document, &config.abbreviator).context("failed to synthesise tools")?;
    info!(
        title = %catalog.title,
        version = %catalog.version,
        operations = catalog.tools.len(),
        base_url = %base_url,
        "OpenAPI spec loaded"
    );

    let auth: Option<Arc<dyn AuthProvider>> = if config.static_headers.is_empty() {
        None
    } else {
        Some(Arc::new(StaticAuthProvider::new(
            config.static_headers.clone(),
        )))
    };
    let executor = Arc::new(
        RequestExecutor::new(
            ExecutorConfig::new(base_url).with_cookies(catalog.has_cookie_params),
            auth,
        )
        .context("failed to build outbound client")?,
    );

    let registry = Arc::new(ToolRegistry::new(catalog, &config.filter));
    info!(tools = registry.list_tools().len(), mode = ?registry.mode(), "tool registry ready");

    let dispatcher = Arc::new(Dispatcher::new(
        registry,
        executor,
        Arc::new(PromptStore::new()),
        Arc::new(ResourceStore::new()),
        config.server_info.clone(),
    ));

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown signal received");
                shutdown.cancel();
            }
        }
    });

    match config.transport {
        TransportKind::Stdio => serve_stdio(dispatcher, shutdown)
            .await
            .context("stdio transport failed")?,
        TransportKind::Http => {
            let transport = HttpTransport::bind(dispatcher, config.http.clone(), shutdown)
                .await
                .context("failed to bind HTTP transport")?;
            transport.serve().await.context("HTTP transport failed")?;
        }
    }
    Ok(())
}
