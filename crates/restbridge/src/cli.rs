//! Command-line surface.

use clap::{ArgGroup, Parser, ValueEnum};

/// Expose any OpenAPI 3.x API as MCP tools.
#[derive(Parser, Debug)]
#[command(
    name = "restbridge",
    version,
    about = "Expose any OpenAPI 3.x API as MCP tools over stdio or streamable HTTP",
    group(
        ArgGroup::new("spec")
            .required(true)
            .args(["openapi_spec", "spec_from_stdin", "spec_inline"])
    )
)]
pub struct Cli {
    /// Transport to serve.
    #[arg(long, value_enum, default_value = "stdio")]
    pub transport: TransportKind,

    /// HTTP bind port.
    #[arg(long, default_value_t = 3000)]
    pub port: u16,

    /// HTTP bind host.
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// HTTP endpoint path.
    #[arg(long, default_value = "/mcp")]
    pub path: String,

    /// Base URL requests are issued against; falls back to the spec's first
    /// `servers` entry.
    #[arg(long, env = "API_BASE_URL")]
    pub api_base_url: Option<String>,

    /// OpenAPI spec location: a file path or an http(s) URL.
    #[arg(long, env = "OPENAPI_SPEC_PATH")]
    pub openapi_spec: Option<String>,

    /// Read the spec from stdin (drained to EOF).
    #[arg(long)]
    pub spec_from_stdin: bool,

    /// Pass the spec verbatim on the command line.
    #[arg(long)]
    pub spec_inline: Option<String>,

    /// Server name advertised on initialize.
    #[arg(long, env = "SERVER_NAME", default_value = "restbridge")]
    pub name: String,

    /// Static auth headers, comma-separated `Name:Value` pairs.
    #[arg(long)]
    pub headers: Option<String>,

    /// Tool exposure mode.
    #[arg(long = "tools", value_enum, default_value = "all")]
    pub tools: ToolsModeArg,

    /// Tool ids or names to include (repeatable).
    #[arg(long = "tool")]
    pub tool: Vec<String>,

    /// OpenAPI tags to include (repeatable).
    #[arg(long = "tag")]
    pub tag: Vec<String>,

    /// Path prefixes to include (repeatable).
    #[arg(long = "resource")]
    pub resource: Vec<String>,

    /// HTTP methods to include (repeatable).
    #[arg(long = "operation")]
    pub operation: Vec<String>,

    /// Skip name abbreviation; operation ids violating the MCP name
    /// constraints then fail at startup.
    #[arg(long)]
    pub disable_abbreviation: bool,

    /// Idle session TTL in seconds (HTTP transport).
    #[arg(long, default_value_t = 900)]
    pub session_ttl_secs: u64,

    /// Extra allowed Origin hosts (repeatable; HTTP transport).
    #[arg(long = "allowed-origin")]
    pub allowed_origin: Vec<String>,

    /// Log filter, e.g. `info` or `restbridge=debug` (RUST_LOG overrides).
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// Which transport to serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TransportKind {
    /// Line-delimited JSON-RPC over stdin/stdout.
    Stdio,
    /// Streamable HTTP with SSE fan-out.
    Http,
}

/// Tool exposure mode (mirrors the registry modes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ToolsModeArg {
    /// Every synthesised tool, subject to the include filters.
    All,
    /// The three meta-tools only.
    Dynamic,
    /// Exactly the tools named by `--tool`.
    Explicit,
}
