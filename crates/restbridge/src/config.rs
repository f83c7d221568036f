//! CLI → runtime configuration.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde_json::Value;

use restbridge_openapi::{Abbreviator, SpecSource, ToolFilter, ToolsMode};
use restbridge_protocol::Implementation;
use restbridge_server::HttpConfig;

use crate::cli::{Cli, ToolsModeArg, TransportKind};

/// Everything main() needs, derived from flags and environment.
#[derive(Debug)]
pub struct ServerConfig {
    /// Where the spec comes from.
    pub spec_source: SpecSource,
    /// `--api-base-url` / `API_BASE_URL`, if given.
    pub base_url: Option<String>,
    /// Registry filtering.
    pub filter: ToolFilter,
    /// Name abbreviation switch.
    pub abbreviator: Abbreviator,
    /// Static auth headers from `--headers`.
    pub static_headers: HashMap<String, String>,
    /// Which transport to serve.
    pub transport: TransportKind,
    /// HTTP transport settings.
    pub http: HttpConfig,
    /// Advertised server identity.
    pub server_info: Implementation,
}

impl ServerConfig {
    /// Validate and convert parsed CLI arguments.
    pub fn from_cli(cli: Cli) -> Result<Self> {
        let spec_source = if let Some(spec) = &cli.openapi_spec {
            if spec.starts_with("http://") || spec.starts_with("https://") {
                SpecSource::Url(spec.clone())
            } else {
                SpecSource::File(PathBuf::from(spec))
            }
        } else if cli.spec_from_stdin {
            SpecSource::Stdin
        } else if let Some(inline) = &cli.spec_inline {
            SpecSource::Inline(inline.clone())
        } else {
            // clap's ArgGroup guarantees one of the three.
            bail!("no OpenAPI spec source given");
        };

        let filter = ToolFilter {
            mode: match cli.tools {
                ToolsModeArg::All => ToolsMode::All,
                ToolsModeArg::Dynamic => ToolsMode::Dynamic,
                ToolsModeArg::Explicit => ToolsMode::Explicit,
            },
            include_tools: cli.tool,
            include_operations: cli.operation,
            include_resources: cli.resource,
            include_tags: cli.tag,
        };

        let abbreviator = if cli.disable_abbreviation {
            Abbreviator::disabled()
        } else {
            Abbreviator::new()
        };

        let static_headers = match &cli.headers {
            Some(raw) => parse_headers(raw)?,
            None => HashMap::new(),
        };

        let http = HttpConfig {
            host: cli.host,
            port: cli.port,
            path: cli.path,
            session_ttl: Duration::from_secs(cli.session_ttl_secs),
            allowed_origins: cli.allowed_origin,
        };

        Ok(Self {
            spec_source,
            base_url: cli.api_base_url,
            filter,
            abbreviator,
            static_headers,
            transport: cli.transport,
            http,
            server_info: Implementation::new(cli.name, env!("CARGO_PKG_VERSION")),
        })
    }

    /// Resolve the upstream base URL: the flag wins, otherwise the spec's
    /// first `servers` entry.
    pub fn resolve_base_url(&self, doc: &Value) -> Result<String> {
        if let Some(base) = &self.base_url {
            return Ok(base.clone());
        }
        doc.pointer("/servers/0/url")
            .and_then(Value::as_str)
            .map(str::to_string)
            .context(
                "no --api-base-url given and the spec declares no servers; \
                 pass --api-base-url explicitly",
            )
    }
}

/// Parse `Name:Value,Name2:Value2` into a header map.
fn parse_headers(raw: &str) -> Result<HashMap<String, String>> {
    let mut headers = HashMap::new();
    for pair in raw.split(',') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let (name, value) = pair
            .split_once(':')
            .with_context(|| format!("header {pair:?} is not in Name:Value form"))?;
        let name = name.trim();
        if name.is_empty() {
            bail!("header {pair:?} has an empty name");
        }
        headers.insert(name.to_string(), value.trim().to_string());
    }
    Ok(headers)
}
