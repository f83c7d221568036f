//! # OpenAPI ingestion and tool synthesis
//!
//! Load an OpenAPI 3.x description from a URL, file, stdin, or an inline
//! string, resolve `$ref`/`allOf` (cycles break to `{}`), and project every
//! operation into an MCP tool with a stable, decodable identifier and an
//! abbreviated display name.
//!
//! ```rust,ignore
//! use restbridge_openapi::{Abbreviator, SpecSource, synthesize};
//!
//! let doc = SpecSource::Url("https://petstore3.swagger.io/api/v3/openapi.json".into())
//!     .load()
//!     .await?;
//! let catalog = synthesize(&doc, &Abbreviator::new())?;
//! for tool in &catalog.tools {
//!     println!("{} -> {} {}", tool.name, tool.http_method, tool.original_path);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod abbreviate;
mod error;
mod filter;
mod resolver;
mod source;
mod synth;
pub mod tool_id;

pub use abbreviate::{Abbreviator, MAX_NAME_LENGTH};
pub use error::{OpenApiError, Result};
pub use filter::{ToolFilter, ToolsMode};
pub use resolver::resolve;
pub use source::{SpecSource, parse_document};
pub use synth::{
    Catalog, PARAMETER_LOCATION_KEY, ParameterLocation, ParameterMeta, ToolMeta, synthesize,
};
