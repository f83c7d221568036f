//! Transports: stdio and streamable HTTP.

pub mod http;
pub mod stdio;

pub use http::{HttpConfig, HttpTransport, SESSION_HEADER};
pub use stdio::{serve as serve_stdio, serve_with_io as serve_stdio_with_io};
