//! Tracing initialization
//!
//! Logs always go to stderr; stdout carries the MCP stdio transport.

use tracing_subscriber::{prelude::*, EnvFilter};

/// Default filter directive for the given verbosity
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "mcp_python_executor=debug"
    } else {
        "mcp_python_executor=info"
    }
}

/// Initialize tracing. Call once at process startup.
///
/// `RUST_LOG` takes precedence over `verbose`.
pub fn init_tracing(verbose: bool, json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    let _ = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true),
            )
            .try_init()
    };
}
