//! MCP server launcher
//!
//! Starts the MCP server over stdio.

use std::sync::Arc;

use anyhow::{Context, Result};
use rmcp::ServiceExt;
use tokio::io::{stdin, stdout};

use crate::config::Config;
use crate::environment::{EnvManager, UvCli};
use crate::mcp::PythonExecutorServer;

/// Run the MCP server over stdio until the client disconnects.
///
/// # Arguments
/// * `config` - Resolved configuration
///
/// # Returns
/// * `Ok(())` - Server ran successfully and was shut down
/// * `Err(e)` - Server failed to start or encountered an error
pub async fn run_mcp_server(config: &Config) -> Result<()> {
    let uv = UvCli::new(&config.uv);
    if !uv.is_available() {
        tracing::warn!(
            "'{}' not found on PATH; every tool call will fail until uv is installed",
            uv.command()
        );
    }

    let manager = EnvManager::with_backend(config, Arc::new(uv));
    manager
        .init_storage()
        .with_context(|| format!("Failed to create {}", manager.envs_dir().display()))?;
    tracing::info!(
        "Serving environments from {} over stdio",
        manager.envs_dir().display()
    );

    let server = PythonExecutorServer::new(Arc::new(manager));

    let transport = (stdin(), stdout());
    let service = server.serve(transport).await?;
    service.waiting().await?;

    Ok(())
}
