//! CLI module for mcp-python-executor
//!
//! Provides command-line interface with the following subcommands:
//! - `mcp` - Start MCP server over stdio (default)
//! - `envs` / `create` / `delete` / `clean` - Environment lifecycle
//! - `exec` - Run Python code in an environment
//! - `files` / `read` - Inspect environment files
//! - `install` / `remove` / `packages` - Manage dependencies
//! - `config` - Show configuration

pub mod commands;
pub mod mcp;

pub use commands::{Cli, Commands, OutputFormat};
pub use mcp::run_mcp_server;
