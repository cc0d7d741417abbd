//! mcp-python-executor - Persistent Python environments over MCP
//!
//! Each environment is a uv project under `~/.mcp-python-executor/envs/<env_id>`
//! that survives across tool calls, so a client can install packages once,
//! write files, run code repeatedly and read back the results.
//!
//! ## Features
//!
//! - Lazy environment creation on first use
//! - Per-environment serialization of operations
//! - Path containment for every client-supplied filename
//! - Images returned as MCP image content, other files as text or base64
//! - XDG-compliant layered configuration
//!
//! ## MCP Tools
//!
//! - `execute_python` - Write and run Python code
//! - `write_file` / `read_file` / `list_files` / `get_file_path` - Environment files
//! - `install_packages` / `remove_packages` / `list_packages` - Dependencies
//! - `create_env` / `list_envs` / `delete_env` - Environment lifecycle

pub mod cli;
pub mod config;
pub mod environment;
pub mod error;
pub mod executor;
pub mod logging;
pub mod mcp;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use environment::{EnvManager, FileContent, UvBackend, UvCli};
pub use error::{EnvError, ErrorInfo};
pub use executor::{exec_command, ExecOptions, ExecResult};
pub use mcp::PythonExecutorServer;
