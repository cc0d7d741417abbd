//! MCP Server module
//!
//! Provides MCP tools for persistent Python environments:
//! - `execute_python` - Write and run Python code
//! - `write_file` / `read_file` / `list_files` / `get_file_path` - Environment files
//! - `install_packages` / `remove_packages` / `list_packages` - Dependencies via uv
//! - `create_env` / `list_envs` / `delete_env` - Environment lifecycle
//!
//! The `envs://list` resource mirrors `list_envs`.

pub mod server;

pub use server::{PythonExecutorServer, ENVS_RESOURCE_URI};
