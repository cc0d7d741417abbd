//! Configuration model for mcp-python-executor
//!
//! Defines the structure for XDG-compliant layered configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Where environments live on disk
    #[serde(default)]
    pub storage: StorageConfig,

    /// How `uv` is invoked
    #[serde(default)]
    pub uv: UvConfig,

    /// Limits for reading and listing environment files
    #[serde(default)]
    pub files: FilesConfig,

    /// Code execution defaults
    #[serde(default)]
    pub execution: ExecutionConfig,
}

/// Storage location settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Base directory; environments live in `<base_dir>/envs`.
    /// `~` and `$VAR` are expanded.
    #[serde(default = "default_base_dir")]
    pub base_dir: String,
}

fn default_base_dir() -> String {
    "~/.mcp-python-executor".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
        }
    }
}

/// uv invocation settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UvConfig {
    /// Command used to run uv
    #[serde(default = "default_uv_command")]
    pub command: String,

    /// Timeout in seconds for every uv invocation
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Arguments used to initialize a new environment
    #[serde(default = "default_init_args")]
    pub init_args: Vec<String>,

    /// Variables removed from the child environment so the server's own
    /// virtualenv does not leak into managed environments
    #[serde(default = "default_scrub_env")]
    pub scrub_env: Vec<String>,

    /// Per-stream output cap in bytes
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
}

fn default_uv_command() -> String {
    "uv".to_string()
}

fn default_timeout() -> u64 {
    300
}

fn default_init_args() -> Vec<String> {
    vec!["init".to_string(), "--lib".to_string()]
}

fn default_scrub_env() -> Vec<String> {
    vec![
        "VIRTUAL_ENV".to_string(),
        "PYTHONPATH".to_string(),
        "PYTHONHOME".to_string(),
    ]
}

fn default_max_output_bytes() -> usize {
    crate::executor::MAX_OUTPUT_SIZE
}

impl Default for UvConfig {
    fn default() -> Self {
        Self {
            command: default_uv_command(),
            timeout: default_timeout(),
            init_args: default_init_args(),
            scrub_env: default_scrub_env(),
            max_output_bytes: default_max_output_bytes(),
        }
    }
}

/// File access limits
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FilesConfig {
    /// Largest file read_file will return
    #[serde(default = "default_max_read_bytes")]
    pub max_read_bytes: u64,

    /// How many leading bytes are checked for NUL when sniffing binary files
    #[serde(default = "default_binary_sniff_bytes")]
    pub binary_sniff_bytes: usize,

    /// Directory names hidden from list_files
    #[serde(default = "default_ignored_dirs")]
    pub ignored_dirs: Vec<String>,
}

fn default_max_read_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_binary_sniff_bytes() -> usize {
    1024
}

fn default_ignored_dirs() -> Vec<String> {
    vec![".venv".to_string(), ".git".to_string()]
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            max_read_bytes: default_max_read_bytes(),
            binary_sniff_bytes: default_binary_sniff_bytes(),
            ignored_dirs: default_ignored_dirs(),
        }
    }
}

/// Execution defaults
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExecutionConfig {
    /// File written and run when execute_python gets no filename
    #[serde(default = "default_filename")]
    pub default_filename: String,
}

fn default_filename() -> String {
    "main.py".to_string()
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            default_filename: default_filename(),
        }
    }
}

impl Config {
    /// Expanded base directory
    ///
    /// Falls back to tilde-only expansion when a referenced variable is unset.
    pub fn base_dir(&self) -> PathBuf {
        let raw = self.storage.base_dir.as_str();
        let expanded = match shellexpand::full(raw) {
            Ok(s) => s.into_owned(),
            Err(e) => {
                tracing::warn!("Could not expand base_dir '{}': {}", raw, e);
                shellexpand::tilde(raw).into_owned()
            }
        };
        PathBuf::from(expanded)
    }

    /// Directory holding one subdirectory per environment
    pub fn envs_dir(&self) -> PathBuf {
        self.base_dir().join("envs")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.storage.base_dir, "~/.mcp-python-executor");
        assert_eq!(config.uv.command, "uv");
        assert_eq!(config.uv.timeout, 300);
        assert_eq!(config.uv.init_args, vec!["init", "--lib"]);
        assert_eq!(
            config.uv.scrub_env,
            vec!["VIRTUAL_ENV", "PYTHONPATH", "PYTHONHOME"]
        );
        assert_eq!(config.files.max_read_bytes, 10 * 1024 * 1024);
        assert_eq!(config.files.binary_sniff_bytes, 1024);
        assert_eq!(config.files.ignored_dirs, vec![".venv", ".git"]);
        assert_eq!(config.execution.default_filename, "main.py");
    }

    #[test]
    fn test_deserialize_minimal_config() {
        let toml = r#"
            [uv]
            timeout = 60
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.uv.timeout, 60);
        // Defaults should still apply
        assert_eq!(config.uv.command, "uv");
        assert_eq!(config.files.ignored_dirs, vec![".venv", ".git"]);
    }

    #[test]
    fn test_deserialize_full_config() {
        let toml = r#"
            [storage]
            base_dir = "/srv/executor"

            [uv]
            command = "/opt/uv/bin/uv"
            timeout = 120
            init_args = ["init", "--app"]
            scrub_env = ["VIRTUAL_ENV"]
            max_output_bytes = 4096

            [files]
            max_read_bytes = 1024
            binary_sniff_bytes = 512
            ignored_dirs = [".venv", ".git", "__pycache__"]

            [execution]
            default_filename = "script.py"
        "#;

        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.storage.base_dir, "/srv/executor");
        assert_eq!(config.uv.command, "/opt/uv/bin/uv");
        assert_eq!(config.uv.timeout, 120);
        assert_eq!(config.uv.init_args, vec!["init", "--app"]);
        assert_eq!(config.uv.scrub_env, vec!["VIRTUAL_ENV"]);
        assert_eq!(config.uv.max_output_bytes, 4096);
        assert_eq!(config.files.max_read_bytes, 1024);
        assert_eq!(config.files.binary_sniff_bytes, 512);
        assert_eq!(config.files.ignored_dirs.len(), 3);
        assert_eq!(config.execution.default_filename, "script.py");
    }

    #[test]
    fn test_envs_dir_under_base_dir() {
        let mut config = Config::default();
        config.storage.base_dir = "/srv/executor".to_string();

        assert_eq!(config.envs_dir(), PathBuf::from("/srv/executor/envs"));
    }

    #[test]
    fn test_base_dir_expands_tilde() {
        let config = Config::default();
        let base = config.base_dir();

        if let Some(home) = dirs::home_dir() {
            assert_eq!(base, home.join(".mcp-python-executor"));
        }
        assert!(!base.to_string_lossy().starts_with('~'));
    }

    #[test]
    fn test_base_dir_unknown_variable_keeps_literal() {
        let mut config = Config::default();
        config.storage.base_dir = "/tmp/$MCP_PY_EXEC_SURELY_UNSET_VAR/x".to_string();

        let base = config.base_dir();
        assert!(base.to_string_lossy().contains("MCP_PY_EXEC_SURELY_UNSET_VAR"));
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();

        // Should be able to deserialize what we serialized
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.uv.timeout, config.uv.timeout);
    }
}
