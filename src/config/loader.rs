//! Configuration loader with XDG-compliant path resolution
//!
//! Loads configuration from multiple locations with layered priority:
//! 1. `/etc/mcp-python-executor/config.toml` (lowest priority)
//! 2. `~/.config/mcp-python-executor/config.toml`
//! 3. `~/.mcp-python-executor.toml`
//! 4. `./.mcp-python-executor.toml` (highest priority)

use std::path::PathBuf;

use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use super::model::Config;

/// Application name used for XDG directories
pub const APP_NAME: &str = "mcp-python-executor";

/// Prefix for environment variable overrides
pub const ENV_PREFIX: &str = "MCP_PYTHON_EXECUTOR_";

/// Get XDG config search paths in priority order (lowest to highest)
pub fn config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // 1. System-wide config (lowest priority)
    paths.push(PathBuf::from(format!("/etc/{}/config.toml", APP_NAME)));

    // 2. XDG config home
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join(APP_NAME).join("config.toml"));
    }

    // 3. Home directory
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(format!(".{}.toml", APP_NAME)));
    }

    // 4. Current directory (highest priority)
    paths.push(PathBuf::from(format!(".{}.toml", APP_NAME)));

    paths
}

/// Load configuration with XDG layering
///
/// Configurations are merged in priority order, with later files
/// overriding earlier ones. Environment variables with prefix
/// `MCP_PYTHON_EXECUTOR_` override all file-based configuration.
///
/// # Arguments
/// * `override_path` - Optional path to a config file that takes highest file priority
pub fn load_config(override_path: Option<&str>) -> Result<Config> {
    let mut figment = Figment::new();

    figment = figment.merge(Serialized::defaults(Config::default()));

    for path in config_paths() {
        if path.exists() {
            tracing::debug!("Loading config from: {}", path.display());
            figment = figment.merge(Toml::file(&path));
        }
    }

    if let Some(path) = override_path {
        let path = PathBuf::from(path);
        if path.exists() {
            tracing::debug!("Loading override config from: {}", path.display());
            figment = figment.merge(Toml::file(&path));
        } else {
            tracing::warn!("Override config not found: {}", path.display());
        }
    }

    // Format: MCP_PYTHON_EXECUTOR_UV__TIMEOUT=600
    // Maps to: uv.timeout = 600
    figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

    figment.extract().context("Failed to load configuration")
}

/// Find all existing config files
pub fn find_config_files() -> Vec<PathBuf> {
    config_paths().into_iter().filter(|p| p.exists()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_config_paths_returns_expected_paths() {
        let paths = config_paths();

        assert!(paths.len() >= 2);
        assert!(paths[0].to_string_lossy().contains("/etc/"));
        assert!(paths
            .last()
            .unwrap()
            .to_string_lossy()
            .contains(".mcp-python-executor.toml"));
    }

    #[test]
    fn test_load_config_defaults() {
        let config = load_config(None).unwrap();

        assert_eq!(config.files.binary_sniff_bytes, 1024);
        assert_eq!(config.uv.init_args, vec!["init", "--lib"]);
    }

    #[test]
    fn test_load_config_from_override() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("test-config.toml");

        fs::write(
            &config_path,
            r#"
            [storage]
            base_dir = "/srv/executor"

            [uv]
            command = "/opt/uv"
            "#,
        )
        .unwrap();

        let config = load_config(Some(config_path.to_str().unwrap())).unwrap();

        assert_eq!(config.storage.base_dir, "/srv/executor");
        assert_eq!(config.uv.command, "/opt/uv");
    }

    #[test]
    fn test_env_override() {
        // Unique key so parallel tests never observe it
        std::env::set_var("MCP_PYTHON_EXECUTOR_EXECUTION__DEFAULT_FILENAME", "run_me.py");

        let config = load_config(None).unwrap();

        std::env::remove_var("MCP_PYTHON_EXECUTOR_EXECUTION__DEFAULT_FILENAME");

        assert_eq!(config.execution.default_filename, "run_me.py");
    }

    #[test]
    fn test_missing_override_file_uses_defaults() {
        let config = load_config(Some("/nonexistent/config.toml")).unwrap();

        assert_eq!(config.files.max_read_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn test_invalid_override_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("bad.toml");
        fs::write(&config_path, "[uv]\ntimeout = \"soon\"\n").unwrap();

        let result = load_config(Some(config_path.to_str().unwrap()));
        assert!(result.is_err());
    }

    #[test]
    fn test_find_config_files_only_returns_existing() {
        for path in find_config_files() {
            assert!(path.exists());
        }
    }
}
