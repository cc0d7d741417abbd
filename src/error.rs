//! Error types for mcp-python-executor
//!
//! Provides structured error types with suggestions for common uv and
//! Python failures.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

/// Extracts the module name from `ModuleNotFoundError: No module named 'x'`
static MISSING_MODULE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"No module named ['"]([A-Za-z0-9_.\-]+)['"]"#).unwrap());

/// Main error type for environment operations
#[derive(Error, Debug)]
pub enum EnvError {
    /// Environment id sanitized to nothing
    #[error("Invalid environment ID: {0}")]
    InvalidEnvId(String),

    /// Filename resolves outside its environment
    #[error("Illegal filename: {0}")]
    IllegalFilename(String),

    /// Environment directory does not exist
    #[error("Environment '{0}' not found.")]
    EnvNotFound(String),

    /// `uv init` failed for a new environment
    #[error("Failed to initialize environment {env_id}:\n{stderr}")]
    EnvInitFailed { env_id: String, stderr: String },

    /// `uv add` failed before running code
    #[error("Failed to add packages to environment {env_id}:\n{stderr}")]
    PackageAddFailed { env_id: String, stderr: String },

    /// `uv add` failed for install_packages
    #[error("Error installing packages:\n{stderr}")]
    InstallFailed { stderr: String },

    /// `uv remove` failed
    #[error("Error removing packages:\n{stderr}")]
    RemoveFailed { stderr: String },

    /// `uv pip list` failed
    #[error("Error listing packages:\n{stderr}")]
    ListPackagesFailed { stderr: String },

    /// `uv pip list` printed something that is not a package list
    #[error("Failed to parse package list from uv.")]
    PackageListParse,

    /// Package spec rejected before reaching uv
    #[error("Invalid package '{package}': {reason}")]
    InvalidPackage { package: String, reason: String },

    /// File missing inside an environment
    #[error("File '{filename}' not found in environment '{env_id}'.")]
    FileNotFound { env_id: String, filename: String },

    /// File exceeds the read limit
    #[error("File '{filename}' is too large ({size} bytes). Max size is {max} bytes.")]
    FileTooLarge {
        filename: String,
        size: u64,
        max: u64,
    },

    /// Python exited with a non-zero status
    #[error("Execution failed with exit code {exit_code}:\n{stderr}")]
    ExecutionFailed {
        exit_code: i32,
        stdout: String,
        stderr: String,
    },

    /// Failed to spawn the command
    #[error("Failed to spawn command: {command}")]
    SpawnFailed { command: String, error: String },

    /// Command timed out
    #[error("Command timed out after {timeout_secs}s: {command}")]
    Timeout { command: String, timeout_secs: u64 },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EnvError {
    /// Short machine-readable tag used in MCP error payloads
    pub fn error_type(&self) -> &'static str {
        match self {
            EnvError::InvalidEnvId(_) => "invalid_env_id",
            EnvError::IllegalFilename(_) => "illegal_filename",
            EnvError::EnvNotFound(_) => "env_not_found",
            EnvError::EnvInitFailed { .. } => "env_init_failed",
            EnvError::PackageAddFailed { .. } => "package_add_failed",
            EnvError::InstallFailed { .. } => "install_failed",
            EnvError::RemoveFailed { .. } => "remove_failed",
            EnvError::ListPackagesFailed { .. } => "list_packages_failed",
            EnvError::PackageListParse => "package_list_parse",
            EnvError::InvalidPackage { .. } => "invalid_package",
            EnvError::FileNotFound { .. } => "file_not_found",
            EnvError::FileTooLarge { .. } => "file_too_large",
            EnvError::ExecutionFailed { .. } => "execution_failed",
            EnvError::SpawnFailed { .. } => "spawn_failed",
            EnvError::Timeout { .. } => "timeout",
            EnvError::Config(_) => "config_error",
            EnvError::Io(_) => "io_error",
        }
    }
}

/// Serializable error info for MCP responses
#[derive(Debug, Serialize, Clone)]
pub struct ErrorInfo {
    pub message: String,
    pub error_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
}

impl From<&EnvError> for ErrorInfo {
    fn from(err: &EnvError) -> Self {
        let (suggestion, exit_code, stderr) = match err {
            EnvError::InvalidEnvId(_) => (
                Some("Use letters, digits, '-' or '_' in the environment ID".to_string()),
                None,
                None,
            ),
            EnvError::IllegalFilename(_) => (
                Some("Use a path relative to the environment root without '..'".to_string()),
                None,
                None,
            ),
            EnvError::EnvNotFound(_) => (
                Some("Run 'list_envs' to see existing environments".to_string()),
                None,
                None,
            ),
            EnvError::EnvInitFailed { stderr, .. } => (
                suggest_fix("uv init", stderr),
                None,
                Some(stderr.clone()),
            ),
            EnvError::PackageAddFailed { stderr, .. } | EnvError::InstallFailed { stderr } => (
                suggest_fix("uv add", stderr),
                None,
                Some(stderr.clone()),
            ),
            EnvError::RemoveFailed { stderr } => (
                suggest_fix("uv remove", stderr).or_else(|| {
                    Some("Run 'list_packages' to see what is installed".to_string())
                }),
                None,
                Some(stderr.clone()),
            ),
            EnvError::ListPackagesFailed { stderr } => (
                suggest_fix("uv pip list", stderr),
                None,
                Some(stderr.clone()),
            ),
            EnvError::PackageListParse => (None, None, None),
            EnvError::InvalidPackage { .. } => (
                Some("Pass plain requirement specs such as 'requests' or 'numpy>=2'".to_string()),
                None,
                None,
            ),
            EnvError::FileNotFound { .. } => (
                Some("Run 'list_files' to see the files in this environment".to_string()),
                None,
                None,
            ),
            EnvError::FileTooLarge { .. } => (
                Some("Summarize or split the file with execute_python instead".to_string()),
                None,
                None,
            ),
            EnvError::ExecutionFailed {
                exit_code, stderr, ..
            } => (
                suggest_fix("uv run", stderr),
                Some(*exit_code),
                Some(stderr.clone()),
            ),
            EnvError::SpawnFailed { error, .. } => (
                Some(format!("Check if the command exists: {}", error)),
                None,
                None,
            ),
            EnvError::Timeout { .. } => (
                Some("Try increasing [uv].timeout or checking if the code hangs".to_string()),
                None,
                None,
            ),
            EnvError::Config(_) => (
                Some("Check your mcp-python-executor configuration file".to_string()),
                None,
                None,
            ),
            EnvError::Io(_) => (None, None, None),
        };

        ErrorInfo {
            message: err.to_string(),
            error_type: err.error_type().to_string(),
            suggestion,
            exit_code,
            stderr,
        }
    }
}

/// Suggest fixes for common error patterns
pub fn suggest_fix(command: &str, stderr: &str) -> Option<String> {
    if stderr.contains("timed out") {
        return Some(
            "The command timed out. Raise [uv].timeout or make the code finish sooner."
                .to_string(),
        );
    }

    if let Some(caps) = MISSING_MODULE_RE.captures(stderr) {
        let module = &caps[1];
        let package = module.split('.').next().unwrap_or(module);
        return Some(format!(
            "Python module '{}' is missing. Install it with install_packages(packages=[\"{}\"]).",
            module, package
        ));
    }

    // Resolver errors
    if stderr.contains("No solution found when resolving dependencies") {
        if stderr.contains("not found in the package registry") {
            return Some(
                "Package not found on the index. Check the package name spelling.".to_string(),
            );
        }
        return Some(
            "Dependency resolution failed. Relax version constraints or check the package name."
                .to_string(),
        );
    }

    // Permission errors
    if stderr.contains("Permission denied") {
        return Some(
            "Permission denied. Check permissions on the environments directory.".to_string(),
        );
    }

    // Command not found
    if stderr.contains("command not found")
        || stderr.contains("No such file or directory (os error 2)")
    {
        if command.starts_with("uv") {
            return Some(
                "'uv' command not found. Install uv: https://docs.astral.sh/uv/getting-started/installation/"
                    .to_string(),
            );
        }
        return Some("Required command not found. Check PATH and dependencies.".to_string());
    }

    if stderr.contains("SyntaxError") {
        return Some("The Python code has a syntax error. Fix it and run again.".to_string());
    }

    None
}
