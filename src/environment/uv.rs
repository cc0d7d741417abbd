//! uv invocation
//!
//! [`UvBackend`] is the seam between environment management and the `uv`
//! binary. [`UvCli`] is the real implementation; tests substitute mocks.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::UvConfig;
use crate::error::EnvError;
use crate::executor::{exec_command, ExecOptions};

/// Outcome of one uv invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UvOutput {
    /// Exit code (1 when the command could not run or timed out)
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl UvOutput {
    /// Successful output with the given stdout
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Failed output with the given stderr
    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs uv subcommands inside an environment directory
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UvBackend: Send + Sync {
    /// Run `uv <args>` with `cwd` as working directory
    ///
    /// Never fails: spawn errors and timeouts come back as a failed
    /// [`UvOutput`] so callers report them like any other uv failure.
    async fn run(&self, args: &[String], cwd: &Path) -> UvOutput;
}

/// [`UvBackend`] that shells out to the configured uv binary
#[derive(Debug, Clone)]
pub struct UvCli {
    command: String,
    timeout: Duration,
    scrub_env: Vec<String>,
    max_output_bytes: usize,
}

impl UvCli {
    /// Create a backend from `[uv]` configuration
    pub fn new(config: &UvConfig) -> Self {
        Self {
            command: config.command.clone(),
            timeout: Duration::from_secs(config.timeout),
            scrub_env: config.scrub_env.clone(),
            max_output_bytes: config.max_output_bytes,
        }
    }

    /// Override the timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Program that will be spawned
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Whether the configured command resolves to an executable
    pub fn is_available(&self) -> bool {
        which::which(&self.command).is_ok()
    }

    fn options(&self, cwd: &Path) -> ExecOptions {
        let mut options = ExecOptions::in_dir(cwd)
            .with_timeout(self.timeout)
            .with_max_output(self.max_output_bytes);
        for key in &self.scrub_env {
            options = options.without_env(key.clone());
        }
        options
    }
}

#[async_trait]
impl UvBackend for UvCli {
    async fn run(&self, args: &[String], cwd: &Path) -> UvOutput {
        match exec_command(&self.command, args, &self.options(cwd)).await {
            Ok(result) => {
                if result.stdout_truncated || result.stderr_truncated {
                    tracing::warn!(
                        "uv {} output truncated to {} bytes per stream",
                        args.join(" "),
                        self.max_output_bytes
                    );
                }
                UvOutput {
                    // Killed by a signal: no code, report like the timeout path
                    exit_code: result.exit_code.unwrap_or(1),
                    stdout: result.stdout,
                    stderr: result.stderr,
                }
            }
            Err(EnvError::Timeout { timeout_secs, .. }) => {
                tracing::warn!("uv {} timed out after {}s", args.join(" "), timeout_secs);
                UvOutput::failed(
                    1,
                    format!("Error: Command timed out after {} seconds.", timeout_secs),
                )
            }
            Err(e) => {
                tracing::warn!("uv {} could not run: {}", args.join(" "), e);
                let reason = match e {
                    EnvError::SpawnFailed { error, .. } => error,
                    other => other.to_string(),
                };
                UvOutput::failed(1, format!("Error: {}", reason))
            }
        }
    }
}

/// Build an argument vector from a subcommand and trailing values
pub fn uv_args(subcommand: &[&str], rest: &[String]) -> Vec<String> {
    subcommand
        .iter()
        .map(|s| s.to_string())
        .chain(rest.iter().cloned())
        .collect()
}
