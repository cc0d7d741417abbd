//! Async command execution with timeout support
//!
//! Provides a unified interface for running commands with:
//! - Configurable timeouts
//! - Output capture (stdout/stderr)
//! - Output truncation for large outputs
//! - Removal of inherited environment variables
//! - Working directory control

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::time::timeout;

use crate::error::EnvError;

/// Maximum output size before truncation (in bytes)
pub const MAX_OUTPUT_SIZE: usize = 1_000_000;

/// Truncation marker for large outputs
const TRUNCATION_MARKER: &str = "\n... [output truncated] ...\n";

/// Options for async command execution
#[derive(Debug, Clone)]
pub struct ExecOptions {
    /// Working directory for the command
    pub working_dir: Option<PathBuf>,
    /// Environment variables to remove from the inherited environment
    pub env_remove: Vec<String>,
    /// Timeout duration (None = no timeout)
    pub timeout: Option<Duration>,
    /// Maximum output size per stream before truncation
    pub max_output_size: usize,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            working_dir: None,
            env_remove: Vec::new(),
            timeout: None,
            max_output_size: MAX_OUTPUT_SIZE,
        }
    }
}

impl ExecOptions {
    /// Create options with a working directory
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: Some(dir.into()),
            ..Default::default()
        }
    }

    /// Set the timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set timeout in seconds
    pub fn with_timeout_secs(self, secs: u64) -> Self {
        self.with_timeout(Duration::from_secs(secs))
    }

    /// Remove an inherited environment variable
    pub fn without_env(mut self, key: impl Into<String>) -> Self {
        self.env_remove.push(key.into());
        self
    }

    /// Set maximum output size
    pub fn with_max_output(mut self, size: usize) -> Self {
        self.max_output_size = size;
        self
    }
}

/// Result of async command execution
#[derive(Debug)]
pub struct ExecResult {
    /// Exit code if available (None when killed by a signal)
    pub exit_code: Option<i32>,
    /// Standard output (may be truncated)
    pub stdout: String,
    /// Whether stdout was truncated
    pub stdout_truncated: bool,
    /// Standard error (may be truncated)
    pub stderr: String,
    /// Whether stderr was truncated
    pub stderr_truncated: bool,
}

/// Execute a command asynchronously with timeout support
///
/// # Arguments
/// * `program` - The program to execute
/// * `args` - Command arguments
/// * `options` - Execution options
///
/// # Errors
/// * `EnvError::SpawnFailed` - If the command couldn't be spawned
/// * `EnvError::Timeout` - If the command timed out (when timeout is set)
pub async fn exec_command<S: AsRef<str>>(
    program: &str,
    args: &[S],
    options: &ExecOptions,
) -> Result<ExecResult, EnvError> {
    let start = Instant::now();
    let command_str = std::iter::once(program)
        .chain(args.iter().map(|a| a.as_ref()))
        .collect::<Vec<_>>()
        .join(" ");

    let mut cmd = Command::new(program);
    cmd.args(args.iter().map(|a| a.as_ref()));
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.kill_on_drop(true); // Kill process if future is dropped

    if let Some(ref dir) = options.working_dir {
        cmd.current_dir(dir);
    }

    for key in &options.env_remove {
        cmd.env_remove(key);
    }

    tracing::debug!("Executing async: {}", command_str);

    let child = cmd.spawn().map_err(|e| EnvError::SpawnFailed {
        command: command_str.clone(),
        error: e.to_string(),
    })?;

    let result = if let Some(timeout_duration) = options.timeout {
        match timeout(timeout_duration, wait_for_output(child, options.max_output_size)).await {
            Ok(result) => result?,
            Err(_) => {
                // Dropping the child future kills the process
                return Err(EnvError::Timeout {
                    command: command_str,
                    timeout_secs: timeout_duration.as_secs(),
                });
            }
        }
    } else {
        wait_for_output(child, options.max_output_size).await?
    };

    tracing::debug!(
        "Finished in {}ms with exit code {:?}: {}",
        start.elapsed().as_millis(),
        result.exit_code,
        command_str
    );

    Ok(ExecResult {
        exit_code: result.exit_code,
        stdout: result.stdout,
        stdout_truncated: result.stdout_truncated,
        stderr: result.stderr,
        stderr_truncated: result.stderr_truncated,
    })
}

/// Internal result from waiting for process output
struct WaitResult {
    exit_code: Option<i32>,
    stdout: String,
    stderr: String,
    stdout_truncated: bool,
    stderr_truncated: bool,
}

/// Wait for a child process and capture its output
async fn wait_for_output(
    mut child: tokio::process::Child,
    max_output_size: usize,
) -> Result<WaitResult, EnvError> {
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    // Read stdout and stderr concurrently
    let stdout_handle = tokio::spawn(async move {
        match stdout {
            Some(stdout) => read_and_truncate(stdout, max_output_size).await,
            None => (String::new(), false),
        }
    });

    let stderr_handle = tokio::spawn(async move {
        match stderr {
            Some(stderr) => read_and_truncate(stderr, max_output_size).await,
            None => (String::new(), false),
        }
    });

    let status = child.wait().await?;

    let (stdout, stdout_truncated) = stdout_handle
        .await
        .map_err(|e| std::io::Error::other(format!("stdout task failed: {}", e)))?;

    let (stderr, stderr_truncated) = stderr_handle
        .await
        .map_err(|e| std::io::Error::other(format!("stderr task failed: {}", e)))?;

    Ok(WaitResult {
        exit_code: status.code(),
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
    })
}

/// Read from an async reader and truncate if too large
///
/// Keeps draining the pipe after the limit is hit so the child never blocks
/// on a full pipe buffer.
async fn read_and_truncate<R: tokio::io::AsyncRead + Unpin>(
    reader: R,
    max_size: usize,
) -> (String, bool) {
    let mut buf_reader = BufReader::new(reader);
    let mut kept: Vec<u8> = Vec::with_capacity(max_size.min(64 * 1024));
    let mut chunk = [0u8; 8192];
    let mut truncated = false;

    loop {
        match buf_reader.read(&mut chunk).await {
            Ok(0) => break, // EOF
            Ok(n) => {
                if truncated {
                    continue;
                }
                let remaining = max_size.saturating_sub(kept.len());
                if n > remaining {
                    kept.extend_from_slice(&chunk[..remaining]);
                    truncated = true;
                } else {
                    kept.extend_from_slice(&chunk[..n]);
                }
            }
            Err(e) => {
                tracing::warn!("Error reading output: {}", e);
                break;
            }
        }
    }

    let mut output = String::from_utf8_lossy(&kept).into_owned();
    if truncated {
        output.push_str(TRUNCATION_MARKER);
    }
    (output, truncated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exec_options_default() {
        let options = ExecOptions::default();

        assert!(options.working_dir.is_none());
        assert!(options.env_remove.is_empty());
        assert!(options.timeout.is_none());
        assert_eq!(options.max_output_size, MAX_OUTPUT_SIZE);
    }

    #[test]
    fn test_exec_options_builder() {
        let options = ExecOptions::in_dir("/tmp")
            .with_timeout_secs(60)
            .without_env("VIRTUAL_ENV")
            .with_max_output(1000);

        assert_eq!(options.working_dir, Some(PathBuf::from("/tmp")));
        assert_eq!(options.timeout, Some(Duration::from_secs(60)));
        assert_eq!(options.env_remove, vec!["VIRTUAL_ENV".to_string()]);
        assert_eq!(options.max_output_size, 1000);
    }

    #[tokio::test]
    async fn test_exec_command_success() {
        let result = exec_command("echo", &["hello world"], &ExecOptions::default()).await;

        match result {
            Ok(res) => {
                assert_eq!(res.exit_code, Some(0));
                assert_eq!(res.exit_code, Some(0));
                assert!(res.stdout.contains("hello world"));
            }
            Err(EnvError::SpawnFailed { .. }) => {
                eprintln!("Skipping test: echo not available");
            }
            Err(e) => panic!("Unexpected error: {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_exec_command_failure() {
        let result = exec_command::<&str>("false", &[], &ExecOptions::default()).await;

        match result {
            Ok(res) => {
                assert_ne!(res.exit_code, Some(0));
            }
            Err(EnvError::SpawnFailed { .. }) => {
                eprintln!("Skipping test: false not available");
            }
            Err(e) => panic!("Unexpected error: {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_exec_command_env_remove() {
        let options = ExecOptions::default().without_env("HOME");

        let result = exec_command("/bin/sh", &["-c", "echo \"home=${HOME:-unset}\""], &options).await;

        match result {
            Ok(res) => {
                assert_eq!(res.exit_code, Some(0));
                assert!(res.stdout.contains("home=unset"), "got {}", res.stdout);
            }
            Err(EnvError::SpawnFailed { .. }) => {
                eprintln!("Skipping test: /bin/sh not available");
            }
            Err(e) => panic!("Unexpected error: {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_exec_command_timeout() {
        let options = ExecOptions::default().with_timeout(Duration::from_millis(100));

        let result = exec_command("sleep", &["10"], &options).await;

        match result {
            Err(EnvError::Timeout { timeout_secs, .. }) => {
                // Timeout should be 0 since we used milliseconds
                assert!(timeout_secs <= 1);
            }
            Err(EnvError::SpawnFailed { .. }) => {
                eprintln!("Skipping test: sleep not available");
            }
            Ok(_) => panic!("Expected timeout error"),
            Err(e) => panic!("Unexpected error: {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_exec_command_output_truncation() {
        let options = ExecOptions::default().with_max_output(100);

        let result = exec_command(
            "sh",
            &["-c", "for i in $(seq 1 100); do echo \"line of output $i\"; done"],
            &options,
        )
        .await;

        match result {
            Ok(res) => {
                assert_eq!(res.exit_code, Some(0));
                assert!(res.stdout_truncated);
                assert!(res.stdout.contains("[output truncated]"));
                assert!(res.stdout.len() <= 100 + TRUNCATION_MARKER.len());
            }
            Err(EnvError::SpawnFailed { .. }) => {
                eprintln!("Skipping test: sh not available");
            }
            Err(e) => panic!("Unexpected error: {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_exec_command_small_output_not_truncated() {
        let options = ExecOptions::default().with_max_output(10000);

        let result = exec_command("echo", &["hello world"], &options).await;

        match result {
            Ok(res) => {
                assert!(!res.stdout_truncated);
                assert!(!res.stdout.contains("[output truncated]"));
            }
            Err(EnvError::SpawnFailed { .. }) => {
                eprintln!("Skipping test: echo not available");
            }
            Err(e) => panic!("Unexpected error: {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_exec_command_working_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let options = ExecOptions::in_dir(dir.path());

        let result = exec_command::<&str>("pwd", &[], &options).await;

        match result {
            Ok(res) => {
                assert_eq!(res.exit_code, Some(0));
                let expected = dir.path().canonicalize().unwrap();
                assert_eq!(
                    PathBuf::from(res.stdout.trim()).canonicalize().unwrap(),
                    expected
                );
            }
            Err(EnvError::SpawnFailed { .. }) => {
                eprintln!("Skipping test: pwd not available");
            }
            Err(e) => panic!("Unexpected error: {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_exec_command_spawn_failed() {
        let result =
            exec_command::<&str>("nonexistent_command_12345", &[], &ExecOptions::default()).await;

        match result {
            Err(EnvError::SpawnFailed { command, .. }) => {
                assert!(command.contains("nonexistent_command_12345"));
            }
            _ => panic!("Expected SpawnFailed error"),
        }
    }

    #[tokio::test]
    async fn test_exec_command_accepts_owned_args() {
        let args = vec!["-c".to_string(), "echo owned".to_string()];
        let result = exec_command("sh", &args, &ExecOptions::default()).await;

        if let Ok(res) = result {
            assert!(res.stdout.contains("owned"));
        }
    }
}
