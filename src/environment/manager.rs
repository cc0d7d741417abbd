//! Persistent environment management
//!
//! [`EnvManager`] owns the environments directory and implements every
//! operation the MCP tools and CLI expose: lazy provisioning, file access,
//! package management and code execution.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use super::files::{classify, guess_mime, list_relative_files, FileContent};
use super::paths::{safe_file_path, sanitize_env_id};
use super::uv::{uv_args, UvBackend, UvCli};
use crate::config::{Config, FilesConfig};
use crate::error::EnvError;

/// Result type for environment operations
pub type EnvResult<T> = Result<T, EnvError>;

/// Outcome of create_env
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CreateStatus {
    Created,
    CreatedWithWarning,
    AlreadyExists,
}

impl std::fmt::Display for CreateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            CreateStatus::Created => "created",
            CreateStatus::CreatedWithWarning => "created_with_warning",
            CreateStatus::AlreadyExists => "already_exists",
        };
        f.write_str(label)
    }
}

/// Result of create_env
#[derive(Debug, Clone, Serialize)]
pub struct CreateEnvOutcome {
    pub status: CreateStatus,
    pub env_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Captured output of a successful run
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

/// One entry from `uv pip list --format json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editable_project_location: Option<String>,
}

/// Manages the per-environment directories under one root
pub struct EnvManager {
    envs_dir: PathBuf,
    backend: Arc<dyn UvBackend>,
    init_args: Vec<String>,
    files: FilesConfig,
    default_filename: String,
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl EnvManager {
    /// Create a manager using the real uv binary
    pub fn from_config(config: &Config) -> Self {
        Self::with_backend(config, Arc::new(UvCli::new(&config.uv)))
    }

    /// Create a manager with a specific backend
    pub fn with_backend(config: &Config, backend: Arc<dyn UvBackend>) -> Self {
        Self {
            envs_dir: config.envs_dir(),
            backend,
            init_args: config.uv.init_args.clone(),
            files: config.files.clone(),
            default_filename: config.execution.default_filename.clone(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Directory holding all environments
    pub fn envs_dir(&self) -> &Path {
        &self.envs_dir
    }

    /// Filename used when execute_python is called without one
    pub fn default_filename(&self) -> &str {
        &self.default_filename
    }

    /// Create the environments directory if needed
    pub fn init_storage(&self) -> EnvResult<()> {
        std::fs::create_dir_all(&self.envs_dir)?;
        Ok(())
    }

    /// Path of an environment; nothing is created
    pub fn env_path(&self, env_id: &str) -> EnvResult<PathBuf> {
        Ok(self.envs_dir.join(sanitize_env_id(env_id)?))
    }

    /// Serialize operations on one environment
    async fn lock_env(&self, env_id: &str) -> EnvResult<OwnedMutexGuard<()>> {
        let key = sanitize_env_id(env_id)?;
        Ok(self.lock_dir(key).await)
    }

    /// Lock keyed by the directory name under `envs_dir`
    async fn lock_dir(&self, name: String) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.entry(name).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Drop the lock entry for `name` once nobody holds or waits on it
    fn release_lock(&self, name: &str) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        if locks.get(name).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(name);
        }
    }

    async fn uv(&self, subcommand: &[&str], rest: &[String], cwd: &Path) -> super::uv::UvOutput {
        self.backend.run(&uv_args(subcommand, rest), cwd).await
    }

    /// Create and `uv init` the environment unless it exists; caller holds the lock
    async fn ensure_env_locked(&self, env_id: &str) -> EnvResult<PathBuf> {
        let env_path = self.env_path(env_id)?;
        if env_path.exists() {
            return Ok(env_path);
        }

        tracing::info!("Initializing environment '{}' at {}", env_id, env_path.display());
        std::fs::create_dir_all(&env_path)?;

        let init = self.backend.run(&self.init_args, &env_path).await;
        if !init.success() {
            if let Err(e) = std::fs::remove_dir_all(&env_path) {
                tracing::warn!("Failed to clean up {}: {}", env_path.display(), e);
            }
            return Err(EnvError::EnvInitFailed {
                env_id: env_id.to_string(),
                stderr: init.stderr,
            });
        }
        Ok(env_path)
    }

    /// Make sure an environment exists, initializing it on first use
    pub async fn ensure_env(&self, env_id: &str) -> EnvResult<PathBuf> {
        let _guard = self.lock_env(env_id).await?;
        self.ensure_env_locked(env_id).await
    }

    /// Explicitly create an environment, optionally with packages
    ///
    /// A failed package install leaves the environment in place and is
    /// reported as a warning.
    pub async fn create_env(&self, env_id: &str, packages: &[String]) -> EnvResult<CreateEnvOutcome> {
        if !packages.is_empty() {
            validate_packages(packages)?;
        }
        let _guard = self.lock_env(env_id).await?;
        if self.env_path(env_id)?.exists() {
            return Ok(CreateEnvOutcome {
                status: CreateStatus::AlreadyExists,
                env_id: env_id.to_string(),
                warning: None,
            });
        }

        let env_path = self.ensure_env_locked(env_id).await?;

        if !packages.is_empty() {
            let add = self.uv(&["add"], packages, &env_path).await;
            if !add.success() {
                tracing::warn!("Environment '{}' created but packages failed", env_id);
                return Ok(CreateEnvOutcome {
                    status: CreateStatus::CreatedWithWarning,
                    env_id: env_id.to_string(),
                    warning: Some(format!("Failed to install packages: {}", add.stderr)),
                });
            }
        }

        Ok(CreateEnvOutcome {
            status: CreateStatus::Created,
            env_id: env_id.to_string(),
            warning: None,
        })
    }

    /// Write `code` (if any) to `filename` and run it with `uv run`
    ///
    /// # Errors
    /// * `EnvError::PackageAddFailed` - If requested packages could not be added
    /// * `EnvError::FileNotFound` - If no code was given and the file is missing
    /// * `EnvError::ExecutionFailed` - If the script exits non-zero
    pub async fn execute_python(
        &self,
        env_id: &str,
        code: Option<&str>,
        filename: Option<&str>,
        packages: &[String],
    ) -> EnvResult<ExecutionOutput> {
        let _guard = self.lock_env(env_id).await?;
        let env_path = self.ensure_env_locked(env_id).await?;
        let filename = filename.unwrap_or(self.default_filename.as_str());

        if !packages.is_empty() {
            validate_packages(packages)?;
            let add = self.uv(&["add"], packages, &env_path).await;
            if !add.success() {
                return Err(EnvError::PackageAddFailed {
                    env_id: env_id.to_string(),
                    stderr: add.stderr,
                });
            }
        }

        let file_path = safe_file_path(&env_path, filename)?;

        if let Some(code) = code.filter(|c| !c.is_empty()) {
            if let Some(parent) = file_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&file_path, code)?;
        }

        if !file_path.is_file() {
            return Err(EnvError::FileNotFound {
                env_id: env_id.to_string(),
                filename: filename.to_string(),
            });
        }

        let target = file_path.to_string_lossy().into_owned();
        let run = self.uv(&["run"], &[target], &env_path).await;

        if !run.success() {
            return Err(EnvError::ExecutionFailed {
                exit_code: run.exit_code,
                stdout: run.stdout,
                stderr: run.stderr,
            });
        }

        Ok(ExecutionOutput {
            stdout: run.stdout,
            stderr: run.stderr,
            exit_code: run.exit_code,
        })
    }

    /// Write a text file into an environment; returns bytes written
    pub async fn write_file(&self, env_id: &str, filename: &str, content: &str) -> EnvResult<usize> {
        let _guard = self.lock_env(env_id).await?;
        let env_path = self.ensure_env_locked(env_id).await?;

        let file_path = safe_file_path(&env_path, filename)?;
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&file_path, content)?;

        tracing::debug!("Wrote {} bytes to {}", content.len(), file_path.display());
        Ok(content.len())
    }

    /// Read and classify a file from an environment
    pub async fn read_file(&self, env_id: &str, filename: &str) -> EnvResult<FileContent> {
        let _guard = self.lock_env(env_id).await?;
        let env_path = self.ensure_env_locked(env_id).await?;

        let file_path = self.existing_file(env_id, &env_path, filename)?;

        let size = std::fs::metadata(&file_path)?.len();
        if size > self.files.max_read_bytes {
            return Err(EnvError::FileTooLarge {
                filename: filename.to_string(),
                size,
                max: self.files.max_read_bytes,
            });
        }

        let bytes = std::fs::read(&file_path)?;
        let mime = guess_mime(&file_path, &bytes);
        Ok(classify(filename, &bytes, mime, self.files.binary_sniff_bytes))
    }

    /// Absolute host path of an existing environment file
    pub async fn get_file_path(&self, env_id: &str, filename: &str) -> EnvResult<PathBuf> {
        let _guard = self.lock_env(env_id).await?;
        let env_path = self.ensure_env_locked(env_id).await?;
        self.existing_file(env_id, &env_path, filename)
    }

    fn existing_file(&self, env_id: &str, env_path: &Path, filename: &str) -> EnvResult<PathBuf> {
        let file_path = safe_file_path(env_path, filename)?;
        if !file_path.is_file() {
            return Err(EnvError::FileNotFound {
                env_id: env_id.to_string(),
                filename: filename.to_string(),
            });
        }
        Ok(file_path)
    }

    /// Files in an environment, excluding ignored directories
    pub async fn list_files(&self, env_id: &str) -> EnvResult<Vec<String>> {
        let _guard = self.lock_env(env_id).await?;
        let env_path = self.ensure_env_locked(env_id).await?;
        Ok(list_relative_files(&env_path, &self.files.ignored_dirs)?)
    }

    /// `uv add` packages into an environment
    pub async fn install_packages(&self, env_id: &str, packages: &[String]) -> EnvResult<()> {
        validate_packages(packages)?;
        let _guard = self.lock_env(env_id).await?;
        let env_path = self.ensure_env_locked(env_id).await?;

        let add = self.uv(&["add"], packages, &env_path).await;
        if !add.success() {
            return Err(EnvError::InstallFailed { stderr: add.stderr });
        }
        tracing::info!("Installed {:?} into '{}'", packages, env_id);
        Ok(())
    }

    /// `uv remove` packages from an environment
    pub async fn remove_packages(&self, env_id: &str, packages: &[String]) -> EnvResult<()> {
        validate_packages(packages)?;
        let _guard = self.lock_env(env_id).await?;
        let env_path = self.ensure_env_locked(env_id).await?;

        let remove = self.uv(&["remove"], packages, &env_path).await;
        if !remove.success() {
            return Err(EnvError::RemoveFailed {
                stderr: remove.stderr,
            });
        }
        tracing::info!("Removed {:?} from '{}'", packages, env_id);
        Ok(())
    }

    /// Installed packages as reported by `uv pip list`
    pub async fn list_packages(&self, env_id: &str) -> EnvResult<Vec<PackageInfo>> {
        let _guard = self.lock_env(env_id).await?;
        let env_path = self.ensure_env_locked(env_id).await?;

        let list = self
            .uv(&["pip", "list", "--format", "json"], &[], &env_path)
            .await;
        if !list.success() {
            return Err(EnvError::ListPackagesFailed {
                stderr: list.stderr,
            });
        }

        serde_json::from_str(list.stdout.trim()).map_err(|e| {
            tracing::warn!("Unparsable package list: {}", e);
            EnvError::PackageListParse
        })
    }

    /// Names of all environments, sorted
    pub fn list_envs(&self) -> EnvResult<Vec<String>> {
        if !self.envs_dir.exists() {
            return Ok(Vec::new());
        }

        let mut envs = Vec::new();
        for entry in std::fs::read_dir(&self.envs_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                envs.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        envs.sort();
        Ok(envs)
    }

    /// Delete one environment
    ///
    /// # Errors
    /// * `EnvError::EnvNotFound` - If there is no such environment
    pub async fn delete_env(&self, env_id: &str) -> EnvResult<()> {
        let key = sanitize_env_id(env_id)?;
        let guard = self.lock_dir(key.clone()).await;
        let env_path = self.envs_dir.join(&key);

        if !env_path.is_dir() {
            drop(guard);
            self.release_lock(&key);
            return Err(EnvError::EnvNotFound(env_id.to_string()));
        }
        let removed = std::fs::remove_dir_all(&env_path);
        drop(guard);
        self.release_lock(&key);
        removed?;

        tracing::info!("Deleted environment '{}'", env_id);
        Ok(())
    }

    /// Delete every environment directory; returns the names removed
    ///
    /// Names are taken from the directory listing as-is, so directories that
    /// were not created through a sanitized id are removed too.
    pub async fn clean_all(&self) -> EnvResult<Vec<String>> {
        let mut removed = Vec::new();
        for name in self.list_envs()? {
            let guard = self.lock_dir(name.clone()).await;
            let result = std::fs::remove_dir_all(self.envs_dir.join(&name));
            drop(guard);
            self.release_lock(&name);
            result?;

            tracing::info!("Deleted environment '{}'", name);
            removed.push(name);
        }
        Ok(removed)
    }
}

/// Reject package lists uv would misread
///
/// # Errors
/// * `EnvError::InvalidPackage` - Empty list, blank spec, or a spec that looks like a flag
pub fn validate_packages(packages: &[String]) -> EnvResult<()> {
    if packages.is_empty() {
        return Err(EnvError::InvalidPackage {
            package: String::new(),
            reason: "no packages given".to_string(),
        });
    }
    for package in packages {
        if package.trim().is_empty() {
            return Err(EnvError::InvalidPackage {
                package: package.clone(),
                reason: "package spec is blank".to_string(),
            });
        }
        if package.trim_start().starts_with('-') {
            return Err(EnvError::InvalidPackage {
                package: package.clone(),
                reason: "options are not accepted as package specs".to_string(),
            });
        }
    }
    Ok(())
}
