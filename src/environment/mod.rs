//! Persistent Python environments
//!
//! Each environment is a uv project directory under `<base_dir>/envs/<env_id>`.

pub mod files;
pub mod manager;
pub mod paths;
pub mod uv;

pub use files::{DocumentKind, FileContent, FileDocument};
pub use manager::{
    validate_packages, CreateEnvOutcome, CreateStatus, EnvManager, EnvResult, ExecutionOutput,
    PackageInfo,
};
pub use paths::{safe_file_path, sanitize_env_id};
pub use uv::{UvBackend, UvCli, UvOutput};
