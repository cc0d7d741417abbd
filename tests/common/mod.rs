//! Common test utilities for mcp-python-executor tests
//!
//! Integration tests run against a fake `uv` shell script so they need
//! neither network access nor a Python toolchain. The fake `uv run` executes
//! the target file with `sh`, so test "code" is shell.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use mcp_python_executor::config::Config;
use mcp_python_executor::environment::EnvManager;
use tempfile::TempDir;

/// Stand-in for the subset of uv the server uses
pub const FAKE_UV: &str = r#"#!/bin/sh
cmd="$1"
shift
case "$cmd" in
  init)
    printf '[project]\nname = "env"\nversion = "0.1.0"\ndependencies = []\n' > pyproject.toml
    mkdir -p .venv
    ;;
  add)
    for pkg in "$@"; do
      case "$pkg" in
        *non-existent*)
          echo "  x No solution found when resolving dependencies:" >&2
          echo "  Because $pkg was not found in the package registry" >&2
          exit 1
          ;;
      esac
    done
    mkdir -p .venv
    for pkg in "$@"; do echo "$pkg" >> .venv/packages; done
    ;;
  remove)
    for pkg in "$@"; do
      if ! grep -qx "$pkg" .venv/packages 2>/dev/null; then
        echo "error: The dependency \`$pkg\` could not be found in \`project.dependencies\`" >&2
        exit 2
      fi
      grep -vx "$pkg" .venv/packages > .venv/packages.tmp
      mv .venv/packages.tmp .venv/packages
    done
    ;;
  pip)
    printf '['
    sep=''
    if [ -f .venv/packages ]; then
      while read -r pkg; do
        printf '%s{"name":"%s","version":"1.0.0"}' "$sep" "$pkg"
        sep=','
      done < .venv/packages
    fi
    printf ']\n'
    ;;
  run)
    exec sh "$1"
    ;;
  *)
    echo "unsupported command: $cmd" >&2
    exit 2
    ;;
esac
"#;

/// Scratch home with a fake uv and its own environments directory
pub struct TestHome {
    pub dir: TempDir,
    pub config: Config,
}

impl TestHome {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let uv = install_fake_uv(dir.path());

        let mut config = Config::default();
        config.storage.base_dir = dir.path().join("home").to_string_lossy().into_owned();
        config.uv.command = uv.to_string_lossy().into_owned();

        Self { dir, config }
    }

    pub fn manager(&self) -> EnvManager {
        let manager = EnvManager::from_config(&self.config);
        manager.init_storage().expect("Failed to create envs dir");
        manager
    }

    pub fn envs_dir(&self) -> PathBuf {
        self.config.envs_dir()
    }

    /// Write a config file pointing the CLI at this home
    pub fn config_file(&self) -> PathBuf {
        let path = self.dir.path().join("config.toml");
        let content = format!(
            "[storage]\nbase_dir = \"{}\"\n\n[uv]\ncommand = \"{}\"\n",
            self.config.storage.base_dir, self.config.uv.command
        );
        std::fs::write(&path, content).expect("Failed to write config");
        path
    }
}

/// Write the fake uv script into `<dir>/bin/uv` and make it executable
pub fn install_fake_uv(dir: &Path) -> PathBuf {
    let bin = dir.join("bin");
    std::fs::create_dir_all(&bin).expect("Failed to create bin dir");
    let uv = bin.join("uv");
    std::fs::write(&uv, FAKE_UV).expect("Failed to write fake uv");

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(&uv)
            .expect("Failed to get metadata")
            .permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&uv, perms).expect("Failed to set permissions");
    }

    uv
}
