//! Environment id sanitizing and path containment
//!
//! Every filename a client sends is resolved against its environment root
//! and rejected if the result escapes that root.

use std::path::{Component, Path, PathBuf};

use crate::error::EnvError;

/// Reduce a client-supplied environment id to a directory-safe name
///
/// Keeps alphanumeric characters (any script), `-` and `_`.
///
/// # Errors
/// * `EnvError::InvalidEnvId` - If nothing is left after sanitizing
pub fn sanitize_env_id(env_id: &str) -> Result<String, EnvError> {
    let safe: String = env_id
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
        .collect();

    if safe.is_empty() {
        return Err(EnvError::InvalidEnvId(env_id.to_string()));
    }
    Ok(safe)
}

/// Resolve `filename` inside `env_path`, refusing anything outside it
///
/// Absolute filenames are accepted only when they already point inside the
/// environment.
///
/// # Errors
/// * `EnvError::IllegalFilename` - If the resolved path leaves the environment
pub fn safe_file_path(env_path: &Path, filename: &str) -> Result<PathBuf, EnvError> {
    let root = resolve_lenient(env_path);
    let requested = resolve_lenient(&env_path.join(filename));

    if !requested.starts_with(&root) {
        tracing::warn!(
            "Rejected filename '{}' outside {}",
            filename,
            env_path.display()
        );
        return Err(EnvError::IllegalFilename(filename.to_string()));
    }
    Ok(requested)
}

/// Make a path absolute and normalized without requiring it to exist
///
/// The deepest existing ancestor is canonicalized (following symlinks) and
/// the remaining components are appended as-is.
pub fn resolve_lenient(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(_) => path.to_path_buf(),
        }
    };
    let normalized = normalize_lexically(&absolute);

    let mut existing = normalized.as_path();
    let mut tail: Vec<&std::ffi::OsStr> = Vec::new();
    loop {
        if let Ok(canonical) = existing.canonicalize() {
            let mut resolved = canonical;
            for part in tail.iter().rev() {
                resolved.push(part);
            }
            return resolved;
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name);
                existing = parent;
            }
            _ => return normalized,
        }
    }
}

/// Collapse `.` and `..` components without touching the filesystem
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize_keeps_safe_characters() {
        assert_eq!(sanitize_env_id("my-env_01").unwrap(), "my-env_01");
    }

    #[test]
    fn test_sanitize_strips_unsafe_characters() {
        assert_eq!(sanitize_env_id("../../etc").unwrap(), "etc");
        assert_eq!(sanitize_env_id("my env!").unwrap(), "myenv");
        assert_eq!(sanitize_env_id("a/b\\c").unwrap(), "abc");
    }

    #[test]
    fn test_sanitize_keeps_unicode_letters() {
        assert_eq!(sanitize_env_id("données").unwrap(), "données");
    }

    #[test]
    fn test_sanitize_rejects_empty_ids() {
        for raw in ["", "   ", "../", "!!!"] {
            match sanitize_env_id(raw) {
                Err(EnvError::InvalidEnvId(id)) => assert_eq!(id, raw),
                other => panic!("Expected InvalidEnvId for {:?}, got {:?}", raw, other),
            }
        }
    }

    #[test]
    fn test_safe_file_path_relative() {
        let dir = TempDir::new().unwrap();
        let path = safe_file_path(dir.path(), "sub/data.txt").unwrap();

        assert!(path.starts_with(dir.path().canonicalize().unwrap()));
        assert!(path.ends_with("sub/data.txt"));
    }

    #[test]
    fn test_safe_file_path_traversal_rejected() {
        let env_path = Path::new("/tmp/env");
        assert!(matches!(
            safe_file_path(env_path, "../outside.txt"),
            Err(EnvError::IllegalFilename(_))
        ));
        assert!(matches!(
            safe_file_path(env_path, "/etc/passwd"),
            Err(EnvError::IllegalFilename(_))
        ));
    }

    #[test]
    fn test_safe_file_path_rejects_sibling_with_shared_prefix() {
        let dir = TempDir::new().unwrap();
        let env = dir.path().join("a");
        std::fs::create_dir_all(&env).unwrap();
        std::fs::create_dir_all(dir.path().join("ab")).unwrap();

        assert!(matches!(
            safe_file_path(&env, "../ab/x.txt"),
            Err(EnvError::IllegalFilename(_))
        ));
    }

    #[test]
    fn test_safe_file_path_inner_dotdot_allowed() {
        let dir = TempDir::new().unwrap();
        let path = safe_file_path(dir.path(), "sub/../data.txt").unwrap();

        assert_eq!(path, dir.path().canonicalize().unwrap().join("data.txt"));
    }

    #[test]
    fn test_safe_file_path_absolute_inside_allowed() {
        let dir = TempDir::new().unwrap();
        let inside = dir.path().join("x.txt");

        let path = safe_file_path(dir.path(), inside.to_str().unwrap()).unwrap();
        assert!(path.ends_with("x.txt"));
    }

    #[cfg(unix)]
    #[test]
    fn test_safe_file_path_symlink_escape_rejected() {
        let dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();

        assert!(matches!(
            safe_file_path(dir.path(), "link/secret.txt"),
            Err(EnvError::IllegalFilename(_))
        ));
    }

    #[test]
    fn test_normalize_lexically() {
        assert_eq!(
            normalize_lexically(Path::new("/a/./b/../c")),
            PathBuf::from("/a/c")
        );
        assert_eq!(normalize_lexically(Path::new("/../x")), PathBuf::from("/x"));
    }
}
