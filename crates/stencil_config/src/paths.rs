//! Path helpers shared by the resolvers.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};

/// Join a POSIX-style relative path onto `base`, normalizing `.` and `..`.
///
/// Absolute `path` values replace `base`, like [`Path::join`].
pub fn resolve_posix_path(base: &Path, path: &str) -> PathBuf {
    let mut resolved = if path.starts_with('/') {
        PathBuf::from("/")
    } else {
        base.to_path_buf()
    };
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                resolved.pop();
            }
            s => resolved.push(s),
        }
    }
    resolved
}

/// Directory a resource was declared in: the parent of `config_path` if set,
/// else `path` itself.
pub fn config_dir(path: &Path, config_path: Option<&Path>) -> PathBuf {
    config_path
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .unwrap_or_else(|| path.to_path_buf())
}

/// Create `path` and all missing ancestors.
///
/// Succeeds if the directory already exists, including when it is created
/// concurrently by another task.
pub async fn ensure_dir(path: &Path) -> ConfigResult<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|source| ConfigError::DirectoryCreation {
            path: path.to_path_buf(),
            source,
        })?;
    debug!("Ensured directory {:?}", path);
    Ok(())
}
