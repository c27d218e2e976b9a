//! Destination path resolution for artifacts
//!
//! Artifact paths come from the server. They are joined under the output
//! root only after a lexical check: every component must be a normal name
//! (`.` is dropped), so `..`, absolute paths and platform prefixes never
//! reach the filesystem.

use std::path::{Component, Path, PathBuf};

use tokio::fs;

use crate::errors::{DownloadError, DownloadResult};

/// Resolve `artifact_path` under `out_root`
///
/// # Errors
///
/// Returns `DownloadError::UnsafePath` if the path is empty, absolute, or
/// contains a parent directory component.
pub fn resolve_destination(out_root: &Path, artifact_path: &str) -> DownloadResult<PathBuf> {
    let unsafe_path = |reason: &str| DownloadError::UnsafePath {
        path: artifact_path.to_string(),
        reason: reason.to_string(),
    };

    let mut relative = PathBuf::new();
    for component in Path::new(artifact_path).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir => return Err(unsafe_path("parent directory component")),
            Component::RootDir | Component::Prefix(_) => {
                return Err(unsafe_path("absolute path"));
            }
        }
    }

    if relative.as_os_str().is_empty() {
        return Err(unsafe_path("empty path"));
    }

    Ok(out_root.join(relative))
}

/// Create the parent directory of `destination`; succeeds if it already exists
pub async fn ensure_parent_dir(destination: &Path) -> DownloadResult<()> {
    let Some(parent) = destination.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent)
        .await
        .map_err(|source| DownloadError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolves_under_root() {
        let root = Path::new("/out");
        assert_eq!(
            resolve_destination(root, "build/out.bin").unwrap(),
            PathBuf::from("/out/build/out.bin")
        );
        assert_eq!(
            resolve_destination(root, "./build//out.bin").unwrap(),
            PathBuf::from("/out/build/out.bin")
        );
    }

    #[test]
    fn test_rejects_traversal_and_absolute_paths() {
        let root = Path::new("/out");
        for path in ["../x", "build/../../x", "a/..", "/etc/passwd", "", ".", "./"] {
            let result = resolve_destination(root, path);
            assert!(
                matches!(result, Err(DownloadError::UnsafePath { .. })),
                "{:?} should be rejected",
                path
            );
        }
    }

    #[tokio::test]
    async fn test_ensure_parent_dir_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let destination = temp.path().join("a/b/c/file.bin");

        ensure_parent_dir(&destination).await.unwrap();
        ensure_parent_dir(&destination).await.unwrap();

        assert!(temp.path().join("a/b/c").is_dir());
    }

    #[tokio::test]
    async fn test_ensure_parent_dir_fails_under_a_file() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("blocker"), b"x").unwrap();

        let err = ensure_parent_dir(&temp.path().join("blocker/sub/file.bin"))
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::CreateDir { .. }));
    }
}
