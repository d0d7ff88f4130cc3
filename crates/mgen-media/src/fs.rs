//! Filesystem helpers for per-task working directories.
//!
//! Artifact files are written to a temporary sibling and renamed into
//! place, so a partially-written segment is never visible under its final
//! name.

use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::MediaResult;

/// Create (or reuse) the working directory for a task.
///
/// Each task id owns its directory exclusively; concurrent tasks never
/// share one.
pub async fn ensure_workdir(base: impl AsRef<Path>, task_id: &str) -> MediaResult<PathBuf> {
    let dir = base.as_ref().join(task_id);
    fs::create_dir_all(&dir).await?;
    Ok(dir)
}

/// Write `bytes` to `path` atomically (temp file + rename).
pub async fn write_atomic(path: impl AsRef<Path>, bytes: &[u8]) -> MediaResult<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }

    let tmp = path.with_extension("part");
    fs::write(&tmp, bytes).await?;

    match fs::rename(&tmp, path).await {
        Ok(()) => Ok(()),
        Err(e) => {
            let _ = fs::remove_file(&tmp).await;
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_ensure_workdir_creates_and_reuses() {
        let base = TempDir::new().unwrap();

        let dir = ensure_workdir(base.path(), "task-1").await.unwrap();
        assert!(dir.is_dir());
        assert!(dir.ends_with("task-1"));

        // Re-entry is a no-op.
        let again = ensure_workdir(base.path(), "task-1").await.unwrap();
        assert_eq!(dir, again);
    }

    #[tokio::test]
    async fn test_write_atomic_leaves_no_temp_file() {
        let base = TempDir::new().unwrap();
        let target = base.path().join("segment-1.mp4");

        write_atomic(&target, b"clip bytes").await.unwrap();

        assert_eq!(fs::read(&target).await.unwrap(), b"clip bytes");
        assert!(!target.with_extension("part").exists());
    }

    #[tokio::test]
    async fn test_write_atomic_creates_parents() {
        let base = TempDir::new().unwrap();
        let target = base.path().join("nested").join("frame.jpg");

        write_atomic(&target, b"jpeg").await.unwrap();
        assert!(target.exists());
    }

    #[tokio::test]
    async fn test_write_atomic_overwrites() {
        let base = TempDir::new().unwrap();
        let target = base.path().join("a.bin");

        write_atomic(&target, b"old").await.unwrap();
        write_atomic(&target, b"new").await.unwrap();
        assert_eq!(fs::read(&target).await.unwrap(), b"new");
    }
}
