//! Advisory file lock guarding the cache document.
//!
//! Several build processes (parallel bundler workers, a watcher next to a CI
//! job) may flush the same cache document. The flush holds an exclusive OS lock
//! on a sibling `<document>.lock` file while it reads, merges and rewrites the
//! document. The lock is released when the [`CacheLock`] is dropped.

use crate::constants::CACHE_LOCK_TIMEOUT;
use crate::core::{CloudcomError, FileOperation, FileResultExt};
use anyhow::{Context, Result};
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// An exclusive lock on a cache document.
#[derive(Debug)]
pub struct CacheLock {
    file: File,
    path: PathBuf,
}

impl CacheLock {
    /// Lock file path used for a given cache document.
    pub fn lock_path_for(document: &Path) -> PathBuf {
        let mut name = document
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "cache".into());
        name.push(".lock");
        document.with_file_name(name)
    }

    /// Acquires the lock for `document`, waiting up to [`CACHE_LOCK_TIMEOUT`].
    ///
    /// The blocking `lock_exclusive` call runs on the blocking pool so the async
    /// runtime keeps serving other tasks while waiting.
    pub async fn acquire(document: &Path) -> Result<Self> {
        let lock_path = Self::lock_path_for(document);

        if let Some(parent) = lock_path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.with_file_context(
                FileOperation::CreateDir,
                parent,
                "creating the cache directory",
                "cache lock",
            )?;
        }

        let lock_path_clone = lock_path.clone();
        let task = tokio::task::spawn_blocking(move || -> Result<File> {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&lock_path_clone)
                .with_file_context(
                    FileOperation::Lock,
                    &lock_path_clone,
                    "opening the cache lock file",
                    "cache lock",
                )?;

            file.lock_exclusive().with_file_context(
                FileOperation::Lock,
                &lock_path_clone,
                "acquiring the cache lock",
                "cache lock",
            )?;

            Ok(file)
        });

        let file = match tokio::time::timeout(CACHE_LOCK_TIMEOUT, task).await {
            Ok(joined) => joined.context("Failed to spawn blocking task for lock acquisition")??,
            Err(_) => {
                return Err(CloudcomError::LockTimeout {
                    path: lock_path.display().to_string(),
                }
                .into());
            }
        };

        tracing::debug!("Acquired cache lock {}", lock_path.display());

        Ok(Self {
            file,
            path: lock_path,
        })
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        // Closing the file would release the lock too; unlock explicitly to log failures
        #[allow(unstable_name_collisions)]
        if let Err(e) = self.file.unlock() {
            tracing::warn!("Failed to unlock {}: {}", self.path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;
    use tokio::sync::Barrier;

    #[test]
    fn test_lock_path_for() {
        assert_eq!(
            CacheLock::lock_path_for(Path::new("/p/.cloudcom/cache.json")),
            PathBuf::from("/p/.cloudcom/cache.json.lock")
        );
    }

    #[tokio::test]
    async fn test_acquire_creates_lock_file() {
        let temp = TempDir::new().unwrap();
        let document = temp.path().join("nested/cache.json");

        let lock = CacheLock::acquire(&document).await.unwrap();
        assert!(temp.path().join("nested/cache.json.lock").exists());
        drop(lock);
    }

    #[tokio::test]
    async fn test_lock_is_exclusive() {
        let temp = TempDir::new().unwrap();
        let document = Arc::new(temp.path().join("cache.json"));
        let barrier = Arc::new(Barrier::new(2));

        let doc1 = document.clone();
        let barrier1 = barrier.clone();
        let holder = tokio::spawn(async move {
            let _lock = CacheLock::acquire(&doc1).await.unwrap();
            barrier1.wait().await;
            tokio::time::sleep(Duration::from_millis(100)).await;
        });

        barrier.wait().await;
        let start = Instant::now();
        let _lock = CacheLock::acquire(&document).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(50));

        holder.await.unwrap();
    }
}
