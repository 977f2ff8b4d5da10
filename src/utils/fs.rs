//! File system helpers for generated output.
//!
//! Every file cloudcom produces (artifacts, support modules, the cache document
//! and rewritten sources) goes through [`atomic_write`], so a reader never sees
//! a half-written module even while another build is materializing the same
//! identity.

use crate::core::{FileOperation, FileResultExt};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Creates a directory and all parent directories if they don't exist.
///
/// Fails if the path exists but is not a directory.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if path.exists() {
        if !path.is_dir() {
            anyhow::bail!("Path exists but is not a directory: {}", path.display());
        }
        return Ok(());
    }

    fs::create_dir_all(path).with_file_context(
        FileOperation::CreateDir,
        path,
        "creating an output directory",
        "ensure_dir",
    )?;
    Ok(())
}

/// Atomically writes bytes to a file using a write-then-rename strategy.
///
/// 1. Write content to a uniquely named temporary file next to the target
/// 2. Sync the temporary file to disk
/// 3. Rename the temporary file over the target path
///
/// The temporary name carries a random suffix so concurrent writers of the same
/// target never share a temp file. Parent directories are created on demand.
///
/// # Examples
///
/// ```rust,no_run
/// use cloudcom_cli::utils::fs::atomic_write;
/// use std::path::Path;
///
/// # fn example() -> anyhow::Result<()> {
/// atomic_write(Path::new(".cloudcom/cache.json"), b"{}")?;
/// # Ok(())
/// # }
/// ```
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    use std::io::Write;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        ensure_dir(parent)?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifact".to_string());
    let temp_path =
        path.with_file_name(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4().simple()));

    {
        let mut file = fs::File::create(&temp_path).with_file_context(
            FileOperation::Write,
            &temp_path,
            "creating a temporary file",
            "atomic_write",
        )?;

        file.write_all(content)
            .and_then(|()| file.sync_all())
            .with_file_context(
                FileOperation::Write,
                &temp_path,
                "writing a temporary file",
                "atomic_write",
            )?;
    }

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(e)
            .with_file_context(
                FileOperation::Write,
                path,
                "replacing the target with the temporary file",
                "atomic_write",
            )
            .map_err(Into::into);
    }

    Ok(())
}

/// Writes `content` to `path` unless the file already holds exactly that content.
///
/// Returns `true` when the file was (re)written. Skipping identical writes keeps
/// file watchers of the host build tool from rebuilding on every transform.
pub fn write_if_changed(path: &Path, content: &str) -> Result<bool> {
    match fs::read(path) {
        Ok(existing) if existing == content.as_bytes() => return Ok(false),
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(e)
                .with_file_context(
                    FileOperation::Read,
                    path,
                    "comparing existing content",
                    "write_if_changed",
                )
                .map_err(Into::into);
        }
    }

    atomic_write(path, content.as_bytes())?;
    Ok(true)
}

/// Async variant of [`write_if_changed`] that runs on the blocking pool.
pub async fn write_if_changed_async(path: PathBuf, content: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || write_if_changed(&path, &content))
        .await
        .context("Failed to join blocking write task")?
}

/// Writes multiple files concurrently, skipping the ones whose content is unchanged.
///
/// Returns how many files were actually written.
pub async fn write_all_if_changed(files: Vec<(PathBuf, String)>) -> Result<usize> {
    use futures::future::try_join_all;

    if files.is_empty() {
        return Ok(0);
    }

    let tasks = files.into_iter().map(|(path, content)| write_if_changed_async(path, content));
    let written = try_join_all(tasks).await?;

    Ok(written.into_iter().filter(|w| *w).count())
}

/// Normalizes a path by resolving `.` and `..` components lexically.
///
/// Does not touch the file system, so the path need not exist.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut components = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(components.last(), Some(Component::Normal(_))) {
                    components.pop();
                } else {
                    components.push(component);
                }
            }
            _ => components.push(component),
        }
    }

    components.iter().collect()
}

/// Makes `path` absolute against `base` (when relative) and normalizes it.
pub fn absolutize(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize_path(path)
    } else {
        normalize_path(&base.join(path))
    }
}

/// Renders a path as an ES module specifier.
///
/// Module specifiers always use forward slashes, including on Windows.
pub fn to_module_specifier(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_atomic_write_creates_parents() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("a/b/c.js");

        atomic_write(&target, b"export default 1;").unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "export default 1;");
        let leftovers: Vec<_> = fs::read_dir(target.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_write_if_changed_skips_identical_content() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("x.js");

        assert!(write_if_changed(&target, "one").unwrap());
        assert!(!write_if_changed(&target, "one").unwrap());
        assert!(write_if_changed(&target, "two").unwrap());
        assert_eq!(fs::read_to_string(&target).unwrap(), "two");
    }

    #[tokio::test]
    async fn test_write_all_if_changed_counts_writes() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a.js");
        let b = temp.path().join("b.js");
        fs::write(&a, "same").unwrap();

        let written = write_all_if_changed(vec![
            (a.clone(), "same".to_string()),
            (b.clone(), "new".to_string()),
        ])
        .await
        .unwrap();

        assert_eq!(written, 1);
        assert_eq!(fs::read_to_string(&b).unwrap(), "new");
    }

    #[test]
    fn test_blocked_directory_reports_file_context() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("file.js");
        fs::write(&blocker, "x").unwrap();

        let error = ensure_dir(&blocker.join("sub")).unwrap_err();
        let file_error = error.downcast_ref::<crate::core::FileOperationError>().unwrap();
        assert_eq!(file_error.operation, FileOperation::CreateDir);

        let error = atomic_write(&blocker.join("out.js"), b"x").unwrap_err();
        assert!(error.to_string().contains("not a directory"));
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(normalize_path(Path::new("../x/y")), PathBuf::from("../x/y"));
        assert_eq!(absolutize(Path::new("/proj"), Path::new(".cloudcom")), PathBuf::from("/proj/.cloudcom"));
    }

    #[test]
    fn test_module_specifier_uses_forward_slashes() {
        let p = PathBuf::from("/proj/.cloudcom/com/A.js");
        assert_eq!(to_module_specifier(&p), "/proj/.cloudcom/com/A.js");
    }
}
