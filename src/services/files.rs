//! Filesystem helpers shared by the processor and the merger.

use std::io;
use std::path::Path;

use tracing::{debug, warn};

/// Names of the entries in `dir` that start with `prefix`, sorted.
pub async fn list_prefixed(dir: &Path, prefix: &str) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with(prefix) {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

/// Names of the regular files in `dir`, sorted.
pub async fn list_files(dir: &Path) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
    }
    names.sort();
    Ok(names)
}

/// Move a file, falling back to copy-then-delete when rename fails
/// (for example across filesystems).
pub async fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    let renamed = tokio::fs::rename(from, to).await;
    finish_move(renamed, from, to).await
}

async fn finish_move(renamed: io::Result<()>, from: &Path, to: &Path) -> io::Result<()> {
    match renamed {
        Ok(()) => Ok(()),
        Err(e) => {
            debug!(
                "Rename {} -> {} failed ({}), copying instead",
                from.display(),
                to.display(),
                e
            );
            tokio::fs::copy(from, to).await?;
            tokio::fs::remove_file(from).await
        }
    }
}

/// Remove a file if it exists. Failures are logged, never returned.
pub async fn remove_quietly(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove {}: {}", path.display(), e),
    }
}

/// Delete every regular file in `dir`. Returns the number removed.
///
/// Individual failures are logged and skipped.
pub async fn clear_dir(dir: &Path) -> io::Result<usize> {
    let mut removed = 0;
    for name in list_files(dir).await? {
        let path = dir.join(&name);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => removed += 1,
            Err(e) => warn!("Could not remove {}: {}", path.display(), e),
        }
    }
    Ok(removed)
}
