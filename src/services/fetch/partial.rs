//! Destination file guard for in-flight downloads.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::FetchError;

/// A download target that is deleted unless [`PartialFile::commit`] succeeds.
///
/// Removal happens in `Drop`, so it also covers attempts cancelled by a
/// timeout while the body is still streaming.
pub(crate) struct PartialFile {
    path: PathBuf,
    file: Option<File>,
    committed: bool,
}

impl PartialFile {
    /// Create (or truncate) the destination.
    pub async fn create(path: &Path) -> Result<Self, FetchError> {
        let file = File::create(path).await.map_err(|source| FetchError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Some(file),
            committed: false,
        })
    }

    pub async fn write_all(&mut self, chunk: &[u8]) -> Result<(), FetchError> {
        match self.file.as_mut() {
            Some(file) => file.write_all(chunk).await.map_err(|source| FetchError::Io {
                path: self.path.clone(),
                source,
            }),
            None => Err(closed_error(&self.path)),
        }
    }

    /// Flush and close the file, keeping it on disk.
    pub async fn commit(mut self) -> Result<PathBuf, FetchError> {
        let mut file = self.file.take().ok_or_else(|| closed_error(&self.path))?;
        file.flush().await.map_err(|source| FetchError::Io {
            path: self.path.clone(),
            source,
        })?;
        drop(file);
        self.committed = true;
        Ok(self.path.clone())
    }
}

fn closed_error(path: &Path) -> FetchError {
    FetchError::Io {
        path: path.to_path_buf(),
        source: io::Error::new(io::ErrorKind::Other, "file already closed"),
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        // Close the handle before unlinking.
        drop(self.file.take());
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed partial download {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Could not remove partial download {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}
