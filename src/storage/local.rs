use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::UNIX_EPOCH;

use bytes::Bytes;
use tokio::fs;
use tracing::debug;

use crate::error::StorageError;

/// Counter that keeps temporary file names unique within the process.
static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Storage rooted at a local directory.
///
/// # Example
///
/// ```ignore
/// use image_gate::storage::LocalStorage;
///
/// let storage = LocalStorage::new("/var/www/images");
/// let modified = storage.timestamp("avatars/me.png").await?;
/// ```
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    /// Create a storage rooted at `root`. The directory does not need to exist yet.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of this storage.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a relative object path to a filesystem path under the root.
    ///
    /// Empty and `.` segments are dropped. `..` segments and absolute
    /// components are rejected.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let mut resolved = self.root.clone();
        let mut segments = 0usize;

        for segment in path.split(&['/', '\\'][..]) {
            if segment.is_empty() || segment == "." {
                continue;
            }
            let mut components = Path::new(segment).components();
            match (components.next(), components.next()) {
                (Some(Component::Normal(part)), None) => resolved.push(part),
                _ => return Err(StorageError::InvalidPath(path.to_string())),
            }
            segments += 1;
        }

        if segments == 0 {
            return Err(StorageError::InvalidPath(path.to_string()));
        }

        Ok(resolved)
    }

    /// Whether a regular file exists at `path`.
    pub async fn exists(&self, path: &str) -> bool {
        match self.resolve(path) {
            Ok(full) => fs::metadata(&full)
                .await
                .map(|meta| meta.is_file())
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Last modification time of `path` as Unix seconds.
    pub async fn timestamp(&self, path: &str) -> Result<i64, StorageError> {
        let full = self.resolve(path)?;
        let meta = file_metadata(&full, path).await?;
        let modified = meta
            .modified()
            .map_err(|e| StorageError::Io(e.to_string()))?;
        let seconds = modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        Ok(seconds)
    }

    /// Read the whole object at `path`.
    pub async fn read(&self, path: &str) -> Result<Bytes, StorageError> {
        let full = self.resolve(path)?;
        match fs::read(&full).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(path.to_string()))
            }
            Err(e) => Err(StorageError::Io(e.to_string())),
        }
    }

    /// Write `data` to `path`, creating parent directories as needed.
    ///
    /// The data is written to a sibling temporary file and renamed into
    /// place, so readers never observe a partially written object.
    pub async fn write(&self, path: &str, data: &[u8]) -> Result<(), StorageError> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::Io(e.to_string()))?;
        }

        let file_name = full
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp = full.with_file_name(format!(
            ".{}.{}.{}.tmp",
            file_name,
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        fs::write(&temp, data)
            .await
            .map_err(|e| StorageError::Io(e.to_string()))?;

        if let Err(e) = fs::rename(&temp, &full).await {
            let _ = fs::remove_file(&temp).await;
            return Err(StorageError::Io(e.to_string()));
        }

        debug!(path = path, bytes = data.len(), "Stored object");
        Ok(())
    }
}

async fn file_metadata(full: &Path, path: &str) -> Result<std::fs::Metadata, StorageError> {
    match fs::metadata(full).await {
        Ok(meta) if meta.is_file() => Ok(meta),
        Ok(_) => Err(StorageError::NotFound(path.to_string())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(StorageError::NotFound(path.to_string()))
        }
        Err(e) => Err(StorageError::Io(e.to_string())),
    }
}
