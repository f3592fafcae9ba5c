//! On-disk layout of uploaded files.

use std::io;
use std::path::{Path, PathBuf};

use synchub_core::types::EntityId;

/// Subdirectory reserved for rendered thumbnails.
const THUMBNAILS_DIR: &str = "thumbnails";

/// Uploaded files live at `<root>/<uuid>`, so concurrent uploads never
/// share a path.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn thumbnails_dir(&self) -> PathBuf {
        self.root.join(THUMBNAILS_DIR)
    }

    /// Create the root and `thumbnails/` with mode `0755`.
    pub async fn ensure_layout(&self) -> io::Result<()> {
        let mut builder = tokio::fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(0o755);
        builder.create(&self.root).await?;
        builder.create(self.thumbnails_dir()).await
    }

    pub fn path_for(&self, id: EntityId) -> PathBuf {
        self.root.join(id.to_string())
    }

    /// Remove a stored file. Returns `Ok(false)` if it was already gone.
    pub async fn remove(&self, path: impl AsRef<Path>) -> io::Result<bool> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[tokio::test]
    async fn creates_root_and_thumbnails() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("store"));

        storage.ensure_layout().await.unwrap();
        storage.ensure_layout().await.unwrap();

        assert!(storage.root().is_dir());
        assert!(storage.thumbnails_dir().is_dir());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(storage.root()).unwrap().permissions().mode();
            assert_eq!(mode & 0o700, 0o700);
        }
    }

    #[tokio::test]
    async fn remove_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        let path = storage.path_for(Uuid::new_v4());
        tokio::fs::write(&path, b"data").await.unwrap();

        assert!(storage.remove(&path).await.unwrap());
        assert!(!storage.remove(&path).await.unwrap());
    }
}
