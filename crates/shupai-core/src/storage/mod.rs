//! Persistence: project files and the asset catalog.

pub mod assets;
mod project;

pub use assets::{AssetId, AssetStore, GroupAsset, ImageAsset, TextAsset, ASSET_CATALOG_FILE};
pub use project::{ProjectSerializer, PROJECT_VERSION};

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Storage error: {0}")]
    Other(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Replace `path` with `bytes` by writing a sibling temp file and renaming
/// it over the target.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> StorageResult<()> {
    let mut name = path
        .file_name()
        .ok_or_else(|| StorageError::Io(format!("Not a file path: {}", path.display())))?
        .to_os_string();
    name.push(".tmp");
    let temp = path.with_file_name(name);

    fs::write(&temp, bytes).map_err(|e| {
        StorageError::Io(format!("Failed to write {}: {}", temp.display(), e))
    })?;
    fs::rename(&temp, path).map_err(|e| {
        let _ = fs::remove_file(&temp);
        StorageError::Io(format!("Failed to replace {}: {}", path.display(), e))
    })
}

/// Read a whole file, mapping a missing file to [`StorageError::NotFound`].
pub(crate) fn read_file(path: &Path) -> StorageResult<Vec<u8>> {
    fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => StorageError::NotFound(path.display().to_string()),
        _ => StorageError::Io(format!("Failed to read {}: {}", path.display(), e)),
    })
}

/// Create `dir` (and parents) if needed.
pub(crate) fn ensure_dir(dir: impl Into<PathBuf>) -> StorageResult<PathBuf> {
    let dir = dir.into();
    if !dir.exists() {
        fs::create_dir_all(&dir).map_err(|e| {
            StorageError::Io(format!("Failed to create directory {}: {}", dir.display(), e))
        })?;
    }
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_atomic_replaces_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"second");
        assert!(!dir.path().join("catalog.json.tmp").exists());
    }

    #[test]
    fn test_read_missing_is_not_found() {
        let dir = tempdir().unwrap();
        let result = read_file(&dir.path().join("nope.json"));
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[test]
    fn test_ensure_dir_creates_nested() {
        let dir = tempdir().unwrap();
        let nested = ensure_dir(dir.path().join("a").join("b")).unwrap();
        assert!(nested.is_dir());
    }
}
