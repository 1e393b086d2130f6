//! Local disk backend.
//!
//! Listings come from `walkdir` limited to one level; symlinks to regular files
//! are reported as files, symlinks to directories and broken links are left
//! out so the walk never leaves the tree.

use super::{Creator, Deleter, ListEntry, Lister, ModeChanger, Reader, Writer};
use crate::utils::DeployError;
use crate::Result;
use async_trait::async_trait;
use std::path::Path;
use tracing::warn;
use walkdir::{DirEntry, WalkDir};

#[derive(Debug, Clone, Default)]
pub struct LocalFs;

impl LocalFs {
    pub fn new() -> Self {
        Self
    }
}

fn list_dir(dir: &str) -> Result<Vec<ListEntry>> {
    let mut entries = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(false) {
        let entry = entry.map_err(|e| match e.into_io_error() {
            Some(io) => DeployError::from_io(io, dir),
            None => DeployError::Io(std::io::Error::other(format!("filesystem loop under {}", dir))),
        })?;

        if let Some(item) = list_entry(&entry) {
            entries.push(item);
        }
    }

    Ok(entries)
}

fn list_entry(entry: &DirEntry) -> Option<ListEntry> {
    let name = entry.file_name().to_string_lossy().to_string();
    let file_type = entry.file_type();

    if file_type.is_symlink() {
        // Resolve the link target; only links to regular files are kept.
        return match std::fs::metadata(entry.path()) {
            Ok(target) if target.is_file() => Some(ListEntry::file(name)),
            _ => None,
        };
    }

    Some(ListEntry {
        name,
        is_dir: file_type.is_dir(),
        is_regular: file_type.is_file(),
    })
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| DeployError::Worker(e.to_string()))?
}

#[async_trait]
impl Lister for LocalFs {
    async fn list(&self, dir: &str) -> Result<Vec<ListEntry>> {
        let dir = dir.to_string();
        blocking(move || list_dir(&dir)).await
    }
}

#[async_trait]
impl Reader for LocalFs {
    async fn read(&self, path: &str) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                warn!(path, "No permission to read file, skipping");
                Ok(None)
            }
            Err(e) => Err(DeployError::from_io(e, path)),
        }
    }
}

#[async_trait]
impl Writer for LocalFs {
    async fn write(&self, path: &str, data: Vec<u8>) -> Result<()> {
        tokio::fs::write(path, data)
            .await
            .map_err(|e| DeployError::from_io(e, path))
    }
}

#[async_trait]
impl Creator for LocalFs {
    async fn create_dir(&self, path: &str) -> Result<()> {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| DeployError::from_io(e, path))
    }
}

#[async_trait]
impl Deleter for LocalFs {
    async fn delete(&self, path: &str) -> Result<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) => tolerate_missing_or_denied(e, path),
        }
    }

    async fn delete_dir(&self, path: &str) -> Result<()> {
        match tokio::fs::remove_dir_all(path).await {
            Ok(()) => Ok(()),
            Err(e) => tolerate_missing_or_denied(e, path),
        }
    }
}

fn tolerate_missing_or_denied(err: std::io::Error, path: &str) -> Result<()> {
    match err.kind() {
        std::io::ErrorKind::NotFound => Ok(()),
        std::io::ErrorKind::PermissionDenied => {
            warn!(path, "No permission to delete, leaving in place");
            Ok(())
        }
        _ => Err(DeployError::from_io(err, path)),
    }
}

#[async_trait]
impl ModeChanger for LocalFs {
    async fn change_mode(&self, path: &str, mode: u32) -> Result<()> {
        let owned = path.to_string();
        let result = blocking(move || set_mode(Path::new(&owned), mode)).await;
        match result {
            Err(e) if e.is_permission_denied() => {
                warn!(path, mode = %format!("{:o}", mode), "No permission to change mode");
                Ok(())
            }
            other => other,
        }
    }
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .map_err(|e| DeployError::from_io(e, &path.display().to_string()))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    // Unix mode bits have no meaning here.
    Ok(())
}
