//! Remote backend.
//!
//! [`Transport`] is the blocking wire client (one pooled connection per call).
//! [`RemoteFs`] runs those calls on the blocking thread pool and applies the
//! tolerance rules of a shared hosting account: permission-denied on
//! mkdir/chmod/delete is a no-op, permission-denied on read is "absent",
//! deleting something already gone succeeds.

use super::{Creator, Deleter, ListEntry, Lister, ModeChanger, Reader, Writer};
use crate::utils::{Context, DeployError};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// Operations required from the remote file-transfer client. Implementations
/// must report `PermissionDenied` and `NotFound` distinctly, and
/// `AlreadyExists` from `make_dir`.
pub trait Transport: Send + Sync + 'static {
    fn list(&self, dir: &str) -> Result<Vec<ListEntry>>;

    fn read(&self, path: &str) -> Result<Vec<u8>>;

    fn write(&self, path: &str, data: &[u8]) -> Result<()>;

    fn delete(&self, path: &str) -> Result<()>;

    fn remove_dir_all(&self, path: &str) -> Result<()>;

    /// Create exactly one directory level.
    fn make_dir(&self, path: &str, mode: u32) -> Result<()>;

    fn change_mode(&self, path: &str, mode: u32) -> Result<()>;
}

pub struct RemoteFs<T: Transport> {
    transport: Arc<T>,
    file_mode: u32,
    dir_mode: u32,
}

impl<T: Transport> RemoteFs<T> {
    pub fn new(transport: T, file_mode: u32, dir_mode: u32) -> Self {
        Self {
            transport: Arc::new(transport),
            file_mode,
            dir_mode,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    async fn call<R, F>(&self, f: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&T) -> Result<R> + Send + 'static,
    {
        let transport = Arc::clone(&self.transport);
        tokio::task::spawn_blocking(move || f(&transport))
            .await
            .map_err(|e| DeployError::Worker(e.to_string()))?
    }

    async fn chmod_best_effort(&self, path: &str, mode: u32) -> Result<()> {
        let owned = path.to_string();
        match self.call(move |t| t.change_mode(&owned, mode)).await {
            Err(e) if e.is_permission_denied() => {
                debug!(path, "Permission denied while changing mode, skipping");
                Ok(())
            }
            other => other,
        }
    }
}

/// Every prefix of `path`, shortest first: `/a/b` gives `/a`, `/a/b`.
fn path_segments(path: &str) -> Vec<String> {
    let absolute = path.starts_with('/');
    let mut segments = Vec::new();
    let mut current = String::new();

    for part in path.split('/').filter(|p| !p.is_empty()) {
        if absolute || !current.is_empty() {
            current.push('/');
        }
        current.push_str(part);
        segments.push(current.clone());
    }

    segments
}

#[async_trait]
impl<T: Transport> Lister for RemoteFs<T> {
    async fn list(&self, dir: &str) -> Result<Vec<ListEntry>> {
        let owned = dir.to_string();
        self.call(move |t| t.list(&owned)).await
    }
}

#[async_trait]
impl<T: Transport> Reader for RemoteFs<T> {
    async fn read(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let owned = path.to_string();
        match self.call(move |t| t.read(&owned)).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.is_permission_denied() => {
                warn!(path, "No permission to read remote file, skipping");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl<T: Transport> Writer for RemoteFs<T> {
    async fn write(&self, path: &str, data: Vec<u8>) -> Result<()> {
        let owned = path.to_string();
        self.call(move |t| t.write(&owned, &data))
            .await
            .with_context(|| format!("uploading {}", path))?;

        self.chmod_best_effort(path, self.file_mode)
            .await
            .with_context(|| format!("changing mode of {}", path))
    }
}

#[async_trait]
impl<T: Transport> Creator for RemoteFs<T> {
    async fn create_dir(&self, path: &str) -> Result<()> {
        for segment in path_segments(path) {
            let target = segment.clone();
            let mode = self.dir_mode;
            match self.call(move |t| t.make_dir(&target, mode)).await {
                Ok(()) => {}
                // Shared ancestors usually exist or belong to another account.
                Err(e) if e.is_already_exists() || e.is_permission_denied() => continue,
                Err(e) => {
                    return Err(e).with_context(|| format!("creating directory {} of {}", segment, path));
                }
            }

            self.chmod_best_effort(&segment, mode)
                .await
                .with_context(|| format!("changing mode of directory {} of {}", segment, path))?;
        }
        Ok(())
    }
}

#[async_trait]
impl<T: Transport> Deleter for RemoteFs<T> {
    async fn delete(&self, path: &str) -> Result<()> {
        let owned = path.to_string();
        match self.call(move |t| t.delete(&owned)).await {
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) if e.is_permission_denied() => {
                warn!(path, "No permission to delete remote file, leaving in place");
                Ok(())
            }
            other => other.with_context(|| format!("deleting {}", path)),
        }
    }

    async fn delete_dir(&self, path: &str) -> Result<()> {
        let owned = path.to_string();
        match self.call(move |t| t.remove_dir_all(&owned)).await {
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) if e.is_permission_denied() => {
                warn!(path, "No permission to delete remote directory, leaving in place");
                Ok(())
            }
            other => other.with_context(|| format!("deleting directory {}", path)),
        }
    }
}

#[async_trait]
impl<T: Transport> ModeChanger for RemoteFs<T> {
    async fn change_mode(&self, path: &str, mode: u32) -> Result<()> {
        self.chmod_best_effort(path, mode).await
    }
}
