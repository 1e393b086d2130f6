//! Blocking SFTP file operations.
//!
//! Every call checks a session out of the pool for exactly that call, so the
//! pool is shared fairly between concurrent workers.

use crate::config::SftpConfig;
use crate::error::{Result, StoreError};
use crate::pool::{create_pool, SftpPool};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// One entry of a single-level directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub name: String,
    pub is_dir: bool,
    pub is_regular: bool,
}

#[derive(Clone)]
pub struct SftpStore {
    pool: SftpPool,
}

impl SftpStore {
    /// Connect and fill the pool up to its idle minimum.
    pub fn connect(config: SftpConfig) -> Result<Self> {
        let host = config.host.clone();
        let pool = create_pool(config)?;
        tracing::info!(host = %host, connections = pool.state().connections, "Connected to SFTP server");
        Ok(Self { pool })
    }

    pub fn list(&self, dir: &str) -> Result<Vec<RemoteEntry>> {
        let conn = self.pool.get()?;
        let path = Path::new(dir);
        let listing = conn.sftp.readdir(path).map_err(|e| StoreError::from_sftp(e, path))?;

        Ok(listing
            .into_iter()
            .filter_map(|(entry_path, stat)| {
                let name = entry_path.file_name()?.to_string_lossy().to_string();
                if name == "." || name == ".." {
                    return None;
                }
                Some(RemoteEntry {
                    name,
                    is_dir: stat.is_dir(),
                    is_regular: stat.is_file(),
                })
            })
            .collect())
    }

    pub fn read(&self, path: &str) -> Result<Vec<u8>> {
        let conn = self.pool.get()?;
        let path = Path::new(path);
        let mut file = conn.sftp.open(path).map_err(|e| StoreError::from_sftp(e, path))?;
        let mut content = Vec::new();
        file.read_to_end(&mut content).map_err(|e| StoreError::from_io(e, path))?;
        Ok(content)
    }

    pub fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        let conn = self.pool.get()?;
        let path = Path::new(path);
        let mut file = conn.sftp.create(path).map_err(|e| StoreError::from_sftp(e, path))?;
        file.write_all(data).map_err(|e| StoreError::from_io(e, path))?;
        file.flush().map_err(|e| StoreError::from_io(e, path))?;
        Ok(())
    }

    pub fn delete(&self, path: &str) -> Result<()> {
        let conn = self.pool.get()?;
        let path = Path::new(path);
        conn.sftp.unlink(path).map_err(|e| StoreError::from_sftp(e, path))
    }

    /// Remove a directory and everything below it.
    pub fn remove_dir_all(&self, path: &str) -> Result<()> {
        let conn = self.pool.get()?;
        remove_tree(&conn.sftp, Path::new(path))
    }

    /// Create a single directory level.
    pub fn make_dir(&self, path: &str, mode: u32) -> Result<()> {
        let conn = self.pool.get()?;
        let path = Path::new(path);
        match conn.sftp.mkdir(path, mode as i32) {
            Ok(()) => Ok(()),
            Err(e) => {
                // Most servers answer a generic failure for an existing directory.
                if let Ok(stat) = conn.sftp.stat(path) {
                    if stat.is_dir() {
                        return Err(StoreError::AlreadyExists(path.display().to_string()));
                    }
                }
                Err(StoreError::from_sftp(e, path))
            }
        }
    }

    pub fn chmod(&self, path: &str, mode: u32) -> Result<()> {
        let conn = self.pool.get()?;
        let path = Path::new(path);
        let stat = ssh2::FileStat {
            size: None,
            uid: None,
            gid: None,
            perm: Some(mode),
            atime: None,
            mtime: None,
        };
        conn.sftp.setstat(path, stat).map_err(|e| StoreError::from_sftp(e, path))
    }
}

/// Depth-first removal. Anything that disappears underneath the walk was
/// removed by someone else and counts as done; only the root must exist.
fn remove_tree(sftp: &ssh2::Sftp, dir: &Path) -> Result<()> {
    let stat = sftp.lstat(dir).map_err(|e| StoreError::from_sftp(e, dir))?;
    if !stat.is_dir() {
        return sftp.unlink(dir).map_err(|e| StoreError::from_sftp(e, dir));
    }

    let children: Vec<(PathBuf, ssh2::FileStat)> =
        sftp.readdir(dir).map_err(|e| StoreError::from_sftp(e, dir))?;

    for (child, child_stat) in children {
        let is_dot = child
            .file_name()
            .map(|n| n == "." || n == "..")
            .unwrap_or(true);
        if is_dot {
            continue;
        }
        let result = if child_stat.is_dir() {
            remove_tree(sftp, &child)
        } else {
            sftp.unlink(&child).map_err(|e| StoreError::from_sftp(e, &child))
        };
        ignore_vanished(result)?;
    }

    sftp.rmdir(dir).map_err(|e| StoreError::from_sftp(e, dir))
}

fn ignore_vanished(result: Result<()>) -> Result<()> {
    match result {
        Err(StoreError::NotFound(path)) => {
            tracing::debug!(path = %path, "Already removed");
            Ok(())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vanished_children_count_as_removed() {
        assert!(ignore_vanished(Err(StoreError::NotFound("/www/old/sub".into()))).is_ok());
        assert!(matches!(
            ignore_vanished(Err(StoreError::PermissionDenied("/www/old/sub".into()))),
            Err(StoreError::PermissionDenied(_))
        ));
    }
}
