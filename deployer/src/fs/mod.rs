//! File store abstraction.
//!
//! Every capability a deployment needs from a file store is its own trait, so
//! backends (local disk, remote server) implement only the minimal operations
//! and decorators (recursive listing, compression, manifest cache) wrap a
//! capability with another of the same kind.
//!
//! Paths handed to the capabilities are backend paths. Tree-relative paths
//! produced by a walk are "/"-rooted (`/dir/b.txt`) and are turned into backend
//! paths with [`join_path`].

pub mod compression;
pub mod entry;
pub mod ftp;
pub mod hash;
pub mod local;
pub mod recursive;
pub mod remote;
pub mod sftp;

#[cfg(test)]
pub(crate) mod memory;

use crate::Result;
use async_trait::async_trait;

pub use entry::{digest_bytes, Entry, Snapshot};

/// One item of a directory listing. For a single-level listing `name` is the
/// bare file name; for a recursive listing it is the "/"-rooted relative path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    pub name: String,
    pub is_dir: bool,
    pub is_regular: bool,
}

impl ListEntry {
    pub fn dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: true,
            is_regular: false,
        }
    }

    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: false,
            is_regular: true,
        }
    }
}

#[async_trait]
pub trait Lister: Send + Sync {
    async fn list(&self, dir: &str) -> Result<Vec<ListEntry>>;
}

#[async_trait]
pub trait Reader: Send + Sync {
    /// `Ok(None)` means the backend refused to let us read the file; callers
    /// skip it rather than failing the run.
    async fn read(&self, path: &str) -> Result<Option<Vec<u8>>>;
}

#[async_trait]
pub trait HashReader: Send + Sync {
    async fn read_hash(&self, path: &str) -> Result<Option<String>>;
}

#[async_trait]
pub trait Writer: Send + Sync {
    async fn write(&self, path: &str, data: Vec<u8>) -> Result<()>;
}

#[async_trait]
pub trait Creator: Send + Sync {
    /// Create `path` and every missing ancestor.
    async fn create_dir(&self, path: &str) -> Result<()>;
}

#[async_trait]
pub trait Deleter: Send + Sync {
    async fn delete(&self, path: &str) -> Result<()>;

    async fn delete_dir(&self, path: &str) -> Result<()>;
}

#[async_trait]
pub trait ModeChanger: Send + Sync {
    async fn change_mode(&self, path: &str, mode: u32) -> Result<()>;
}

/// Join a backend root with a "/"-rooted relative path.
pub fn join_path(root: &str, rel: &str) -> String {
    let rel = rel.trim_start_matches('/');
    if rel.is_empty() {
        return root.to_string();
    }
    let root = root.trim_end_matches('/');
    format!("{}/{}", root, rel)
}

/// Strip `root` from a backend path, giving the "/"-rooted relative path.
pub fn relative_path(root: &str, path: &str) -> Option<String> {
    let root = root.trim_end_matches('/');
    let rest = path.strip_prefix(root)?;
    if rest.is_empty() {
        return Some(String::new());
    }
    rest.starts_with('/').then(|| rest.to_string())
}

/// Parent directory of a backend path, if it has one.
pub fn parent_path(path: &str) -> Option<&str> {
    let trimmed = path.trim_end_matches('/');
    let idx = trimmed.rfind('/')?;
    if idx == 0 {
        return Some("/");
    }
    Some(&trimmed[..idx])
}

/// Parse an octal mode string such as `"0755"` or `"644"`.
pub fn parse_mode(mode: &str) -> Option<u32> {
    let digits = mode.trim().trim_start_matches("0o");
    u32::from_str_radix(digits, 8).ok().filter(|m| *m <= 0o7777)
}
