//! Blocking FTP file operations.
//!
//! Every call checks a control connection out of the pool for exactly that
//! call. A 550 reply means permission denied unless a listing of the parent
//! shows the path is simply missing.

use crate::config::FtpConfig;
use crate::error::{Result, StoreError};
use crate::pool::{create_pool, FtpPool};
use std::io::Cursor;
use std::str::FromStr;
use suppaftp::list::File;
use suppaftp::FtpStream;

/// One entry of a single-level directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub name: String,
    pub is_dir: bool,
    pub is_regular: bool,
}

#[derive(Clone)]
pub struct FtpStore {
    pool: FtpPool,
}

impl FtpStore {
    /// Connect and fill the pool up to its idle minimum.
    pub fn connect(config: FtpConfig) -> Result<Self> {
        let host = config.host.clone();
        let pool = create_pool(config)?;
        tracing::info!(host = %host, connections = pool.state().connections, "Connected to FTP server");
        Ok(Self { pool })
    }

    pub fn list(&self, dir: &str) -> Result<Vec<RemoteEntry>> {
        let mut conn = self.pool.get()?;
        list_dir(&mut conn, dir)
    }

    pub fn read(&self, path: &str) -> Result<Vec<u8>> {
        let mut conn = self.pool.get()?;
        match conn.retr_as_buffer(path) {
            Ok(buffer) => Ok(buffer.into_inner()),
            Err(e) => Err(classify_missing(&mut conn, StoreError::from_ftp(e, path), path)),
        }
    }

    pub fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        let mut conn = self.pool.get()?;
        conn.put_file(path, &mut Cursor::new(data))
            .map(|_| ())
            .map_err(|e| StoreError::from_ftp(e, path))
    }

    pub fn delete(&self, path: &str) -> Result<()> {
        let mut conn = self.pool.get()?;
        match conn.rm(path) {
            Ok(()) => Ok(()),
            Err(e) => Err(classify_missing(&mut conn, StoreError::from_ftp(e, path), path)),
        }
    }

    /// Remove a directory and everything below it.
    pub fn remove_dir_all(&self, path: &str) -> Result<()> {
        let mut conn = self.pool.get()?;
        remove_tree(&mut conn, path)
    }

    /// Create a single directory level. FTP has no mode on `MKD`; callers
    /// follow up with [`FtpStore::chmod`].
    pub fn make_dir(&self, path: &str) -> Result<()> {
        let mut conn = self.pool.get()?;
        match conn.mkdir(path) {
            Ok(()) => Ok(()),
            // Servers answer 550 for an existing directory too.
            Err(e) => match lookup(&mut conn, path) {
                Ok(Some(entry)) if entry.is_dir => Err(StoreError::AlreadyExists(path.to_string())),
                _ => Err(StoreError::from_ftp(e, path)),
            },
        }
    }

    pub fn chmod(&self, path: &str, mode: u32) -> Result<()> {
        let mut conn = self.pool.get()?;
        set_mode(&mut conn, path, mode)
    }
}

/// Modes go through `SITE CHMOD`. A server without it is treated like one
/// that refuses the change.
fn set_mode(conn: &mut FtpStream, path: &str, mode: u32) -> Result<()> {
    conn.site(format!("CHMOD {:o} {}", mode, path))
        .map(|_| ())
        .map_err(|e| StoreError::from_ftp(e, path).unsupported_as_denied(path))
}

fn list_dir(conn: &mut FtpStream, dir: &str) -> Result<Vec<RemoteEntry>> {
    match conn.list(Some(dir)) {
        Ok(lines) => Ok(parse_listing(&lines)),
        Err(e) => Err(classify_missing(conn, StoreError::from_ftp(e, dir), dir)),
    }
}

/// Turn a denial into [`StoreError::NotFound`] when the parent listing shows
/// `path` is absent. An unreadable parent leaves the denial as it is.
fn classify_missing(conn: &mut FtpStream, err: StoreError, path: &str) -> StoreError {
    if !err.is_permission_denied() {
        return err;
    }
    match lookup(conn, path) {
        Ok(None) => StoreError::NotFound(path.to_string()),
        _ => err,
    }
}

fn lookup(conn: &mut FtpStream, path: &str) -> Result<Option<RemoteEntry>> {
    let (parent, name) = split_path(path);
    let lines = conn.list(Some(parent)).map_err(|e| StoreError::from_ftp(e, parent))?;
    Ok(parse_listing(&lines).into_iter().find(|entry| entry.name == name))
}

fn split_path(path: &str) -> (&str, &str) {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rsplit_once('/') {
        Some(("", name)) => ("/", name),
        Some((parent, name)) => (parent, name),
        None => (".", trimmed),
    }
}

/// Parse `LIST` output. Lines in neither POSIX nor DOS format (such as a
/// leading `total` line) are dropped.
fn parse_listing(lines: &[String]) -> Vec<RemoteEntry> {
    lines
        .iter()
        .filter_map(|line| File::from_str(line).ok())
        .filter(|file| file.name() != "." && file.name() != "..")
        .map(|file| RemoteEntry {
            name: file.name().to_string(),
            is_dir: file.is_directory(),
            is_regular: file.is_file(),
        })
        .collect()
}

/// Depth-first removal. Children that vanish underneath the walk count as
/// removed; only the root must exist.
fn remove_tree(conn: &mut FtpStream, dir: &str) -> Result<()> {
    let children = list_dir(conn, dir)?;

    for child in children {
        let path = format!("{}/{}", dir.trim_end_matches('/'), child.name);
        let result = if child.is_dir {
            remove_tree(conn, &path)
        } else {
            match conn.rm(&path) {
                Ok(()) => Ok(()),
                Err(e) => Err(classify_missing(conn, StoreError::from_ftp(e, &path), &path)),
            }
        };
        ignore_vanished(result)?;
    }

    match conn.rmdir(dir) {
        Ok(()) => Ok(()),
        Err(e) => Err(classify_missing(conn, StoreError::from_ftp(e, dir), dir)),
    }
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
