use std::path::Path;

/// libssh2 SFTP status codes the store distinguishes.
const FX_NO_SUCH_FILE: i32 = 2;
const FX_PERMISSION_DENIED: i32 = 3;
const FX_FILE_ALREADY_EXISTS: i32 = 11;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("no such file: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("authentication failed for {0}")]
    Authentication(String),

    #[error("connection pool: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("ssh: {0}")]
    Ssh(#[from] ssh2::Error),

    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Classify an ssh2 error raised while operating on `path`.
    pub fn from_sftp(err: ssh2::Error, path: &Path) -> Self {
        match err.code() {
            ssh2::ErrorCode::SFTP(FX_NO_SUCH_FILE) => StoreError::NotFound(path.display().to_string()),
            ssh2::ErrorCode::SFTP(FX_PERMISSION_DENIED) => {
                StoreError::PermissionDenied(path.display().to_string())
            }
            ssh2::ErrorCode::SFTP(FX_FILE_ALREADY_EXISTS) => {
                StoreError::AlreadyExists(path.display().to_string())
            }
            _ => StoreError::Ssh(err),
        }
    }

    /// Classify an I/O error raised while streaming `path`.
    pub fn from_io(err: std::io::Error, path: &Path) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => StoreError::NotFound(path.display().to_string()),
            std::io::ErrorKind::PermissionDenied => {
                StoreError::PermissionDenied(path.display().to_string())
            }
            _ => StoreError::Io(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
