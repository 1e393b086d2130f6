//! Custom error types for the deployer.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeployError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("Invalid ignore pattern: {0}")]
    Filter(#[from] regex::Error),

    #[error("Template error: {0}")]
    Template(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {method} {url} returned {status}: {body}")]
    HttpStatus {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Worker failed: {0}")]
    Worker(String),

    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<DeployError>,
    },
}

impl DeployError {
    /// The innermost error, looking through any added context.
    pub fn root(&self) -> &DeployError {
        match self {
            DeployError::Context { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), DeployError::NotFound(_))
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(self.root(), DeployError::PermissionDenied(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self.root(), DeployError::AlreadyExists(_))
    }

    /// Map an I/O error on `path` onto the permission/existence variants.
    pub fn from_io(err: std::io::Error, path: &str) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => DeployError::NotFound(path.to_string()),
            std::io::ErrorKind::PermissionDenied => DeployError::PermissionDenied(path.to_string()),
            std::io::ErrorKind::AlreadyExists => DeployError::AlreadyExists(path.to_string()),
            _ => DeployError::Io(err),
        }
    }
}

impl From<sftp_store::StoreError> for DeployError {
    fn from(err: sftp_store::StoreError) -> Self {
        use sftp_store::StoreError;
        match err {
            StoreError::PermissionDenied(p) => DeployError::PermissionDenied(p),
            StoreError::NotFound(p) => DeployError::NotFound(p),
            StoreError::AlreadyExists(p) => DeployError::AlreadyExists(p),
            other => DeployError::Transport(other.to_string()),
        }
    }
}

impl From<ftp_store::StoreError> for DeployError {
    fn from(err: ftp_store::StoreError) -> Self {
        use ftp_store::StoreError;
        match err {
            StoreError::PermissionDenied(p) => DeployError::PermissionDenied(p),
            StoreError::NotFound(p) => DeployError::NotFound(p),
            StoreError::AlreadyExists(p) => DeployError::AlreadyExists(p),
            other => DeployError::Transport(other.to_string()),
        }
    }
}

/// Attach operation/path context to an error.
pub trait Context<T> {
    fn context<C: Into<String>>(self, context: C) -> Result<T>;

    fn with_context<C: Into<String>, F: FnOnce() -> C>(self, f: F) -> Result<T>;
}

impl<T> Context<T> for Result<T> {
    fn context<C: Into<String>>(self, context: C) -> Result<T> {
        self.map_err(|source| DeployError::Context {
            context: context.into(),
            source: Box::new(source),
        })
    }

    fn with_context<C: Into<String>, F: FnOnce() -> C>(self, f: F) -> Result<T> {
        self.map_err(|source| DeployError::Context {
            context: f().into(),
            source: Box::new(source),
        })
    }
}

pub type Result<T> = std::result::Result<T, DeployError>;
