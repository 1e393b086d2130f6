//! SFTP file store
//!
//! Pooled SSH/SFTP sessions exposing the handful of blocking file operations
//! a deployment needs, with permission and existence failures classified.

pub mod config;
pub mod error;
pub mod pool;
pub mod store;

pub use config::SftpConfig;
pub use error::{Result, StoreError};
pub use store::{RemoteEntry, SftpStore};
