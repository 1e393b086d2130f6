//! FTP file store
//!
//! Pooled FTP control connections exposing the blocking file operations a
//! deployment needs. FTP reports most failures as a bare 550, so existence is
//! checked separately where the caller cares about it.

pub mod config;
pub mod error;
pub mod pool;
pub mod store;

pub use config::FtpConfig;
pub use error::{Result, StoreError};
pub use store::{FtpStore, RemoteEntry};
