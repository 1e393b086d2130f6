//! Deployer Library
//!
//! Incremental deployment of a local tree to a remote SFTP or FTP server: both trees
//! are hashed, diffed, and only the difference is applied. A compressed
//! manifest of the last run spares re-hashing the remote side.

pub mod config;
pub mod executor;
pub mod fs;
pub mod sync;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use utils::errors::{DeployError, Result};
