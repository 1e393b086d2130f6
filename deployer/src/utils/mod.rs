//! Utility modules for the deployer.

pub mod errors;
pub mod logger;
pub mod shutdown;

pub use errors::{Context, DeployError, Result};
