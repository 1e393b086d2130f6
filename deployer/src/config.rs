//! Configuration management for the deployer.
//!
//! Loads the deployment description from a TOML file. Credentials and action
//! fields may contain `{{VAR}}` placeholders; those are rendered later by the
//! environment generator, not here.

use crate::fs::parse_mode;
use crate::sync::IgnoreFilter;
use crate::utils::DeployError;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Folders created under the destination after sync
    #[serde(default)]
    pub folders: Vec<String>,

    /// Folders made world-writable, recursively, after sync
    #[serde(default)]
    pub readable_folders: Vec<String>,

    pub sync: SyncConfig,
    pub remote: RemoteConfig,

    #[serde(default)]
    pub log: LogConfig,

    #[serde(default)]
    pub before: StepConfig,

    #[serde(default)]
    pub after: StepConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Local tree to deploy
    pub source: String,

    /// Remote root the tree is deployed to
    pub destination: String,

    /// Remote path of the compressed manifest
    pub manifest_path: String,

    /// Regular expressions matched against "/"-rooted relative paths
    #[serde(default)]
    pub ignore: Vec<String>,

    #[serde(default = "default_file_mode")]
    pub default_file_mode: String,

    #[serde(default = "default_dir_mode")]
    pub default_dir_mode: String,

    #[serde(default = "default_readable_mode")]
    pub readable_mode: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default)]
    pub protocol: Protocol,

    pub host: String,

    /// Defaults to the protocol's well-known port
    #[serde(default)]
    pub port: Option<u16>,

    pub user: String,
    pub password: String,

    /// Upper bound of pooled connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_idle")]
    pub min_idle: u32,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Sftp,
    Ftp,
}

impl RemoteConfig {
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(match self.protocol {
            Protocol::Sftp => 22,
            Protocol::Ftp => 21,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Work done before or after the sync, in this order: generate, move,
/// action, clean.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepConfig {
    #[serde(default)]
    pub generate: Vec<GenerateStep>,

    #[serde(default, rename = "move")]
    pub moves: Vec<MoveStep>,

    #[serde(default)]
    pub action: Vec<ActionStep>,

    #[serde(default)]
    pub clean: CleanStep,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GenerateStep {
    /// Render a local template into a local file before it is deployed.
    Environment { template: String, destination: String },
}

/// Upload a local file to a different remote path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveStep {
    pub source: String,
    pub destination: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ActionStep {
    Http {
        url: String,
        #[serde(default = "default_method")]
        method: String,
        #[serde(default)]
        headers: HashMap<String, String>,
        #[serde(default)]
        body: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanStep {
    /// Remote files to delete
    #[serde(default)]
    pub files: Vec<String>,

    /// Remote folders to empty
    #[serde(default)]
    pub folders: Vec<String>,
}

// Default values
fn default_file_mode() -> String {
    "0644".to_string()
}

fn default_dir_mode() -> String {
    "0755".to_string()
}

fn default_readable_mode() -> String {
    "0777".to_string()
}

fn default_max_connections() -> u32 {
    30
}

fn default_min_idle() -> u32 {
    5
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_method() -> String {
    "GET".to_string()
}

impl Config {
    /// Load and validate configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DeployError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(|e| DeployError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.sync.source.trim().is_empty() {
            return Err(DeployError::Config("sync.source must not be empty".into()));
        }
        if self.sync.destination.trim().is_empty() {
            return Err(DeployError::Config("sync.destination must not be empty".into()));
        }
        if self.sync.manifest_path.trim().is_empty() {
            return Err(DeployError::Config("sync.manifest_path must not be empty".into()));
        }
        if self.remote.min_idle > self.remote.max_connections {
            return Err(DeployError::Config(
                "remote.min_idle must not exceed remote.max_connections".into(),
            ));
        }

        self.file_mode()?;
        self.dir_mode()?;
        self.readable_mode()?;
        self.ignore_filter()?;
        Ok(())
    }

    pub fn file_mode(&self) -> Result<u32> {
        mode("sync.default_file_mode", &self.sync.default_file_mode)
    }

    pub fn dir_mode(&self) -> Result<u32> {
        mode("sync.default_dir_mode", &self.sync.default_dir_mode)
    }

    pub fn readable_mode(&self) -> Result<u32> {
        mode("sync.readable_mode", &self.sync.readable_mode)
    }

    pub fn ignore_filter(&self) -> Result<IgnoreFilter> {
        IgnoreFilter::new(&self.sync.ignore)
            .map_err(|e| DeployError::Config(format!("sync.ignore: {}", e)))
    }
}

fn mode(key: &str, value: &str) -> Result<u32> {
    parse_mode(value).ok_or_else(|| DeployError::Config(format!("{} is not an octal mode: {:?}", key, value)))
}
