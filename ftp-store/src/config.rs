use std::time::Duration;

#[derive(Debug, Clone)]
pub struct FtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Upper bound of pooled control connections
    pub max_connections: u32,
    /// Connections kept open while idle
    pub min_idle: u32,
    pub timeout: Duration,
}

impl FtpConfig {
    pub fn new(host: impl Into<String>, user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 21,
            user: user.into(),
            password: password.into(),
            max_connections: 30,
            min_idle: 5,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
