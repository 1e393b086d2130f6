use crate::config::SftpConfig;
use crate::error::StoreError;
use r2d2::{ManageConnection, Pool};
use std::net::TcpStream;
use std::path::Path;

pub type SftpPool = Pool<SftpConnectionManager>;

/// One authenticated SSH session with its SFTP channel.
pub struct SftpConnection {
    // Keeps the transport alive for the channel.
    _session: ssh2::Session,
    pub sftp: ssh2::Sftp,
}

pub struct SftpConnectionManager {
    config: SftpConfig,
}

impl SftpConnectionManager {
    pub fn new(config: SftpConfig) -> Self {
        Self { config }
    }
}

impl ManageConnection for SftpConnectionManager {
    type Connection = SftpConnection;
    type Error = StoreError;

    fn connect(&self) -> Result<SftpConnection, StoreError> {
        let tcp = TcpStream::connect(self.config.address())?;
        let mut sess = ssh2::Session::new()?;
        sess.set_timeout(self.config.timeout.as_millis() as u32);
        sess.set_tcp_stream(tcp);
        sess.handshake()?;

        sess.userauth_password(&self.config.user, &self.config.password)
            .map_err(|_| StoreError::Authentication(self.config.user.clone()))?;

        if !sess.authenticated() {
            return Err(StoreError::Authentication(self.config.user.clone()));
        }

        let sftp = sess.sftp()?;
        tracing::debug!(host = %self.config.host, "Opened SFTP session");

        Ok(SftpConnection { _session: sess, sftp })
    }

    fn is_valid(&self, conn: &mut SftpConnection) -> Result<(), StoreError> {
        conn.sftp.stat(Path::new(".")).map(|_| ()).map_err(StoreError::from)
    }

    fn has_broken(&self, _conn: &mut SftpConnection) -> bool {
        false
    }
}

/// Pool sizing derived from the store configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    pub max_size: u32,
    pub min_idle: u32,
    /// Validate a session with a round trip before every checkout
    pub test_on_check_out: bool,
}

impl PoolSettings {
    pub fn from_config(config: &SftpConfig) -> Self {
        let max_size = config.max_connections.max(1);
        Self {
            max_size,
            min_idle: config.min_idle.min(max_size),
            // A dead session fails its call instead.
            test_on_check_out: false,
        }
    }
}

pub fn create_pool(config: SftpConfig) -> Result<SftpPool, StoreError> {
    let settings = PoolSettings::from_config(&config);
    let timeout = config.timeout;

    let pool = Pool::builder()
        .max_size(settings.max_size)
        .min_idle(Some(settings.min_idle))
        .test_on_check_out(settings.test_on_check_out)
        .connection_timeout(timeout)
        .build(SftpConnectionManager::new(config))?;

    Ok(pool)
}
