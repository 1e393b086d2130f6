use crate::config::FtpConfig;
use crate::error::StoreError;
use r2d2::{ManageConnection, Pool};
use std::net::ToSocketAddrs;
use suppaftp::types::FileType;
use suppaftp::FtpStream;

pub type FtpPool = Pool<FtpConnectionManager>;

pub struct FtpConnectionManager {
    config: FtpConfig,
}

impl FtpConnectionManager {
    pub fn new(config: FtpConfig) -> Self {
        Self { config }
    }
}

impl ManageConnection for FtpConnectionManager {
    type Connection = FtpStream;
    type Error = StoreError;

    fn connect(&self) -> Result<FtpStream, StoreError> {
        let address = self.config.address();
        let addr = address.to_socket_addrs()?.next().ok_or_else(|| {
            StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("cannot resolve {}", address),
            ))
        })?;

        let mut ftp = FtpStream::connect_timeout(addr, self.config.timeout)?;
        ftp.get_ref().set_read_timeout(Some(self.config.timeout))?;
        ftp.get_ref().set_write_timeout(Some(self.config.timeout))?;

        ftp.login(&self.config.user, &self.config.password)
            .map_err(|_| StoreError::Authentication(self.config.user.clone()))?;
        ftp.transfer_type(FileType::Binary)?;

        tracing::debug!(host = %self.config.host, "Opened FTP connection");
        Ok(ftp)
    }

    fn is_valid(&self, conn: &mut FtpStream) -> Result<(), StoreError> {
        conn.noop().map_err(StoreError::from)
    }

    fn has_broken(&self, _conn: &mut FtpStream) -> bool {
        false
    }
}

/// Pool sizing derived from the store configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    pub max_size: u32,
    pub min_idle: u32,
    pub test_on_check_out: bool,
}

impl PoolSettings {
    pub fn from_config(config: &FtpConfig) -> Self {
        let max_size = config.max_connections.max(1);
        Self {
            max_size,
            min_idle: config.min_idle.min(max_size),
            // A dropped control connection fails its call instead.
            test_on_check_out: false,
        }
    }
}

pub fn create_pool(config: FtpConfig) -> Result<FtpPool, StoreError> {
    let settings = PoolSettings::from_config(&config);
    let timeout = config.timeout;

    let pool = Pool::builder()
        .max_size(settings.max_size)
        .min_idle(Some(settings.min_idle))
        .test_on_check_out(settings.test_on_check_out)
        .connection_timeout(timeout)
        .build(FtpConnectionManager::new(config))?;

    Ok(pool)
}
