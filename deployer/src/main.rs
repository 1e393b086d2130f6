//! Deployer - Main entry point
//!
//! Runs one deployment described by a TOML file: before steps, incremental
//! sync over SFTP or FTP, folder setup, after steps.

use anyhow::{Context, Result};
use clap::Parser;
use deployer::config::Protocol;
use deployer::executor::generator::EnvironmentGenerator;
use deployer::executor::Deployer;
use deployer::fs::remote::Transport;
use deployer::utils::shutdown::ShutdownCoordinator;
use deployer::{utils, Config};
use ftp_store::{FtpConfig, FtpStore};
use sftp_store::{SftpConfig, SftpStore};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "deploy.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Variables from .env are visible to templates, not just the process
    dotenvy::dotenv().ok();
    let vars: HashMap<String, String> = std::env::vars().collect();

    let config = Config::from_file(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;

    let log_level = args.log_level.as_deref().unwrap_or(&config.log.level);
    utils::logger::init(log_level)?;

    tracing::info!(
        "Starting deployer v{} ({} -> {:?} {}:{})",
        env!("CARGO_PKG_VERSION"),
        config.sync.source,
        config.remote.protocol,
        config.remote.host,
        config.sync.destination
    );

    let generator = EnvironmentGenerator::new(vars);
    let host = generator.render(&config.remote.host)?;
    let user = generator.render(&config.remote.user)?;
    let password = generator.render(&config.remote.password)?;
    let timeout = Duration::from_secs(config.remote.timeout_secs);

    match config.remote.protocol {
        Protocol::Sftp => {
            let mut sftp = SftpConfig::new(host, user, password);
            sftp.port = config.remote.port();
            sftp.max_connections = config.remote.max_connections;
            sftp.min_idle = config.remote.min_idle;
            sftp.timeout = timeout;

            let address = sftp.address();
            let store = tokio::task::spawn_blocking(move || SftpStore::connect(sftp))
                .await?
                .with_context(|| format!("connecting to {}", address))?;
            run(config, store, generator).await
        }
        Protocol::Ftp => {
            let mut ftp = FtpConfig::new(host, user, password);
            ftp.port = config.remote.port();
            ftp.max_connections = config.remote.max_connections;
            ftp.min_idle = config.remote.min_idle;
            ftp.timeout = timeout;

            let address = ftp.address();
            let store = tokio::task::spawn_blocking(move || FtpStore::connect(ftp))
                .await?
                .with_context(|| format!("connecting to {}", address))?;
            run(config, store, generator).await
        }
    }
}

async fn run<T: Transport>(config: Config, store: T, generator: EnvironmentGenerator) -> Result<()> {
    let shutdown = ShutdownCoordinator::new(CancellationToken::new());
    let listener = shutdown.listen();
    let token = shutdown.token();

    let deployer = Deployer::new(config, store, generator)?;
    let result = deployer.deploy(&token).await;

    // Release the signal listener
    token.cancel();
    let _ = listener.await;

    let report = result?;
    if report.is_noop() {
        tracing::info!("Remote tree already up to date");
    }
    tracing::info!("Deployment finished in {:.2?}", report.duration);

    Ok(())
}
