//! Signal handling for SIGTERM and SIGINT.
//!
//! A signal cancels the deploy token: the pipeline stops dispatching new work,
//! operations already talking to the server finish, and the run aborts.

use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Cancels a token when the process is asked to stop.
pub struct ShutdownCoordinator {
    cancel: CancellationToken,
}

impl ShutdownCoordinator {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    /// Token observed by the deployment
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Spawn the signal listener. It exits on its own once the token is
    /// cancelled for any other reason.
    pub fn listen(&self) -> JoinHandle<()> {
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = wait_for_signal() => {
                    warn!("Stopping deployment, waiting for in-flight transfers to finish...");
                    cancel.cancel();
                }
                _ = cancel.cancelled() => {}
            }
        })
    }
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT (Ctrl+C)"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
