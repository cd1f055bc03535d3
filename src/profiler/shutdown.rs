//! Two-phase stop handling.
//!
//! The first stop request (SIGINT, SIGTERM, or a programmatic call) cancels
//! the run token: workers stop starting cycles and the engine begins its
//! drain. Any further request while draining forces the engine to skip the
//! rest of the drain grace period and flush immediately.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Stop coordinator shared by the signal listener and the engine.
#[derive(Clone, Default)]
pub struct ShutdownSignal {
    cancel: CancellationToken,
    force: CancellationToken,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// The run token observed by every worker.
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Request a stop. Requests after the first escalate to a forced stop.
    pub fn request_stop(&self) {
        if self.cancel.is_cancelled() {
            self.force.cancel();
        } else {
            self.cancel.cancel();
        }
    }

    pub fn is_stop_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn is_forced(&self) -> bool {
        self.force.is_cancelled()
    }

    /// Resolves once a forced stop has been requested.
    pub async fn forced(&self) {
        self.force.cancelled().await
    }

    /// Spawn a task that turns every SIGINT/SIGTERM (Ctrl+C off unix) into
    /// a [`request_stop`](Self::request_stop). Abort the handle when done.
    pub fn start_signal_listener(&self) -> JoinHandle<()> {
        let shutdown = self.clone();
        tokio::spawn(async move {
            #[cfg(unix)]
            {
                use tokio::signal::unix::{signal, SignalKind};

                let (mut sigterm, mut sigint) =
                    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                        (Ok(term), Ok(int)) => (term, int),
                        (Err(e), _) | (_, Err(e)) => {
                            warn!("Failed to install signal handlers: {e}");
                            return;
                        }
                    };

                loop {
                    tokio::select! {
                        Some(()) = sigterm.recv() => info!("Received SIGTERM"),
                        Some(()) = sigint.recv() => info!("Received SIGINT"),
                        else => return,
                    }
                    shutdown.announce_and_stop();
                }
            }

            #[cfg(not(unix))]
            {
                loop {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        warn!("Failed to listen for Ctrl+C: {e}");
                        return;
                    }
                    info!("Received Ctrl+C");
                    shutdown.announce_and_stop();
                }
            }
        })
    }

    fn announce_and_stop(&self) {
        if self.is_stop_requested() {
            info!("Stop already in progress, skipping drain");
        } else {
            info!("Stopping gracefully (signal again to skip the drain)");
        }
        self.request_stop();
    }
}
