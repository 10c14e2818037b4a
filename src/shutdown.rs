//! Coordinated shutdown of the signaling server and its background tasks.

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Grace period for registered tasks after the token is cancelled.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

pub struct ShutdownManager {
    cancel_token: CancellationToken,
    task_handles: Vec<JoinHandle<()>>,
}

impl ShutdownManager {
    pub fn new() -> Self {
        Self {
            cancel_token: CancellationToken::new(),
            task_handles: Vec::new(),
        }
    }

    /// Clone of the token handed to every long-running task.
    pub fn token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    pub fn register_task(&mut self, handle: JoinHandle<()>) {
        self.task_handles.push(handle);
    }

    /// Wait for ctrl+c or SIGTERM, then stop everything.
    pub async fn wait_for_shutdown(self) {
        if let Err(e) = wait_for_signal().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
            return;
        }

        tracing::info!("🛑 Shutdown signal received");
        self.shutdown(SHUTDOWN_GRACE).await;
    }

    /// Cancel the token and wait up to `grace` for registered tasks.
    /// Returns false if some task was still running when the grace ran out.
    pub async fn shutdown(mut self, grace: Duration) -> bool {
        self.cancel_token.cancel();

        let shutdown_tasks = std::pin::pin!(async {
            for handle in self.task_handles.drain(..) {
                let _ = handle.await;
            }
        });

        match tokio::time::timeout(grace, shutdown_tasks).await {
            Ok(_) => {
                tracing::info!("✓ All tasks shut down gracefully");
                true
            }
            Err(_) => {
                tracing::warn!("⏱️  Shutdown timeout: Some tasks did not complete");
                false
            }
        }
    }
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
