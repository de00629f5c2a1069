//! Signal handling for graceful shutdown.

/// Creates a future that completes when a shutdown signal is received.
///
/// Listens for SIGTERM and Ctrl+C. If a handler cannot be installed, the
/// remaining one is still awaited.
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => {
                        tracing::info!("Received SIGTERM, stopping simulation");
                        return;
                    }
                    _ = ctrl_c() => return,
                }
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
            }
        }
    }

    ctrl_c().await;
}

async fn ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C, stopping simulation"),
        Err(e) => {
            tracing::warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
