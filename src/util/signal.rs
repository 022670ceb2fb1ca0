//! Termination signals
// (c) 2026 The mqft authors

use tracing::{debug, warn};

/// Completes when the process is asked to stop (SIGINT, or SIGTERM on Unix).
///
/// If a handler cannot be installed, that signal is ignored here and a warning logged.
pub async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("cannot listen for interrupt: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                let _ = sig.recv().await;
            }
            Err(e) => {
                warn!("cannot listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = interrupt => debug!("interrupted"),
        () = terminate => debug!("terminated"),
    }
}
