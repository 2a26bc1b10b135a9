//! `SIGTERM`/`SIGINT` handling: cancels the root token for a clean
//! shutdown (exit code 0 per spec.md §6).

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub async fn wait_for_shutdown(root: CancellationToken) {
    #[cfg(unix)]
    {
        use signal::unix::{signal, SignalKind};
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = sigint.recv() => (),
            _ = sigterm.recv() => (),
        }
    }

    #[cfg(windows)]
    {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    }

    info!("shutdown signal received");
    root.cancel();
}
