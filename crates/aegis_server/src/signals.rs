//! Signal handling for graceful shutdown (spec.md §5/§6): `SIGTERM`/`SIGINT`
//! cancel a root [`CancellationToken`] that every long-lived component
//! descends from, mirroring the teacher's two-phase shutdown in
//! `crates/horizon/src/signals.rs`, adapted from `ShutdownState` to the
//! cancellation-token idiom used throughout this workspace.

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Waits for a termination signal, then cancels `root`. A second signal
/// received after the first forces an immediate exit, so an operator is
/// never stuck waiting on a graceful shutdown that hangs.
pub async fn wait_for_shutdown(root: CancellationToken) {
    wait_for_signal().await;
    info!("shutdown signal received, cancelling root token");
    root.cancel();

    tokio::spawn(async move {
        wait_for_signal().await;
        warn!("second shutdown signal received, exiting immediately");
        std::process::exit(1);
    });
}

async fn wait_for_signal() {
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
}
