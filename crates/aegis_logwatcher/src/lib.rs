//! Standalone gRPC log relay (spec.md §4.8): tails one Squad server's log
//! source independently of `aegis_server` and streams raw lines and
//! parsed events to out-of-process consumers over a token-authenticated
//! gRPC service.

mod cli;
mod error;
mod hub;
mod logging;
mod service;
mod signals;
mod source;

use std::sync::Arc;

use aegis_logs::ParserBank;
use aegis_logs::EventStore;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;
use tracing::{error, info};

pub use cli::CliArgs;
pub use error::LogwatcherError;

use hub::LogHub;
use service::proto::log_watcher_server::LogWatcherServer;
use service::LogWatcherService;

/// Parses CLI args, sets up logging, and runs the relay to completion.
/// Returns an error only for fatal startup failures; a clean shutdown via
/// `SIGTERM`/`SIGINT` returns `Ok(())`.
pub async fn init() -> Result<(), LogwatcherError> {
    let args = CliArgs::parse_args();
    logging::setup_logging(&args.log_level, args.json_logs);

    let log_source = source::build_source(&args)?;
    let hub = Arc::new(LogHub::new());
    let root_cancel = CancellationToken::new();

    let pipeline_handle = {
        let hub = hub.clone();
        let cancel = root_cancel.child_token();
        tokio::spawn(async move { run_pipeline(log_source, hub, cancel).await })
    };

    let addr = format!("0.0.0.0:{}", args.port).parse().map_err(|e| LogwatcherError::Config(format!("invalid port: {e}")))?;
    let service = LogWatcherService::new(args.auth_token.clone(), hub.clone());

    info!(%addr, "log-watcher gRPC service listening");

    let server_cancel = root_cancel.child_token();
    let server = Server::builder().add_service(LogWatcherServer::new(service)).serve_with_shutdown(addr, async move {
        server_cancel.cancelled().await;
        info!("gRPC service shutting down");
    });

    tokio::spawn(signals::wait_for_shutdown(root_cancel.clone()));

    server.await?;
    root_cancel.cancel();
    if let Err(e) = pipeline_handle.await {
        error!(error = %e, "log pipeline task panicked");
    }

    info!("log-watcher shutdown complete");
    Ok(())
}

async fn run_pipeline(source: Arc<dyn aegis_logs::LogSource>, hub: Arc<LogHub>, cancel: CancellationToken) {
    let bank = ParserBank::new();
    let store = EventStore::new();

    let mut lines = match source.watch(cancel.clone()).await {
        Ok(lines) => lines,
        Err(e) => {
            error!(error = %e, "failed to start log source");
            return;
        }
    };

    while let Some(line) = lines.recv().await {
        hub.publish_line(&line);
        for parsed in bank.parse_line(&line, &store) {
            hub.publish_event(parsed.kind, parsed.payload);
        }
    }

    if cancel.is_cancelled() {
        info!("log pipeline stopped");
    } else {
        error!("log pipeline source closed unexpectedly");
    }
}
