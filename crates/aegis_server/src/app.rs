//! Root struct and lifecycle for the control-plane binary (SPEC_FULL §2,
//! §9's "root-struct encapsulation of global mutable state"): owns the
//! Event Manager, RCON Manager, log pipeline tasks, and Plugin Runtime,
//! and drives the graceful shutdown sequence from spec.md §6.

use std::sync::Arc;
use std::time::Duration;

use aegis_events::{EventManager, ServerId};
use aegis_logs::source::sftp::SftpAuth;
use aegis_logs::{FtpSource, LocalTailSource, SftpSource};
use aegis_persistence::InMemoryPersistence;
use aegis_plugins::{ConnectorRegistry, PluginManager, PluginRegistry};
use aegis_rcon::{RconManager, ServerTarget};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{AppConfig, LogSourceConfig};
use crate::error::AegisError;
use crate::logging::display_banner;

/// Owns every long-lived component and the root cancellation token they
/// all descend from.
pub struct Application {
    config: AppConfig,
    root_cancel: CancellationToken,
    events: Arc<EventManager>,
    rcon: Arc<RconManager>,
    plugins: Arc<PluginManager>,
    log_pipeline_handles: Vec<JoinHandle<()>>,
}

impl Application {
    /// Wires every component together from an already-loaded, validated
    /// configuration, but does not yet connect to any server or start the
    /// log pipeline — that happens in [`Self::run`].
    pub async fn new(config: AppConfig) -> Result<Self, AegisError> {
        display_banner();
        info!(servers = config.servers.len(), "configuration loaded");

        let root_cancel = CancellationToken::new();
        let events = Arc::new(EventManager::new());
        let rcon = Arc::new(RconManager::new(events.clone()).with_command_wait_deadline(Duration::from_secs(config.rcon.command_wait_seconds)));
        let persistence = Arc::new(InMemoryPersistence::new());
        let plugin_registry = Arc::new(PluginRegistry::new());
        let connector_registry = Arc::new(ConnectorRegistry::new());
        let plugins = Arc::new(PluginManager::new(plugin_registry, connector_registry, persistence, events.clone(), rcon.clone()));

        Ok(Self {
            config,
            root_cancel,
            events,
            rcon,
            plugins,
            log_pipeline_handles: Vec::new(),
        })
    }

    /// Connects every configured server's RCON session, starts its log
    /// pipeline if configured, starts the plugin event router, then waits
    /// for `SIGTERM`/`SIGINT` before running the shutdown sequence.
    pub async fn run(mut self) -> Result<(), AegisError> {
        for server in self.config.servers.clone() {
            let server_id = ServerId::from_uuid(server.id);
            self.rcon.connect(ServerTarget {
                server_id,
                addr: server.address.clone(),
                password: server.rcon_password.clone(),
            });
            self.plugins.register_server(server_id, server.name.clone(), server.address.clone());

            if let Some(log_source) = server.log_source.clone() {
                self.start_log_pipeline(server_id, log_source);
            }
        }

        self.plugins.start();

        info!("squad aegis control plane is running");
        crate::signals::wait_for_shutdown(self.root_cancel.clone()).await;

        self.shutdown().await;
        Ok(())
    }

    fn start_log_pipeline(&mut self, server_id: ServerId, config: LogSourceConfig) {
        let cancel = self.root_cancel.child_token();
        let events = self.events.clone();

        let source: Arc<dyn aegis_logs::LogSource> = match config {
            LogSourceConfig::Local { path, read_from_start } => Arc::new(LocalTailSource::new(path, read_from_start)),
            LogSourceConfig::Sftp {
                host,
                port,
                username,
                password,
                key_path,
                key_passphrase,
                remote_path,
                read_from_start,
                poll_interval_seconds,
            } => {
                let auth = match key_path {
                    Some(path) => SftpAuth::PrivateKey { path, passphrase: key_passphrase },
                    None => SftpAuth::Password(password.unwrap_or_default()),
                };
                Arc::new(SftpSource::new(host, port, username, auth, remote_path, read_from_start).with_poll_interval(Duration::from_secs(poll_interval_seconds)))
            }
            LogSourceConfig::Ftp {
                host,
                port,
                username,
                password,
                remote_path,
                read_from_start,
                poll_interval_seconds,
            } => Arc::new(FtpSource::new(host, port, username, password, remote_path, read_from_start).with_poll_interval(Duration::from_secs(poll_interval_seconds))),
        };

        let handle = tokio::spawn(async move {
            if let Err(e) = aegis_logs::run_pipeline(server_id, source, events, cancel).await {
                error!(server_id = %server_id, error = %e, "log pipeline exited with an error");
            }
        });
        self.log_pipeline_handles.push(handle);
    }

    /// Shutdown sequence per spec.md §6: stop plugin subscribers, stop
    /// plugins, stop connectors, close RCON, close log sources, close
    /// gRPC (the last is `aegis_logwatcher`'s own process, not ours).
    async fn shutdown(self) {
        info!("beginning graceful shutdown");

        info!("stopping plugin event router, instances, and connectors");
        self.plugins.shutdown_all().await;

        info!("cancelling log sources and rcon supervisors");
        self.root_cancel.cancel();

        for handle in self.log_pipeline_handles {
            if tokio::time::timeout(Duration::from_secs(5), handle).await.is_err() {
                warn!("a log pipeline task did not stop within its timeout");
            }
        }

        self.rcon.shutdown().await;

        info!("shutdown complete");
    }
}
