//! Logging setup, mirroring the teacher's `crates/horizon/src/logging.rs`:
//! an `EnvFilter` plus a switchable human/JSON formatting layer.

use crate::config::LoggingSettings;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn setup_logging(config: &LoggingSettings, json_override: bool) -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));
    let registry = tracing_subscriber::registry().with(filter);

    if json_override || config.json_format {
        registry
            .with(fmt::layer().json().with_file(false).with_line_number(false).with_thread_ids(true))
            .init();
    } else {
        registry
            .with(fmt::layer().with_ansi(true).with_file(false).with_line_number(false).with_thread_ids(true))
            .init();
    }

    info!(level = %config.level, "logging initialized");
    Ok(())
}

pub fn display_banner() {
    let version = option_env!("CARGO_PKG_VERSION").unwrap_or("unknown");
    info!("squad aegis control plane v{version}");
}
