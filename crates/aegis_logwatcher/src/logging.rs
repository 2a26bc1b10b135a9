//! Logging setup, the same human/JSON switch as `aegis_server` uses,
//! duplicated here because this binary runs as a wholly separate process
//! (spec.md §4.8's "standalone").

use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn setup_logging(level: &str, json_logs: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    if json_logs {
        registry.with(fmt::layer().json().with_file(false).with_line_number(false)).init();
    } else {
        registry.with(fmt::layer().with_ansi(true).with_file(false).with_line_number(false)).init();
    }

    info!(level, "logging initialized");
}
