//! Squad Aegis control-plane binary: CLI parsing, configuration loading,
//! and application lifecycle management (SPEC_FULL §2).
//!
//! This entry point wires the RCON manager, log pipeline, event manager,
//! and plugin runtime together and drives the graceful shutdown sequence
//! from spec.md §6. Mirrors the teacher's `lib_horizon`/`horizon` bin/lib
//! split in `crates/horizon`.

mod app;
mod cli;
mod config;
mod error;
mod logging;
mod signals;

use tracing::error;

pub use app::Application;
pub use cli::CliArgs;
pub use config::AppConfig;
pub use error::AegisError;

/// Parses CLI arguments, sets up logging, builds the [`Application`], and
/// runs it to completion. Called from `main` (not itself `#[tokio::main]`
/// since it runs inside an already-started runtime).
pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse_args();

    let mut config = AppConfig::load_from_file(&args.config).await?;
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    if args.json_logs {
        config.logging.json_format = true;
    }
    config.validate()?;

    if let Err(e) = logging::setup_logging(&config.logging, args.json_logs) {
        eprintln!("failed to set up logging: {e}");
        std::process::exit(1);
    }

    match Application::new(config).await {
        Ok(app) => {
            if let Err(e) = app.run().await {
                error!(error = %e, "application error");
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!(error = %e, "failed to start application");
            std::process::exit(1);
        }
    }

    Ok(())
}
