//! Command-line argument parsing for the control-plane binary.

use std::path::PathBuf;

use clap::Parser;

/// Command-line overrides for `config.toml`.
#[derive(Debug, Clone, Parser)]
#[command(name = "aegis_server", version, about = "Squad Aegis control-plane")]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Overrides `logging.level`.
    #[arg(short = 'l', long)]
    pub log_level: Option<String>,

    /// Forces JSON log output regardless of `logging.json_format`.
    #[arg(long)]
    pub json_logs: bool,
}

impl CliArgs {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
