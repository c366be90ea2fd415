use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;

use vigil_cli::cli::Cli;
use vigil_core::config::{GeneralConfig, VigilConfig};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // an unreadable config is reported by the command itself
    let general = VigilConfig::load_or_default(&cli.config)
        .await
        .map(|c| c.general)
        .unwrap_or_else(|_| GeneralConfig::default());
    if let Err(e) = vigil_cli::logging::init_tracing(&general, cli.log_level.as_deref()) {
        eprintln!("{} {e:#}", "warning:".yellow());
    }

    match vigil_cli::run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let code = e.exit_code();
            tracing::debug!(exit_code = code, "command failed");
            eprintln!("{} {e}", "error:".red().bold());
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}
