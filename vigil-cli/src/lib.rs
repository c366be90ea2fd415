//! Vigil CLI library
//!
//! - [`cli`]: clap argument definitions
//! - [`commands`]: one handler per subcommand
//! - [`error`]: `CliError` and exit codes
//! - [`logging`]: tracing subscriber setup
//! - [`output`]: text/JSON rendering

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod output;

use cli::{Cli, Commands};
use error::CliError;
use output::OutputWriter;

/// Dispatches a parsed command line.
pub async fn run(cli: Cli) -> Result<(), CliError> {
    let writer = OutputWriter::new(cli.output);
    match cli.command {
        Commands::Audit(args) => commands::audit::execute(args, &cli.config, &writer).await,
        Commands::Config(args) => commands::config::execute(args, &cli.config, &writer).await,
    }
}
