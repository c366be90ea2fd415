//! CLI argument parsing using clap derive API
//!
//! Purely declarative: no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Vigil -- concurrent multi-scanner security audit.
///
/// Use `vigil <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "vigil", version, about, long_about = None)]
pub struct Cli {
    /// Path to the vigil.toml configuration file.
    #[arg(short, long, global = true, default_value = "vigil.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable colored summary.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Audit the project: dependency scan plus advanced scanners.
    Audit(AuditArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- audit ----

/// Run a full audit of one or more working directories.
#[derive(Args, Debug, Default)]
pub struct AuditArgs {
    /// Directories to scan (comma separated, default: current directory).
    #[arg(long, value_delimiter = ',')]
    pub working_dirs: Vec<PathBuf>,

    /// Exclusion patterns for lockfile discovery (comma separated wildcards).
    #[arg(long, value_delimiter = ',')]
    pub exclusions: Vec<String>,

    /// Watches to evaluate violations against (comma separated).
    #[arg(long, value_delimiter = ',')]
    pub watches: Vec<String>,

    /// Project key to evaluate violations against.
    #[arg(long)]
    pub project: Option<String>,

    /// Repository path to evaluate violations against.
    #[arg(long)]
    pub repo_path: Option<String>,

    /// Report all vulnerabilities regardless of watches or project.
    #[arg(long)]
    pub vuln: bool,

    /// Include license information.
    #[arg(long)]
    pub licenses: bool,

    /// Exit with code 4 when a violation asks to fail the build.
    #[arg(long)]
    pub fail: bool,

    /// Number of worker tasks.
    #[arg(long)]
    pub threads: Option<usize>,

    /// Scan against a local vulnerability DB directory instead of the remote service.
    #[arg(long)]
    pub local_db: Option<PathBuf>,
}

// ---- config ----

/// Manage vigil configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only a specific section (general, server, audit, analyzer, sca).
        #[arg(long)]
        section: Option<String>,
    },
}
