//! CLI-specific error types and exit code mapping

use vigil_audit::AuditError;
use vigil_core::error::VigilError;

/// CLI-specific error type.
///
/// The `exit_code()` method maps errors to process exit codes.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// Service version, entitlement or scanner setup failed.
    #[error("setup failed: {0}")]
    Setup(String),

    /// Findings ask to fail the build.
    #[error("{0}")]
    FailBuild(String),

    /// Some scan tasks failed; the joined error lists one failure per line.
    #[error("audit finished with errors:\n{0}")]
    PartialFailure(String),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (file read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error from vigil-core.
    #[error("{0}")]
    Core(#[from] VigilError),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                              |
    /// |------|--------------------------------------|
    /// | 0    | Success                              |
    /// | 1    | General / command error              |
    /// | 2    | Configuration error                  |
    /// | 3    | Service or scanner setup failed      |
    /// | 4    | Findings fail the build (`--fail`)   |
    /// | 5    | Partial scan failure                 |
    /// | 10   | IO error                             |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::Setup(_) => 3,
            Self::FailBuild(_) => 4,
            Self::PartialFailure(_) => 5,
            Self::Io(_) => 10,
            Self::Core(core) => match core {
                VigilError::Config(_) => 2,
                VigilError::Service(_) => 3,
                VigilError::Io(_) => 10,
                VigilError::Scan(_) => 1,
            },
            Self::JsonSerialize(_) | Self::Command(_) => 1,
        }
    }
}

impl From<AuditError> for CliError {
    fn from(e: AuditError) -> Self {
        match e {
            AuditError::Service(_) | AuditError::ScaSetup(_) | AuditError::JasSetup(_) => {
                Self::Setup(e.to_string())
            }
            other => Self::Core(other.into()),
        }
    }
}
