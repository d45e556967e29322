use std::path::PathBuf;
use std::time::Duration;

/// Errors related to configuration loading and parsing.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Agent config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Failed to parse config at {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid agent config: {0}")]
    Invalid(String),

    #[error("Refusing to overwrite existing file {path} (use --force)")]
    AlreadyExists { path: PathBuf },
}

/// Why a backend proxy never became ready.
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("`{program}` not found; make sure it is installed and on PATH")]
    NotFound { program: String },

    #[error("Failed to spawn `{program}`: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("readiness timeout")]
    ReadinessTimeout { after: Duration },

    #[error("process exited before becoming ready ({status})")]
    ExitedEarly { status: String },
}

/// Errors raised by a query submission backend.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("Failed to start client: {0}")]
    Spawn(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("LLM error: {0}")]
    Llm(String),
}

/// Errors for a single agent task. Always folded into a `TaskResult`.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("timeout")]
    Timeout,

    #[error(transparent)]
    Submit(#[from] SubmitError),

    #[error("empty response")]
    EmptyResponse,

    #[error("task aborted: {0}")]
    Aborted(String),
}

/// Run-level errors. Everything else is reported through the run report.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("No enabled agents in configuration")]
    NoEnabledAgents,
}
