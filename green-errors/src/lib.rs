//! Per-domain error enums for the evaluation pipeline, unified under
//! [`GreenError`] the way `error_types` unifies its domain errors under
//! `PhoenixError`.

use std::path::PathBuf;
use thiserror::Error;

/// Failures setting up or tearing down a sandboxed test execution.
///
/// Never raised for a non-zero subprocess exit code — that is a normal,
/// classified [`crate::RunnerError`]-free result, not an error.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to create sandbox workspace: {0}")]
    Workspace(#[source] std::io::Error),

    #[error("failed to write {path} into sandbox: {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to spawn test process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("failed to read test process output: {0}")]
    Io(#[source] std::io::Error),
}

/// Failures driving the external mutation-testing tool.
#[derive(Debug, Error)]
pub enum MutationError {
    #[error("failed to create mutation workspace: {0}")]
    Workspace(#[source] std::io::Error),

    #[error("failed to spawn mutation tool: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("failed to read mutation tool output: {0}")]
    Io(#[source] std::io::Error),
}

/// Failures communicating with the external Purple agent.
#[derive(Debug, Error)]
pub enum PurpleAgentError {
    #[error("request to Purple agent timed out")]
    Timeout,

    #[error("transport error contacting Purple agent: {0}")]
    Transport(String),

    #[error("Purple agent returned no tests")]
    EmptyResponse,

    #[error("invalid Python syntax in Purple agent response: {0}")]
    InvalidSyntax(String),

    #[error("Purple agent request failed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
}

/// Failures loading a task directory from disk.
#[derive(Debug, Error)]
pub enum TaskLoadError {
    #[error("task directory not found: {0}")]
    MissingDirectory(PathBuf),

    #[error("missing required task file: {0}")]
    MissingFile(PathBuf),

    #[error("malformed metadata.json at {path}: {source}")]
    MalformedMetadata {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures loading and validating `scenario.toml` + environment settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("scenario file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("failed to read scenario file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse scenario file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("scenario file missing [config] table")]
    MissingConfigTable,

    #[error("invalid track {0:?}, expected \"tdd\" or \"bdd\"")]
    InvalidTrack(String),

    #[error("environment variable OPENAI_API_KEY is required and must be non-empty")]
    MissingApiKey,
}

/// Failures surfaced by the evaluation executor itself, as opposed to the
/// per-task failures it absorbs into zeroed task details.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("failed to serialize result artifact: {0}")]
    Artifact(#[source] serde_json::Error),
}

/// Umbrella error composing every domain error, the way `error_types`
/// composes `ConsentError`/`BudgetError`/... into `PhoenixError`.
#[derive(Debug, Error)]
pub enum GreenError {
    #[error(transparent)]
    Runner(#[from] RunnerError),

    #[error(transparent)]
    Mutation(#[from] MutationError),

    #[error(transparent)]
    PurpleAgent(#[from] PurpleAgentError),

    #[error(transparent)]
    TaskLoad(#[from] TaskLoadError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Executor(#[from] ExecutorError),
}
