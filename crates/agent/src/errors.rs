use std::path::PathBuf;

use copilot_core::ArgumentError;
use thiserror::Error;

use crate::api::{ApiError, RunStatus};
use crate::resources::ResourceKind;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Argument(#[from] ArgumentError),
    #[error("could not read `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("no remote assistant is provisioned for this agent")]
    NotProvisioned,
    #[error("run `{run_id}` requested function calls but no function-call delegate is configured")]
    MissingFunctionDelegate { run_id: String },
    #[error("run `{run_id}` ended with status {status}: {message}")]
    RunEnded { run_id: String, status: RunStatus, message: String },
    #[error("run `{run_id}` did not reach a terminal status within {waited_secs}s")]
    RunTimedOut { run_id: String, waited_secs: u64 },
    #[error("service reported {kind} `{id}` as not deleted")]
    NotDeleted { kind: ResourceKind, id: String },
    #[error("cleanup left {0} remote resource(s) behind")]
    CleanupIncomplete(usize),
}

impl AgentError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    /// Short machine-readable class used by the CLI payloads.
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Argument(_) => "argument",
            Self::Io { .. } => "io",
            Self::Api(_) => "assistants_api",
            Self::NotProvisioned => "not_provisioned",
            Self::MissingFunctionDelegate { .. } => "function_calling",
            Self::RunEnded { .. } => "run_failed",
            Self::RunTimedOut { .. } => "run_timeout",
            Self::NotDeleted { .. } | Self::CleanupIncomplete(_) => "cleanup",
        }
    }
}
