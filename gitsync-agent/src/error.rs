use std::path::PathBuf;

use thiserror::Error;

/// Error surface for the signing-agent adapter.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("ssh-agent output is missing {0}")]
    MissingToken(&'static str),

    #[error("failed to add key {path}: {reason}")]
    AddKey { path: PathBuf, reason: String },
}
