//! Error types for gitsync-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while building the run configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure reading the config file.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load: includes file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// An explicitly requested config file does not exist.
    #[error("config not found at {path}")]
    NotFound { path: PathBuf },

    /// A closed-set option received a value outside the set.
    #[error("invalid {field} '{value}'; expected one of: {expected}")]
    InvalidValue {
        field: &'static str,
        value: String,
        expected: &'static str,
    },

    /// A value parsed but violates a constraint (zero workers, empty branch...).
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// No access token from flag, environment or config file.
    #[error("no access token; pass --token, set GITSYNC_TOKEN/GITHUB_TOKEN, or add `token:` to the config")]
    MissingToken,

    /// Only GitHub has a catalog implementation.
    #[error("remote type {remote} is not supported; only GITHUB is implemented")]
    UnsupportedRemote { remote: crate::types::RemoteType },

    /// The action parsed but has no implementation.
    #[error("action '{action}' is not supported; only 'pull' is implemented")]
    UnsupportedAction { action: String },

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}
