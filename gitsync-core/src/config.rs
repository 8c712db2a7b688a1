//! Run configuration.
//!
//! # Storage layout
//!
//! ```text
//! ~/.gitsync/
//!   config.yaml   (optional: every key has a default)
//! ```
//!
//! # API pattern
//!
//! Loaders come in two forms:
//! - `fn_at(home: &Path, …)`: explicit home; used in tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`
//!
//! Command-line flags are applied on top of the loaded value by the binary.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::{ConnectionType, RemoteType};

pub const CONFIG_DIR: &str = ".gitsync";
pub const CONFIG_FILE: &str = "config.yaml";

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
pub const DEFAULT_BRANCH: &str = "master";
pub const DEFAULT_UPSTREAM: &str = "origin";
pub const DEFAULT_PAGE_CONCURRENCY: usize = 10;
pub const DEFAULT_WORKERS: usize = 8;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Every recognised option, with its default.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GitSyncConfig {
    /// Personal access token for the hosting API.
    pub token: Option<String>,
    pub connection: ConnectionType,
    pub remote: RemoteType,
    pub api_base: String,
    /// Branch every working copy is normalised to before pulling.
    pub default_branch: String,
    /// Remote pulled from.
    pub upstream_remote: String,
    /// Maximum in-flight page requests during discovery.
    pub page_concurrency: usize,
    /// Maximum repositories updated or cloned at once.
    pub workers: usize,
    /// Plan `Skip` for same-named directories that lack a `.git` entry.
    pub verify_working_copies: bool,
    /// Keys loaded into the signing agent before any clone or pull.
    pub ssh_keys: Vec<PathBuf>,
    pub http_timeout_secs: u64,
    /// Stop starting new repositories after this many seconds.
    pub run_timeout_secs: Option<u64>,
}

impl Default for GitSyncConfig {
    fn default() -> Self {
        Self {
            token: None,
            connection: ConnectionType::default(),
            remote: RemoteType::default(),
            api_base: DEFAULT_API_BASE.to_string(),
            default_branch: DEFAULT_BRANCH.to_string(),
            upstream_remote: DEFAULT_UPSTREAM.to_string(),
            page_concurrency: DEFAULT_PAGE_CONCURRENCY,
            workers: DEFAULT_WORKERS,
            verify_working_copies: true,
            ssh_keys: Vec::new(),
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            run_timeout_secs: None,
        }
    }
}

impl fmt::Debug for GitSyncConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitSyncConfig")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("connection", &self.connection)
            .field("remote", &self.remote)
            .field("api_base", &self.api_base)
            .field("default_branch", &self.default_branch)
            .field("upstream_remote", &self.upstream_remote)
            .field("page_concurrency", &self.page_concurrency)
            .field("workers", &self.workers)
            .field("verify_working_copies", &self.verify_working_copies)
            .field("ssh_keys", &self.ssh_keys)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("run_timeout_secs", &self.run_timeout_secs)
            .finish()
    }
}

impl GitSyncConfig {
    /// Reject values that parse but cannot drive a run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".into()));
        }
        if self.page_concurrency == 0 {
            return Err(ConfigError::Invalid("page_concurrency must be at least 1".into()));
        }
        if self.default_branch.trim().is_empty() {
            return Err(ConfigError::Invalid("default_branch must not be empty".into()));
        }
        if self.upstream_remote.trim().is_empty() {
            return Err(ConfigError::Invalid("upstream_remote must not be empty".into()));
        }
        if self.api_base.trim().is_empty() {
            return Err(ConfigError::Invalid("api_base must not be empty".into()));
        }
        Ok(())
    }

    /// The access token, or [`ConfigError::MissingToken`].
    pub fn require_token(&self) -> Result<&str, ConfigError> {
        self.token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingToken)
    }
}

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.gitsync/config.yaml`: pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    home.join(CONFIG_DIR).join(CONFIG_FILE)
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Parse and validate a config file at `path`.
///
/// Returns `ConfigError::NotFound` if absent,
/// `ConfigError::Parse` (with path + line context) if malformed YAML or an unknown key.
pub fn load_file(path: &Path) -> Result<GitSyncConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    // An empty file is a valid "all defaults" config.
    if contents.trim().is_empty() {
        return Ok(GitSyncConfig::default());
    }
    let config: GitSyncConfig =
        serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    config.validate()?;
    Ok(config)
}

/// Load the run configuration.
///
/// An explicit path must exist. Without one, `<home>/.gitsync/config.yaml` is
/// used when present and defaults otherwise.
pub fn load_at(home: &Path, explicit: Option<&Path>) -> Result<GitSyncConfig, ConfigError> {
    match explicit {
        Some(path) => load_file(path),
        None => {
            let path = config_path_at(home);
            if path.exists() {
                load_file(&path)
            } else {
                Ok(GitSyncConfig::default())
            }
        }
    }
}

/// `load_at` convenience wrapper.
pub fn load(explicit: Option<&Path>) -> Result<GitSyncConfig, ConfigError> {
    load_at(&home()?, explicit)
}

fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
