//! Error types for gitsync-sync.

use std::path::PathBuf;

use thiserror::Error;

use gitsync_catalog::CatalogError;

/// Run-level errors. Each one aborts the run; per-repository failures are
/// reported through outcomes instead.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Discovery failed (authentication, profile or page fetch).
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// The working root could not be listed.
    #[error("cannot read working root {path}: {source}")]
    Inventory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A repository task panicked.
    #[error("sync task join failure: {0}")]
    Join(String),
}

/// Convenience constructor for [`SyncError::Inventory`].
pub(crate) fn inventory_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Inventory {
        path: path.into(),
        source,
    }
}

/// A single `git` invocation failed.
#[derive(Debug, Error)]
pub enum GitError {
    #[error("failed to run git {args}: {source}")]
    Spawn {
        args: String,
        #[source]
        source: std::io::Error,
    },

    #[error("git {args} exited with {status}: {stderr}")]
    Failed {
        args: String,
        status: String,
        stderr: String,
    },
}

/// A clone failed; carries the URL that was attempted.
#[derive(Debug, Error)]
#[error("failed to clone {url}: {source}")]
pub struct CloneError {
    pub url: String,
    #[source]
    pub source: GitError,
}
