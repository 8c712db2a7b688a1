//! gitsync core library: domain types, configuration, errors.
//!
//! - [`types`]: repository, plan and outcome types shared by every crate
//! - [`config`]: [`GitSyncConfig`] load / validate
//! - [`error`]: [`ConfigError`]

pub mod config;
pub mod error;
pub mod types;

pub use config::GitSyncConfig;
pub use error::ConfigError;
pub use types::{
    ConnectionType, LocalEntry, OutcomeStatus, PlanEntry, RemoteRepository, RemoteType, RepoName,
    SyncAction, SyncPlan, UpdateOutcome, UpdateStep,
};
