//! # gitsync-sync
//!
//! Reconciliation and per-repository sync.
//!
//! [`pipeline::run`] discovers remote repositories, scans the working root,
//! builds a [`SyncPlan`](gitsync_core::SyncPlan) and executes it on a bounded
//! worker pool. Each repository ends in its own
//! [`UpdateOutcome`](gitsync_core::UpdateOutcome); one failure never stops
//! its siblings.

pub mod error;
pub mod git;
pub mod inventory;
pub mod pipeline;
pub mod plan;
pub mod updater;

pub use error::{CloneError, GitError, SyncError};
pub use git::{GitCli, GitOps};
pub use pipeline::{SyncOptions, SyncReport};
pub use updater::{UpdateSettings, UpdateState};
