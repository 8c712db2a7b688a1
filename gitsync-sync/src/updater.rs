//! Per-repository update protocol and clone.
//!
//! ## Update: state machine
//!
//! ```text
//! Start → CheckStatus ─clean─→ CheckBranch ─on default─→ Pull → Done
//!              └─dirty─→ Stash ─┘     └─elsewhere─→ Checkout ─┘
//! ```
//!
//! Any step may move to `Failed(step)`. Nothing is retried and nothing is
//! rolled back: a stash created before a later failure stays in the stash list
//! for the user to recover, and is never popped or dropped here.
//!
//! In dry-run mode the read-only queries (status, branch) still run; mutating
//! steps are recorded as planned instead of executed.

use std::path::Path;

use gitsync_core::{
    ConnectionType, OutcomeStatus, RemoteRepository, RepoName, SyncAction, UpdateOutcome,
    UpdateStep,
};

use crate::error::{CloneError, GitError};
use crate::git::{repo_dir_from_url, GitOps};

/// Branch and remote every working copy is brought to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateSettings {
    pub default_branch: String,
    pub upstream_remote: String,
}

/// States of the update protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateState {
    Start,
    CheckStatus,
    Stash,
    CheckBranch,
    Checkout,
    Pull,
    Done,
    Failed { step: UpdateStep, reason: String },
}

impl UpdateState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, UpdateState::Done | UpdateState::Failed { .. })
    }
}

struct Updater<'a, G: GitOps + ?Sized> {
    git: &'a G,
    dir: &'a Path,
    settings: &'a UpdateSettings,
    dry_run: bool,
    completed: Vec<UpdateStep>,
    planned: Vec<UpdateStep>,
}

impl<'a, G: GitOps + ?Sized> Updater<'a, G> {
    fn advance(&mut self, state: UpdateState) -> UpdateState {
        let (git, dir, settings) = (self.git, self.dir, self.settings);
        match state {
            UpdateState::Start => UpdateState::CheckStatus,
            UpdateState::CheckStatus => match git.status(dir) {
                Ok(status) => {
                    self.completed.push(UpdateStep::StatusCheck);
                    if status.trim().is_empty() {
                        UpdateState::CheckBranch
                    } else {
                        tracing::info!("pending changes; stashing");
                        UpdateState::Stash
                    }
                }
                Err(err) => failed(UpdateStep::StatusCheck, &err),
            },
            UpdateState::Stash => {
                self.mutate(UpdateStep::Stash, UpdateState::CheckBranch, |git| git.stash(dir))
            }
            UpdateState::CheckBranch => match git.current_branch(dir) {
                Ok(branch) => {
                    self.completed.push(UpdateStep::BranchCheck);
                    if branch.trim() == settings.default_branch {
                        UpdateState::Pull
                    } else {
                        tracing::info!(
                            from = %branch.trim(),
                            to = %settings.default_branch,
                            "switching branch",
                        );
                        UpdateState::Checkout
                    }
                }
                Err(err) => failed(UpdateStep::BranchCheck, &err),
            },
            UpdateState::Checkout => {
                self.mutate(UpdateStep::Checkout, UpdateState::Pull, |git| {
                    git.checkout(dir, &settings.default_branch)
                })
            }
            UpdateState::Pull => self.mutate(UpdateStep::Pull, UpdateState::Done, |git| {
                git.pull(dir, &settings.upstream_remote, &settings.default_branch)
            }),
            terminal @ (UpdateState::Done | UpdateState::Failed { .. }) => terminal,
        }
    }

    fn mutate(
        &mut self,
        step: UpdateStep,
        next: UpdateState,
        op: impl FnOnce(&G) -> Result<(), GitError>,
    ) -> UpdateState {
        if self.dry_run {
            self.planned.push(step);
            return next;
        }
        match op(self.git) {
            Ok(()) => {
                self.completed.push(step);
                next
            }
            Err(err) => failed(step, &err),
        }
    }
}

fn failed(step: UpdateStep, err: &GitError) -> UpdateState {
    tracing::warn!(%step, error = %err, "update step failed");
    UpdateState::Failed {
        step,
        reason: err.to_string(),
    }
}

/// Bring the working copy at `dir` to the tip of the default branch.
///
/// Never returns an error: a failing step becomes
/// [`OutcomeStatus::Failed`] naming that step.
pub fn update_repository<G: GitOps + ?Sized>(
    git: &G,
    name: &RepoName,
    dir: &Path,
    settings: &UpdateSettings,
    dry_run: bool,
) -> UpdateOutcome {
    let mut updater = Updater {
        git,
        dir,
        settings,
        dry_run,
        completed: Vec::new(),
        planned: Vec::new(),
    };

    let mut state = UpdateState::Start;
    while !state.is_terminal() {
        state = updater.advance(state);
    }

    let status = match state {
        UpdateState::Failed { step, reason } => OutcomeStatus::Failed { step, reason },
        _ if dry_run => OutcomeStatus::DryRun {
            planned: updater.planned,
        },
        _ => OutcomeStatus::Succeeded,
    };

    UpdateOutcome {
        repository: name.clone(),
        action: SyncAction::Update,
        completed: updater.completed,
        status,
    }
}

/// Clone `repo` into `root` using the run's connection preference.
pub fn clone_repository<G: GitOps + ?Sized>(
    git: &G,
    root: &Path,
    repo: &RemoteRepository,
    connection: ConnectionType,
    dry_run: bool,
) -> UpdateOutcome {
    let url = repo.clone_url(connection);
    let dest = root.join(repo_dir_from_url(url).unwrap_or(repo.name.as_str()));

    let (completed, status) = if dry_run {
        (
            Vec::new(),
            OutcomeStatus::DryRun {
                planned: vec![UpdateStep::Clone],
            },
        )
    } else {
        match git.clone_repo(url, &dest) {
            Ok(()) => {
                tracing::info!(dest = %dest.display(), "cloned");
                (vec![UpdateStep::Clone], OutcomeStatus::Succeeded)
            }
            Err(source) => {
                let err = CloneError {
                    url: url.to_string(),
                    source,
                };
                tracing::warn!(error = %err, "clone failed");
                (
                    Vec::new(),
                    OutcomeStatus::Failed {
                        step: UpdateStep::Clone,
                        reason: err.to_string(),
                    },
                )
            }
        }
    };

    UpdateOutcome {
        repository: repo.name.clone(),
        action: SyncAction::Clone,
        completed,
        status,
    }
}
