//! Run orchestration: discover → scan → reconcile → execute.
//!
//! Discovery errors and an unreadable working root abort the run. Once the
//! plan exists every repository gets exactly one [`UpdateOutcome`], whatever
//! happens to its siblings.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::Instrument;

use gitsync_catalog::{discover, RemoteCatalog};
use gitsync_core::{
    ConnectionType, OutcomeStatus, PlanEntry, SyncAction, SyncPlan, UpdateOutcome,
};

use crate::error::SyncError;
use crate::git::GitOps;
use crate::updater::{clone_repository, update_repository, UpdateSettings};
use crate::{inventory, plan};

const NOT_A_WORKING_COPY: &str = "directory exists but is not a git working copy";

/// Everything one run needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub root: PathBuf,
    pub connection: ConnectionType,
    pub dry_run: bool,
    pub settings: UpdateSettings,
    /// Upper bound on repositories processed at once.
    pub workers: usize,
    /// Upper bound on page requests in flight during discovery.
    pub page_concurrency: usize,
    pub verify_working_copies: bool,
    /// Account name given on the command line; a mismatch is only logged.
    pub expected_login: Option<String>,
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub login: String,
    pub pages: u32,
    pub plan: SyncPlan,
    /// One per plan entry, in plan order.
    pub outcomes: Vec<UpdateOutcome>,
    pub dry_run: bool,
}

impl SyncReport {
    pub fn succeeded(&self) -> usize {
        self.count(|s| matches!(s, OutcomeStatus::Succeeded))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, OutcomeStatus::Failed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, OutcomeStatus::Skipped { .. }))
    }

    pub fn planned(&self) -> usize {
        self.count(|s| matches!(s, OutcomeStatus::DryRun { .. }))
    }

    pub fn cancelled(&self) -> usize {
        self.count(|s| matches!(s, OutcomeStatus::Cancelled))
    }

    /// Failed outcomes, in plan order.
    pub fn failures(&self) -> impl Iterator<Item = &UpdateOutcome> {
        self.outcomes.iter().filter(|o| o.is_failure())
    }

    pub fn outcome_for(&self, name: &str) -> Option<&UpdateOutcome> {
        self.outcomes
            .iter()
            .find(|o| o.repository.as_str() == name)
    }

    fn count(&self, pred: impl Fn(&OutcomeStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }
}

/// Run one full reconciliation.
///
/// `cancel` flipping to `true` stops new repositories from starting; those
/// already running finish their current protocol.
pub async fn run<C: RemoteCatalog, G: GitOps>(
    catalog: Arc<C>,
    git: Arc<G>,
    options: &SyncOptions,
    cancel: watch::Receiver<bool>,
) -> Result<SyncReport, SyncError> {
    let discovery = discover(catalog, options.page_concurrency).await?;

    if let Some(expected) = &options.expected_login {
        if !expected.eq_ignore_ascii_case(&discovery.profile.login) {
            tracing::warn!(
                expected = %expected,
                login = %discovery.profile.login,
                "token belongs to a different account; syncing the authenticated account",
            );
        }
    }

    let local = inventory::scan(&options.root)?;
    let plan = plan::reconcile(
        &discovery.repositories,
        &local,
        options.verify_working_copies,
    );
    tracing::info!(
        update = plan.count(SyncAction::Update),
        clone = plan.count(SyncAction::Clone),
        skip = plan.count(SyncAction::Skip),
        dry_run = options.dry_run,
        "plan ready",
    );

    let outcomes = execute(&plan, git, options, cancel).await?;

    Ok(SyncReport {
        login: discovery.profile.login,
        pages: discovery.pages,
        plan,
        outcomes,
        dry_run: options.dry_run,
    })
}

/// Execute `plan` on a pool of at most `min(len, workers)` concurrent
/// repositories and return the outcomes in plan order.
pub async fn execute<G: GitOps>(
    plan: &SyncPlan,
    git: Arc<G>,
    options: &SyncOptions,
    cancel: watch::Receiver<bool>,
) -> Result<Vec<UpdateOutcome>, SyncError> {
    let pool = plan.len().min(options.workers).max(1);
    let semaphore = Arc::new(Semaphore::new(pool));
    let mut tasks = JoinSet::new();
    let mut outcomes: Vec<(usize, UpdateOutcome)> = Vec::with_capacity(plan.len());

    for (index, entry) in plan.iter().enumerate() {
        if entry.action == SyncAction::Skip {
            outcomes.push((index, skipped(entry)));
            continue;
        }

        let entry = entry.clone();
        let git = git.clone();
        let semaphore = semaphore.clone();
        let cancel = cancel.clone();
        let options = options.clone();
        let span = tracing::info_span!("repo", name = %entry.repository.name);

        tasks.spawn(
            async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return (index, cancelled(&entry)),
                };
                let stop = *cancel.borrow();
                if stop {
                    tracing::info!("cancelled before start");
                    return (index, cancelled(&entry));
                }

                let span = tracing::Span::current();
                let name = entry.repository.name.clone();
                let action = entry.action;
                let joined = tokio::task::spawn_blocking(move || {
                    let _entered = span.enter();
                    process(git.as_ref(), &entry, &options)
                })
                .await;

                let outcome = joined.unwrap_or_else(|e| {
                    tracing::error!(error = %e, "repository task aborted");
                    UpdateOutcome {
                        repository: name,
                        action,
                        completed: Vec::new(),
                        status: OutcomeStatus::Failed {
                            step: first_step(action),
                            reason: format!("task aborted: {e}"),
                        },
                    }
                });
                (index, outcome)
            }
            .instrument(span),
        );
    }

    while let Some(joined) = tasks.join_next().await {
        outcomes.push(joined.map_err(|e| SyncError::Join(e.to_string()))?);
    }

    outcomes.sort_by_key(|(index, _)| *index);
    Ok(outcomes.into_iter().map(|(_, outcome)| outcome).collect())
}

fn process<G: GitOps + ?Sized>(git: &G, entry: &PlanEntry, options: &SyncOptions) -> UpdateOutcome {
    let repo = &entry.repository;
    match entry.action {
        SyncAction::Clone => {
            clone_repository(git, &options.root, repo, options.connection, options.dry_run)
        }
        SyncAction::Update => update_repository(
            git,
            &repo.name,
            &options.root.join(repo.name.as_str()),
            &options.settings,
            options.dry_run,
        ),
        SyncAction::Skip => skipped(entry),
    }
}

fn skipped(entry: &PlanEntry) -> UpdateOutcome {
    UpdateOutcome {
        repository: entry.repository.name.clone(),
        action: SyncAction::Skip,
        completed: Vec::new(),
        status: OutcomeStatus::Skipped {
            reason: NOT_A_WORKING_COPY.to_string(),
        },
    }
}

fn first_step(action: SyncAction) -> gitsync_core::UpdateStep {
    match action {
        SyncAction::Clone => gitsync_core::UpdateStep::Clone,
        SyncAction::Update | SyncAction::Skip => gitsync_core::UpdateStep::StatusCheck,
    }
}

fn cancelled(entry: &PlanEntry) -> UpdateOutcome {
    UpdateOutcome {
        repository: entry.repository.name.clone(),
        action: entry.action,
        completed: Vec::new(),
        status: OutcomeStatus::Cancelled,
    }
}
