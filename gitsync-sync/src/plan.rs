//! Reconciliation: remote list × local inventory → [`SyncPlan`].

use std::collections::HashMap;

use gitsync_core::{LocalEntry, PlanEntry, RemoteRepository, SyncAction, SyncPlan};

/// Assign one action to every remote repository, in remote order.
///
/// - no local directory of that name → `Clone`
/// - a local directory of that name → `Update`
/// - with `verify_working_copies`, a local directory lacking `.git` → `Skip`
pub fn reconcile(
    remote: &[RemoteRepository],
    local: &[LocalEntry],
    verify_working_copies: bool,
) -> SyncPlan {
    let local: HashMap<&str, &LocalEntry> =
        local.iter().map(|e| (e.name.as_str(), e)).collect();

    let entries = remote
        .iter()
        .map(|repo| {
            let action = match local.get(repo.name.as_str()) {
                None => SyncAction::Clone,
                Some(entry) if verify_working_copies && !entry.is_working_copy => {
                    tracing::warn!(
                        repo = %repo.name,
                        "directory exists but is not a git working copy; skipping",
                    );
                    SyncAction::Skip
                }
                Some(_) => SyncAction::Update,
            };
            PlanEntry {
                repository: repo.clone(),
                action,
            }
        })
        .collect();

    SyncPlan { entries }
}
