//! Domain types shared across the gitsync workspace.
//!
//! Remote repositories are immutable once fetched; plans and outcomes are
//! derived per run and never persisted.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A repository name, unique per account and identical to its local directory name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepoName(pub String);

impl RepoName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RepoName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for RepoName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RepoName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Closed option sets
// ---------------------------------------------------------------------------

/// Which clone endpoint of a [`RemoteRepository`] a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ConnectionType {
    #[default]
    #[serde(rename = "ssh", alias = "SSH")]
    Ssh,
    #[serde(rename = "https", alias = "HTTPS")]
    Https,
}

impl FromStr for ConnectionType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ssh" => Ok(Self::Ssh),
            "https" => Ok(Self::Https),
            other => Err(ConfigError::InvalidValue {
                field: "connection",
                value: other.to_string(),
                expected: "SSH, HTTPS",
            }),
        }
    }
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionType::Ssh => write!(f, "SSH"),
            ConnectionType::Https => write!(f, "HTTPS"),
        }
    }
}

/// The hosting service the account lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RemoteType {
    #[default]
    #[serde(rename = "github", alias = "GITHUB")]
    Github,
    #[serde(rename = "gitlab", alias = "GITLAB")]
    Gitlab,
    #[serde(rename = "other", alias = "OTHER")]
    Other,
}

impl FromStr for RemoteType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "github" => Ok(Self::Github),
            "gitlab" => Ok(Self::Gitlab),
            "other" => Ok(Self::Other),
            other => Err(ConfigError::InvalidValue {
                field: "remote",
                value: other.to_string(),
                expected: "GITHUB, GITLAB, OTHER",
            }),
        }
    }
}

impl fmt::Display for RemoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteType::Github => write!(f, "GITHUB"),
            RemoteType::Gitlab => write!(f, "GITLAB"),
            RemoteType::Other => write!(f, "OTHER"),
        }
    }
}

// ---------------------------------------------------------------------------
// Remote / local inventory
// ---------------------------------------------------------------------------

/// A repository owned by the account, as reported by the hosting API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRepository {
    pub name: RepoName,
    pub ssh_url: String,
    #[serde(rename = "clone_url")]
    pub https_url: String,
    #[serde(default)]
    pub private: bool,
}

impl RemoteRepository {
    /// The clone endpoint matching the run's connection preference.
    pub fn clone_url(&self, connection: ConnectionType) -> &str {
        match connection {
            ConnectionType::Ssh => &self.ssh_url,
            ConnectionType::Https => &self.https_url,
        }
    }
}

/// A directory observed in the working root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocalEntry {
    pub name: RepoName,
    /// `true` when the directory carries a `.git` entry.
    pub is_working_copy: bool,
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// What a run does with one remote repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncAction {
    /// Missing locally.
    Clone,
    /// Present locally; bring it to the tip of the default branch.
    Update,
    /// A same-named directory exists but is not a working copy.
    Skip,
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncAction::Clone => write!(f, "clone"),
            SyncAction::Update => write!(f, "update"),
            SyncAction::Skip => write!(f, "skip"),
        }
    }
}

/// One line of a [`SyncPlan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    pub repository: RemoteRepository,
    pub action: SyncAction,
}

/// Ordered per-repository actions for one run, in remote list order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SyncPlan {
    pub entries: Vec<PlanEntry>,
}

impl SyncPlan {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlanEntry> {
        self.entries.iter()
    }

    pub fn count(&self, action: SyncAction) -> usize {
        self.entries.iter().filter(|e| e.action == action).count()
    }

    /// Names assigned `action`, in plan order.
    pub fn names(&self, action: SyncAction) -> Vec<&RepoName> {
        self.entries
            .iter()
            .filter(|e| e.action == action)
            .map(|e| &e.repository.name)
            .collect()
    }

    pub fn action_for(&self, name: &str) -> Option<SyncAction> {
        self.entries
            .iter()
            .find(|e| e.repository.name.as_str() == name)
            .map(|e| e.action)
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// A single external step of the clone or update protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateStep {
    StatusCheck,
    Stash,
    BranchCheck,
    Checkout,
    Pull,
    Clone,
}

impl UpdateStep {
    /// Whether the step changes repository or filesystem state.
    pub fn is_mutating(self) -> bool {
        !matches!(self, UpdateStep::StatusCheck | UpdateStep::BranchCheck)
    }
}

impl fmt::Display for UpdateStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateStep::StatusCheck => write!(f, "status-check"),
            UpdateStep::Stash => write!(f, "stash"),
            UpdateStep::BranchCheck => write!(f, "branch-check"),
            UpdateStep::Checkout => write!(f, "checkout"),
            UpdateStep::Pull => write!(f, "pull"),
            UpdateStep::Clone => write!(f, "clone"),
        }
    }
}

/// How a repository's work ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeStatus {
    Succeeded,
    /// `step` failed; nothing after it ran and nothing before it was undone.
    Failed { step: UpdateStep, reason: String },
    /// Dry run: the mutating steps that would have run.
    DryRun { planned: Vec<UpdateStep> },
    Skipped { reason: String },
    /// The run was interrupted before this repository started.
    Cancelled,
}

/// Per-repository result collected by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub repository: RepoName,
    pub action: SyncAction,
    /// Steps that completed successfully, in execution order.
    pub completed: Vec<UpdateStep>,
    pub status: OutcomeStatus,
}

impl UpdateOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, OutcomeStatus::Succeeded)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.status, OutcomeStatus::Failed { .. })
    }

    pub fn failed_step(&self) -> Option<UpdateStep> {
        match &self.status {
            OutcomeStatus::Failed { step, .. } => Some(*step),
            _ => None,
        }
    }

    /// A stash entry was created during this run and left in place.
    pub fn left_stash(&self) -> bool {
        self.completed.contains(&UpdateStep::Stash)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
