//! The version-control command interface.
//!
//! [`GitOps`] lists the six operations sync needs; [`GitCli`] runs them as
//! `git` subprocesses, carrying the signing-agent tokens when present.

use std::path::{Path, PathBuf};
use std::process::Command;

use gitsync_agent::AgentEnv;

use crate::error::GitError;

/// Operations the updater and clone path invoke, one subprocess each.
///
/// Every call is synchronous and made from the blocking pool.
pub trait GitOps: Send + Sync + 'static {
    /// Short-format status; empty when the work tree is clean.
    fn status(&self, repo: &Path) -> Result<String, GitError>;

    fn stash(&self, repo: &Path) -> Result<(), GitError>;

    fn current_branch(&self, repo: &Path) -> Result<String, GitError>;

    fn checkout(&self, repo: &Path, branch: &str) -> Result<(), GitError>;

    fn pull(&self, repo: &Path, remote: &str, branch: &str) -> Result<(), GitError>;

    fn clone_repo(&self, url: &str, dest: &Path) -> Result<(), GitError>;
}

/// [`GitOps`] backed by the `git` executable.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: PathBuf,
    agent: Option<AgentEnv>,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new()
    }
}

impl GitCli {
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("git"),
            agent: None,
        }
    }

    /// Pass the agent's tokens to every invocation.
    pub fn with_agent(mut self, agent: AgentEnv) -> Self {
        self.agent = Some(agent);
        self
    }

    fn run(&self, dir: &Path, args: &[&str]) -> Result<String, GitError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .current_dir(dir)
            // Never block on an interactive credential prompt.
            .env("GIT_TERMINAL_PROMPT", "0");
        if let Some(agent) = &self.agent {
            agent.apply(&mut cmd);
        }
        // A terminal Ctrl-C must not reach a step in progress; the run stops
        // between repositories instead.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        tracing::debug!(dir = %dir.display(), "git {}", args.join(" "));
        let output = cmd.output().map_err(|source| GitError::Spawn {
            args: args.join(" "),
            source,
        })?;

        if !output.status.success() {
            return Err(GitError::Failed {
                args: args.join(" "),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl GitOps for GitCli {
    fn status(&self, repo: &Path) -> Result<String, GitError> {
        self.run(repo, &["status", "--short"])
    }

    fn stash(&self, repo: &Path) -> Result<(), GitError> {
        self.run(repo, &["stash"]).map(drop)
    }

    fn current_branch(&self, repo: &Path) -> Result<String, GitError> {
        self.run(repo, &["rev-parse", "--symbolic-full-name", "--abbrev-ref", "HEAD"])
            .map(|out| out.trim().to_string())
    }

    fn checkout(&self, repo: &Path, branch: &str) -> Result<(), GitError> {
        self.run(repo, &["checkout", branch]).map(drop)
    }

    fn pull(&self, repo: &Path, remote: &str, branch: &str) -> Result<(), GitError> {
        self.run(repo, &["pull", remote, branch]).map(drop)
    }

    fn clone_repo(&self, url: &str, dest: &Path) -> Result<(), GitError> {
        // git runs inside the parent, so the target is the bare directory name.
        let parent = dest
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let target = match dest.file_name() {
            Some(name) => name.to_string_lossy(),
            None => dest.to_string_lossy(),
        };
        self.run(parent, &["clone", url, target.as_ref()]).map(drop)
    }
}

/// Directory name `git clone` would derive from `url`.
///
/// `git@github.com:octo/tools.git` and `https://github.com/octo/tools.git`
/// both give `tools`.
pub fn repo_dir_from_url(url: &str) -> Option<&str> {
    let trimmed = url.trim_end_matches('/');
    let last = trimmed.rsplit(|c: char| c == '/' || c == ':').next()?;
    let name = last.strip_suffix(".git").unwrap_or(last);
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}
