//! `gitsync <username> pull`: clone missing repositories, update the rest.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};
use tokio::sync::watch;

use gitsync_agent::AgentSession;
use gitsync_catalog::GithubCatalog;
use gitsync_core::{
    config, ConfigError, ConnectionType, GitSyncConfig, OutcomeStatus, RemoteType, UpdateOutcome,
};
use gitsync_sync::{pipeline, GitCli, SyncOptions, SyncReport, UpdateSettings};

/// Arguments for `gitsync <username> pull`.
#[derive(Args, Debug)]
pub struct PullArgs {
    /// API access token (falls back to `GITHUB_TOKEN`, then the config file).
    #[arg(long, env = "GITSYNC_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Clone URL kind: SSH or HTTPS.
    #[arg(long)]
    pub connection: Option<ConnectionType>,

    /// Hosting service: GITHUB, GITLAB or OTHER.
    #[arg(long)]
    pub remote: Option<RemoteType>,

    /// Configuration file (default: ~/.gitsync/config.yaml when present).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Show what would be cloned and updated without changing anything.
    #[arg(short = 's', long = "skip")]
    pub dry_run: bool,

    /// Directory holding the working copies (default: current directory).
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Repositories processed at once.
    #[arg(long)]
    pub jobs: Option<usize>,

    /// Stop starting new repositories after this many seconds.
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Branch every working copy is brought to.
    #[arg(long)]
    pub branch: Option<String>,

    /// Remote pulled from.
    #[arg(long)]
    pub upstream: Option<String>,
}

impl PullArgs {
    pub fn run(self, username: String) -> Result<()> {
        let config = self.resolve_config()?;

        if config.remote != RemoteType::Github {
            return Err(ConfigError::UnsupportedRemote {
                remote: config.remote,
            }
            .into());
        }
        let token = config.require_token()?.to_string();

        let cwd = std::env::current_dir().context("could not determine current directory")?;
        let root = match &self.root {
            Some(root) => cwd.join(root),
            None => cwd,
        };
        let options = SyncOptions {
            root,
            connection: config.connection,
            dry_run: self.dry_run,
            settings: UpdateSettings {
                default_branch: config.default_branch.clone(),
                upstream_remote: config.upstream_remote.clone(),
            },
            workers: config.workers,
            page_concurrency: config.page_concurrency,
            verify_working_copies: config.verify_working_copies,
            expected_login: Some(username),
        };
        let catalog = Arc::new(GithubCatalog::new(
            &config.api_base,
            token,
            Duration::from_secs(config.http_timeout_secs),
        ));

        let session = if needs_agent(&config, options.dry_run) {
            let session = AgentSession::start().context("failed to start ssh-agent")?;
            for key in &config.ssh_keys {
                session
                    .add_key(key)
                    .with_context(|| format!("failed to load key {}", key.display()))?;
            }
            Some(session)
        } else {
            None
        };
        let git = match &session {
            Some(session) => GitCli::new().with_agent(session.env().clone()),
            None => GitCli::new(),
        };

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("failed to start async runtime")?;
        let timeout = self.timeout.or(config.run_timeout_secs).map(Duration::from_secs);
        let result = runtime.block_on(async {
            let (cancel_tx, cancel_rx) = watch::channel(false);
            let watcher = tokio::spawn(watch_for_cancel(cancel_tx, timeout));
            let result = pipeline::run(catalog, Arc::new(git), &options, cancel_rx).await;
            watcher.abort();
            result
        });

        if let Some(session) = session {
            if let Err(err) = session.stop() {
                tracing::warn!(error = %err, "failed to stop ssh-agent");
            }
        }

        let report = result.context("sync failed")?;
        print_report(&report);
        Ok(())
    }

    /// File (or defaults), then flags, then validation.
    fn resolve_config(&self) -> Result<GitSyncConfig> {
        let mut config = config::load(self.config.as_deref()).context("failed to load configuration")?;

        if let Some(token) = self
            .token
            .clone()
            .or_else(|| std::env::var("GITHUB_TOKEN").ok())
            .filter(|t| !t.trim().is_empty())
        {
            config.token = Some(token);
        }
        if let Some(connection) = self.connection {
            config.connection = connection;
        }
        if let Some(remote) = self.remote {
            config.remote = remote;
        }
        if let Some(jobs) = self.jobs {
            config.workers = jobs;
        }
        if let Some(branch) = &self.branch {
            config.default_branch = branch.clone();
        }
        if let Some(upstream) = &self.upstream {
            config.upstream_remote = upstream.clone();
        }
        config.validate()?;
        Ok(config)
    }
}

/// A private agent is started only for a real SSH run with keys to load.
/// Otherwise git inherits the caller's environment, including any agent
/// already running.
fn needs_agent(config: &GitSyncConfig, dry_run: bool) -> bool {
    config.connection == ConnectionType::Ssh && !dry_run && !config.ssh_keys.is_empty()
}

/// Flip `cancel` on Ctrl-C or when `timeout` elapses.
async fn watch_for_cancel(cancel: watch::Sender<bool>, timeout: Option<Duration>) {
    let deadline = async {
        match timeout {
            Some(after) => tokio::time::sleep(after).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("interrupted; waiting for started repositories");
        }
        _ = deadline => {
            tracing::warn!("run timeout reached; waiting for started repositories");
        }
    }
    let _ = cancel.send(true);
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

#[derive(Tabled)]
struct OutcomeRow {
    #[tabled(rename = "repository")]
    repository: String,
    #[tabled(rename = "action")]
    action: String,
    #[tabled(rename = "result")]
    result: String,
    #[tabled(rename = "detail")]
    detail: String,
}

fn print_report(report: &SyncReport) {
    let prefix = if report.dry_run { "[dry-run] " } else { "" };
    println!(
        "{prefix}{} | {} repositories | {} pages",
        report.login.bold(),
        report.plan.len(),
        report.pages,
    );

    if report.outcomes.is_empty() {
        println!("{prefix}nothing to do");
        return;
    }

    let rows: Vec<OutcomeRow> = report.outcomes.iter().map(outcome_row).collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    let mut totals = vec![
        format!("{} succeeded", report.succeeded()).green().to_string(),
        format!("{} failed", report.failed()).red().to_string(),
        format!("{} skipped", report.skipped()).yellow().to_string(),
    ];
    if report.dry_run {
        totals.push(format!("{} planned", report.planned()).cyan().to_string());
    }
    if report.cancelled() > 0 {
        totals.push(format!("{} cancelled", report.cancelled()).bright_black().to_string());
    }
    println!("{prefix}{}", totals.join(", "));

    let stashed: Vec<&str> = report
        .outcomes
        .iter()
        .filter(|o| o.left_stash())
        .map(|o| o.repository.as_str())
        .collect();
    if !stashed.is_empty() {
        println!("local changes stashed in: {}", stashed.join(", "));
    }
}

fn outcome_row(outcome: &UpdateOutcome) -> OutcomeRow {
    let (result, detail) = match &outcome.status {
        OutcomeStatus::Succeeded => ("ok".to_string(), String::new()),
        OutcomeStatus::Failed { step, reason } => (format!("failed at {step}"), reason.clone()),
        OutcomeStatus::DryRun { planned } => (
            "would run".to_string(),
            planned
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" → "),
        ),
        OutcomeStatus::Skipped { reason } => ("skipped".to_string(), reason.clone()),
        OutcomeStatus::Cancelled => ("cancelled".to_string(), String::new()),
    };
    OutcomeRow {
        repository: outcome.repository.to_string(),
        action: outcome.action.to_string(),
        result,
        detail,
    }
}
