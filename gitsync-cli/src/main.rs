//! gitsync: keep a directory of clones in step with a hosting account.
//!
//! # Usage
//!
//! ```text
//! gitsync <username> pull [--token T] [--connection SSH|HTTPS]
//!         [--remote GITHUB|GITLAB|OTHER] [--config PATH] [-s|--skip]
//!         [-d|--debug] [-v|--verbose] [--root DIR] [--jobs N]
//!         [--timeout SECS] [--branch NAME] [--upstream NAME]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, ValueEnum};

use commands::pull::PullArgs;
use gitsync_core::ConfigError;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "gitsync",
    version,
    about = "Clone and update every repository of a hosting account",
    long_about = None,
)]
struct Cli {
    /// Account whose repositories are synced.
    username: String,

    /// What to do with the account's repositories.
    #[arg(value_enum)]
    action: Action,

    #[command(flatten)]
    pull: PullArgs,

    /// Debug logging.
    #[arg(short, long)]
    debug: bool,

    /// Informational logging.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Pull,
    Push,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug, cli.verbose);

    match cli.action {
        Action::Pull => cli.pull.run(cli.username),
        Action::Push => Err(ConfigError::UnsupportedAction {
            action: "push".into(),
        }
        .into()),
    }
}

/// Logs go to stderr; stdout carries only the run summary.
fn init_tracing(debug: bool, verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
