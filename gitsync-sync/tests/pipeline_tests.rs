//! End-to-end runs of the pipeline against an in-memory catalog and a
//! scripted git, over a real temporary working root.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use gitsync_catalog::{AccountProfile, CatalogError, RemoteCatalog, PAGE_SIZE};
use gitsync_core::{
    ConnectionType, OutcomeStatus, RemoteRepository, RepoName, SyncAction, UpdateStep,
};
use gitsync_sync::{pipeline, GitError, GitOps, SyncError, SyncOptions, UpdateSettings};
use tempfile::TempDir;
use tokio::sync::watch;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

struct FakeCatalog {
    names: Vec<String>,
    pages_served: AtomicUsize,
}

impl FakeCatalog {
    fn new(names: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            names: names.iter().map(|n| n.to_string()).collect(),
            pages_served: AtomicUsize::new(0),
        })
    }

    fn numbered(count: usize) -> Arc<Self> {
        let names: Vec<String> = (0..count).map(|i| format!("repo-{i:03}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        Self::new(&refs)
    }
}

impl RemoteCatalog for FakeCatalog {
    fn fetch_profile(&self) -> Result<AccountProfile, CatalogError> {
        Ok(AccountProfile {
            login: "octo".into(),
            owned_private_repos: None,
            public_repos: self.names.len() as u64,
        })
    }

    fn fetch_page(&self, page: u32) -> Result<Vec<RemoteRepository>, CatalogError> {
        self.pages_served.fetch_add(1, Ordering::SeqCst);
        let size = PAGE_SIZE as usize;
        Ok(self
            .names
            .iter()
            .skip((page as usize - 1) * size)
            .take(size)
            .map(|name| RemoteRepository {
                name: RepoName::from(name.as_str()),
                ssh_url: format!("git@github.com:octo/{name}.git"),
                https_url: format!("https://github.com/octo/{name}.git"),
                private: false,
            })
            .collect())
    }
}

struct FailingCatalog;

impl RemoteCatalog for FailingCatalog {
    fn fetch_profile(&self) -> Result<AccountProfile, CatalogError> {
        Err(CatalogError::Authentication {
            api_base: "https://api.github.com".into(),
        })
    }

    fn fetch_page(&self, _page: u32) -> Result<Vec<RemoteRepository>, CatalogError> {
        unreachable!("no pages after a failed profile")
    }
}

/// Scripted git keyed by repository directory name.
#[derive(Default)]
struct FakeGit {
    dirty: HashSet<String>,
    branches: HashMap<String, String>,
    fail: HashMap<String, UpdateStep>,
    delay: Duration,
    calls: Mutex<Vec<(String, UpdateStep)>>,
    clone_urls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    /// Flipped after the first completed pull.
    cancel_after_pull: Option<watch::Sender<bool>>,
}

impl FakeGit {
    fn step(&self, repo: &Path, step: UpdateStep) -> Result<(), GitError> {
        let name = repo
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.calls.lock().unwrap().push((name.clone(), step));
        if self.fail.get(&name) == Some(&step) {
            return Err(GitError::Failed {
                args: step.to_string(),
                status: "exit status: 1".into(),
                stderr: format!("scripted {step} failure"),
            });
        }
        Ok(())
    }

    fn mutating_calls(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, step)| step.is_mutating())
            .count()
    }

    fn calls_for(&self, name: &str) -> Vec<UpdateStep> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, s)| *s)
            .collect()
    }
}

impl GitOps for FakeGit {
    fn status(&self, repo: &Path) -> Result<String, GitError> {
        self.step(repo, UpdateStep::StatusCheck)?;
        let name = repo.file_name().unwrap().to_string_lossy().into_owned();
        Ok(if self.dirty.contains(&name) { " M README.md\n".into() } else { String::new() })
    }

    fn stash(&self, repo: &Path) -> Result<(), GitError> {
        self.step(repo, UpdateStep::Stash)
    }

    fn current_branch(&self, repo: &Path) -> Result<String, GitError> {
        self.step(repo, UpdateStep::BranchCheck)?;
        let name = repo.file_name().unwrap().to_string_lossy().into_owned();
        Ok(self.branches.get(&name).cloned().unwrap_or_else(|| "master".into()))
    }

    fn checkout(&self, repo: &Path, _branch: &str) -> Result<(), GitError> {
        self.step(repo, UpdateStep::Checkout)
    }

    fn pull(&self, repo: &Path, _remote: &str, _branch: &str) -> Result<(), GitError> {
        self.step(repo, UpdateStep::Pull)?;
        if let Some(cancel) = &self.cancel_after_pull {
            let _ = cancel.send(true);
        }
        Ok(())
    }

    fn clone_repo(&self, url: &str, dest: &Path) -> Result<(), GitError> {
        self.clone_urls.lock().unwrap().push(url.to_string());
        self.step(dest, UpdateStep::Clone)
    }
}

fn working_root(local: &[&str]) -> TempDir {
    let root = TempDir::new().unwrap();
    for name in local {
        std::fs::create_dir_all(root.path().join(name).join(".git")).unwrap();
    }
    root
}

fn options(root: &Path) -> SyncOptions {
    SyncOptions {
        root: root.to_path_buf(),
        connection: ConnectionType::Ssh,
        dry_run: false,
        settings: UpdateSettings {
            default_branch: "master".into(),
            upstream_remote: "origin".into(),
        },
        workers: 8,
        page_concurrency: 10,
        verify_working_copies: true,
        expected_login: Some("octo".into()),
    }
}

fn never_cancelled() -> watch::Receiver<bool> {
    // A dropped sender leaves the last value readable.
    watch::channel(false).1
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread")]
async fn forty_five_local_repos_are_all_updated_from_two_pages() {
    let catalog = FakeCatalog::numbered(45);
    let names: Vec<String> = (0..45).map(|i| format!("repo-{i:03}")).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let root = working_root(&refs);
    let git = Arc::new(FakeGit::default());

    let report = pipeline::run(catalog.clone(), git.clone(), &options(root.path()), never_cancelled())
        .await
        .expect("run");

    assert_eq!(report.pages, 2);
    assert_eq!(catalog.pages_served.load(Ordering::SeqCst), 2);
    assert_eq!(report.plan.count(SyncAction::Update), 45);
    assert_eq!(report.plan.count(SyncAction::Clone), 0);
    assert_eq!(report.succeeded(), 45);
    assert!(git.clone_urls.lock().unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_repos_are_cloned_and_present_ones_updated() {
    let catalog = FakeCatalog::new(&["alpha", "bravo", "charlie", "delta", "echo"]);
    let root = working_root(&["bravo", "delta"]);
    let git = Arc::new(FakeGit::default());

    let report = pipeline::run(catalog, git.clone(), &options(root.path()), never_cancelled())
        .await
        .expect("run");

    let updates: Vec<&str> = report.plan.names(SyncAction::Update).iter().map(|n| n.as_str()).collect();
    let clones: Vec<&str> = report.plan.names(SyncAction::Clone).iter().map(|n| n.as_str()).collect();
    assert_eq!(updates, vec!["bravo", "delta"]);
    assert_eq!(clones, vec!["alpha", "charlie", "echo"]);
    assert_eq!(report.succeeded(), 5);

    let mut urls = git.clone_urls.lock().unwrap().clone();
    urls.sort();
    assert_eq!(
        urls,
        vec![
            "git@github.com:octo/alpha.git",
            "git@github.com:octo/charlie.git",
            "git@github.com:octo/echo.git",
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn checkout_failure_is_isolated_and_stash_is_kept() {
    let catalog = FakeCatalog::new(&["bar", "baz", "foo"]);
    let root = working_root(&["bar", "baz", "foo"]);
    let git = Arc::new(FakeGit {
        dirty: ["foo".to_string()].into_iter().collect(),
        branches: [("foo".to_string(), "feature".to_string())].into_iter().collect(),
        fail: [("foo".to_string(), UpdateStep::Checkout)].into_iter().collect(),
        ..FakeGit::default()
    });

    let report = pipeline::run(catalog, git.clone(), &options(root.path()), never_cancelled())
        .await
        .expect("run");

    let foo = report.outcome_for("foo").expect("foo outcome");
    assert_eq!(foo.failed_step(), Some(UpdateStep::Checkout));
    assert!(foo.left_stash());
    assert_eq!(
        git.calls_for("foo"),
        vec![
            UpdateStep::StatusCheck,
            UpdateStep::Stash,
            UpdateStep::BranchCheck,
            UpdateStep::Checkout,
        ]
    );
    assert_eq!(report.failed(), 1);
    assert_eq!(report.succeeded(), 2);
    assert!(report.outcome_for("bar").unwrap().is_success());
    assert!(report.outcome_for("baz").unwrap().is_success());
}

// ---------------------------------------------------------------------------
// Dry run
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread")]
async fn dry_run_mutates_nothing_and_plans_the_same() {
    let catalog = FakeCatalog::new(&["alpha", "bravo", "charlie"]);
    let root = working_root(&["bravo"]);
    let git_for_real = Arc::new(FakeGit::default());
    let git_for_preview = Arc::new(FakeGit {
        dirty: ["bravo".to_string()].into_iter().collect(),
        branches: [("bravo".to_string(), "dev".to_string())].into_iter().collect(),
        ..FakeGit::default()
    });

    let mut preview_options = options(root.path());
    preview_options.dry_run = true;
    let preview = pipeline::run(catalog.clone(), git_for_preview.clone(), &preview_options, never_cancelled())
        .await
        .expect("dry run");

    assert_eq!(git_for_preview.mutating_calls(), 0);
    assert!(preview.dry_run);
    assert_eq!(preview.planned(), 3);
    assert_eq!(
        preview.outcome_for("bravo").unwrap().status,
        OutcomeStatus::DryRun {
            planned: vec![UpdateStep::Stash, UpdateStep::Checkout, UpdateStep::Pull],
        }
    );
    assert!(!root.path().join("alpha").exists());

    let real = pipeline::run(catalog, git_for_real, &options(root.path()), never_cancelled())
        .await
        .expect("run");
    assert_eq!(preview.plan, real.plan);
}

// ---------------------------------------------------------------------------
// Stray directories, pool bound, cancellation, aborts
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread")]
async fn directory_without_git_marker_is_skipped_untouched() {
    let catalog = FakeCatalog::new(&["notes", "tools"]);
    let root = working_root(&["tools"]);
    std::fs::create_dir_all(root.path().join("notes")).unwrap();
    let git = Arc::new(FakeGit::default());

    let report = pipeline::run(catalog, git.clone(), &options(root.path()), never_cancelled())
        .await
        .expect("run");

    assert_eq!(report.plan.action_for("notes"), Some(SyncAction::Skip));
    assert!(matches!(
        report.outcome_for("notes").unwrap().status,
        OutcomeStatus::Skipped { .. }
    ));
    assert!(git.calls_for("notes").is_empty());
    assert_eq!(report.skipped(), 1);
    assert_eq!(report.succeeded(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn worker_pool_bounds_concurrent_repositories() {
    let catalog = FakeCatalog::numbered(12);
    let root = TempDir::new().unwrap();
    let git = Arc::new(FakeGit {
        delay: Duration::from_millis(20),
        ..FakeGit::default()
    });
    let mut opts = options(root.path());
    opts.workers = 3;

    let report = pipeline::run(catalog, git.clone(), &opts, never_cancelled())
        .await
        .expect("run");

    assert_eq!(report.succeeded(), 12);
    assert!(git.max_in_flight.load(Ordering::SeqCst) <= 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn cancellation_before_start_marks_everything_cancelled() {
    let catalog = FakeCatalog::new(&["alpha", "bravo"]);
    let root = working_root(&["alpha"]);
    let git = Arc::new(FakeGit::default());
    let (tx, rx) = watch::channel(false);
    tx.send(true).unwrap();

    let report = pipeline::run(catalog, git.clone(), &options(root.path()), rx)
        .await
        .expect("run");

    assert_eq!(report.cancelled(), 2);
    assert!(git.calls.lock().unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn cancellation_mid_run_stops_unstarted_repositories() {
    let catalog = FakeCatalog::new(&["a", "b", "c", "d"]);
    let root = working_root(&["a", "b", "c", "d"]);
    let (tx, rx) = watch::channel(false);
    let git = Arc::new(FakeGit {
        cancel_after_pull: Some(tx),
        ..FakeGit::default()
    });
    let mut opts = options(root.path());
    opts.workers = 1;

    let report = pipeline::run(catalog, git, &opts, rx).await.expect("run");

    assert_eq!(report.outcomes.len(), 4);
    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.cancelled(), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn outcomes_follow_plan_order() {
    let catalog = FakeCatalog::numbered(20);
    let root = TempDir::new().unwrap();
    let git = Arc::new(FakeGit::default());

    let report = pipeline::run(catalog, git, &options(root.path()), never_cancelled())
        .await
        .expect("run");

    let planned: Vec<&str> = report.plan.iter().map(|e| e.repository.name.as_str()).collect();
    let reported: Vec<&str> = report.outcomes.iter().map(|o| o.repository.as_str()).collect();
    assert_eq!(planned, reported);
}

#[tokio::test(flavor = "multi_thread")]
async fn authentication_failure_aborts_before_touching_the_root() {
    let root = working_root(&["alpha"]);
    let git = Arc::new(FakeGit::default());

    let err = pipeline::run(Arc::new(FailingCatalog), git.clone(), &options(root.path()), never_cancelled())
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Catalog(CatalogError::Authentication { .. })), "got: {err}");
    assert!(git.calls.lock().unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn unreadable_root_is_an_inventory_error() {
    let root = TempDir::new().unwrap();
    let missing = root.path().join("nope");
    let catalog = FakeCatalog::new(&["alpha"]);

    let err = pipeline::run(catalog, Arc::new(FakeGit::default()), &options(&missing), never_cancelled())
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Inventory { .. }), "got: {err}");
}

#[tokio::test(flavor = "multi_thread")]
async fn https_connection_clones_with_https_urls() {
    let catalog = FakeCatalog::new(&["alpha"]);
    let root = TempDir::new().unwrap();
    let git = Arc::new(FakeGit::default());
    let mut opts = options(root.path());
    opts.connection = ConnectionType::Https;

    pipeline::run(catalog, git.clone(), &opts, never_cancelled())
        .await
        .expect("run");

    assert_eq!(
        *git.clone_urls.lock().unwrap(),
        vec!["https://github.com/octo/alpha.git".to_string()]
    );
}
