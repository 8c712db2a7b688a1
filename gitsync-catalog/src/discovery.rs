//! Concurrent paginated discovery.
//!
//! 1. Read the account profile → total repository count.
//! 2. Fire one request per page (bounded by a semaphore), all at once.
//! 3. Join every page; any failure fails the whole discovery.
//! 4. Merge pages into a single name-ordered, deduplicated list.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use gitsync_core::RemoteRepository;

use crate::catalog::{page_count, AccountProfile, RemoteCatalog};
use crate::error::CatalogError;

/// Result of a complete discovery.
#[derive(Debug, Clone)]
pub struct Discovery {
    pub profile: AccountProfile,
    /// Number of page requests issued.
    pub pages: u32,
    /// Name-ordered, no duplicate names.
    pub repositories: Vec<RemoteRepository>,
}

/// Discover every repository owned by the catalog's account.
///
/// At most `max_in_flight` page requests run at once. Pages may finish in any
/// order; the returned list is independent of completion order.
pub async fn discover<C: RemoteCatalog>(
    catalog: Arc<C>,
    max_in_flight: usize,
) -> Result<Discovery, CatalogError> {
    let profile = {
        let catalog = catalog.clone();
        tokio::task::spawn_blocking(move || catalog.fetch_profile())
            .await
            .map_err(|e| CatalogError::Join(e.to_string()))??
    };

    let total = profile.total_repos();
    let pages = page_count(total);
    tracing::info!(login = %profile.login, total, pages, "discovering repositories");

    let semaphore = Arc::new(Semaphore::new(max_in_flight.max(1)));
    let mut tasks = JoinSet::new();
    for page in 1..=pages {
        let catalog = catalog.clone();
        let semaphore = semaphore.clone();
        tasks.spawn(async move {
            let fetched = match semaphore.acquire_owned().await {
                Ok(_permit) => tokio::task::spawn_blocking(move || catalog.fetch_page(page))
                    .await
                    .map_err(|e| CatalogError::Join(e.to_string()))
                    .and_then(|r| r),
                Err(e) => Err(CatalogError::Join(e.to_string())),
            };
            (page, fetched)
        });
    }

    let mut fetched_pages = Vec::with_capacity(pages as usize);
    let mut failed = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        let (page, result) = joined.map_err(|e| CatalogError::Join(e.to_string()))?;
        match result {
            Ok(repos) => {
                tracing::debug!(page, count = repos.len(), "page fetched");
                fetched_pages.push((page, repos));
            }
            Err(err) => {
                tracing::warn!(page, error = %err, "page fetch failed");
                failed.push((page, err.to_string()));
            }
        }
    }

    if !failed.is_empty() {
        failed.sort_by_key(|(page, _)| *page);
        let (pages, reasons) = failed.into_iter().unzip();
        return Err(CatalogError::CatalogFetch { pages, reasons });
    }

    let repositories = merge_pages(fetched_pages);
    tracing::info!(count = repositories.len(), "discovery complete");
    Ok(Discovery {
        profile,
        pages,
        repositories,
    })
}

/// Flatten `(page, repos)` pairs into one list ordered by name, keeping the
/// first occurrence of any repeated name.
pub fn merge_pages(mut pages: Vec<(u32, Vec<RemoteRepository>)>) -> Vec<RemoteRepository> {
    pages.sort_by_key(|(page, _)| *page);
    let mut merged: Vec<RemoteRepository> =
        pages.into_iter().flat_map(|(_, repos)| repos).collect();
    // Stable: among equal names the lowest page wins.
    merged.sort_by(|a, b| a.name.cmp(&b.name));
    merged.dedup_by(|later, earlier| later.name == earlier.name);
    merged
}
