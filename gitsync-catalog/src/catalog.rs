//! The hosting-API seam used by discovery.

use serde::Deserialize;

use gitsync_core::RemoteRepository;

use crate::error::CatalogError;

/// Repositories per page requested from the API.
pub const PAGE_SIZE: u32 = 30;

/// The subset of the authenticated account profile discovery needs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccountProfile {
    pub login: String,
    /// Absent when the token lacks the private-repo scope.
    #[serde(default)]
    pub owned_private_repos: Option<u64>,
    #[serde(default)]
    pub public_repos: u64,
}

impl AccountProfile {
    pub fn total_repos(&self) -> u64 {
        self.owned_private_repos.unwrap_or(0) + self.public_repos
    }
}

/// Number of pages needed to list `total` repositories: `ceil(total / PAGE_SIZE)`.
pub fn page_count(total: u64) -> u32 {
    let pages = total.div_ceil(u64::from(PAGE_SIZE));
    u32::try_from(pages).unwrap_or(u32::MAX)
}

/// Blocking access to one account's repositories.
///
/// Calls are made from the blocking thread pool, so implementations may do
/// synchronous I/O. Page numbers start at 1.
pub trait RemoteCatalog: Send + Sync + 'static {
    fn fetch_profile(&self) -> Result<AccountProfile, CatalogError>;

    fn fetch_page(&self, page: u32) -> Result<Vec<RemoteRepository>, CatalogError>;
}
