//! Error types for gitsync-catalog.

use thiserror::Error;

/// All errors that can arise while discovering remote repositories.
///
/// Every variant aborts the run: syncing from a partial list could clone
/// over repositories that were simply missing from a failed page.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The API rejected the credential (HTTP 401).
    #[error("authentication rejected by {api_base}; check the access token")]
    Authentication { api_base: String },

    /// Any other failure reading the account profile.
    #[error("failed to fetch account profile: {0}")]
    ProfileFetch(String),

    /// A single page request failed. Folded into [`CatalogError::CatalogFetch`] by discovery.
    #[error("failed to fetch repository page {page}: {reason}")]
    PageFetch { page: u32, reason: String },

    /// One or more pages failed; no partial list is returned.
    #[error("repository discovery incomplete; failed page(s): {}", join_pages(.pages))]
    CatalogFetch { pages: Vec<u32>, reasons: Vec<String> },

    /// A discovery task panicked or was cancelled.
    #[error("discovery task join failure: {0}")]
    Join(String),
}

fn join_pages(pages: &[u32]) -> String {
    pages
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
