//! # gitsync-catalog
//!
//! Remote repository discovery.
//!
//! [`RemoteCatalog`] is the seam between discovery and a hosting API;
//! [`GithubCatalog`] is the only implementation. [`discover`] reads the
//! account profile, fans page requests out concurrently and merges them into
//! one name-ordered, deduplicated list.

pub mod catalog;
pub mod discovery;
pub mod error;
pub mod github;

pub use catalog::{page_count, AccountProfile, RemoteCatalog, PAGE_SIZE};
pub use discovery::{discover, merge_pages, Discovery};
pub use error::CatalogError;
pub use github::GithubCatalog;
