//! GitHub REST catalog using a shared `ureq` agent.

use std::fmt;
use std::time::Duration;

use gitsync_core::RemoteRepository;

use crate::catalog::{AccountProfile, RemoteCatalog, PAGE_SIZE};
use crate::error::CatalogError;

const USER_AGENT: &str = concat!("gitsync/", env!("CARGO_PKG_VERSION"));
const ACCEPT: &str = "application/vnd.github+json";

/// Catalog client for the authenticated GitHub account.
///
/// Clones share the underlying connection pool, so one value can serve every
/// concurrent page request of a run.
#[derive(Clone)]
pub struct GithubCatalog {
    agent: ureq::Agent,
    api_base: String,
    token: String,
}

impl fmt::Debug for GithubCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GithubCatalog")
            .field("api_base", &self.api_base)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl GithubCatalog {
    pub fn new(api_base: &str, token: impl Into<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build();
        Self {
            agent,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn get(&self, path: &str) -> ureq::Request {
        self.agent
            .get(&format!("{}{path}", self.api_base))
            .set("Authorization", &format!("Bearer {}", self.token))
            .set("Accept", ACCEPT)
    }
}

impl RemoteCatalog for GithubCatalog {
    fn fetch_profile(&self) -> Result<AccountProfile, CatalogError> {
        tracing::debug!(api_base = %self.api_base, "fetching account profile");
        let response = match self.get("/user").call() {
            Ok(response) => response,
            Err(ureq::Error::Status(401, _)) => {
                return Err(CatalogError::Authentication {
                    api_base: self.api_base.clone(),
                })
            }
            Err(ureq::Error::Status(code, response)) => {
                return Err(CatalogError::ProfileFetch(format!(
                    "HTTP {code} {}",
                    response.status_text()
                )))
            }
            Err(err) => return Err(CatalogError::ProfileFetch(err.to_string())),
        };
        response
            .into_json::<AccountProfile>()
            .map_err(|e| CatalogError::ProfileFetch(format!("invalid profile body: {e}")))
    }

    fn fetch_page(&self, page: u32) -> Result<Vec<RemoteRepository>, CatalogError> {
        tracing::debug!(page, "fetching repository page");
        let response = self
            .get("/user/repos")
            .query("type", "owner")
            .query("sort", "full_name")
            .query("per_page", &PAGE_SIZE.to_string())
            .query("page", &page.to_string())
            .call()
            .map_err(|err| {
                let reason = match err {
                    ureq::Error::Status(code, response) => {
                        format!("HTTP {code} {}", response.status_text())
                    }
                    other => other.to_string(),
                };
                CatalogError::PageFetch { page, reason }
            })?;
        response
            .into_json::<Vec<RemoteRepository>>()
            .map_err(|e| CatalogError::PageFetch {
                page,
                reason: format!("invalid page body: {e}"),
            })
    }
}
