//! Shared HTTP client construction for provider adapters.

use std::time::Duration;

use crate::error::SearchError;

/// User-Agent sent on provider API requests.
const USER_AGENT: &str = concat!("bazaar-search/", env!("CARGO_PKG_VERSION"));

/// Build a [`reqwest::Client`] configured for JSON provider APIs.
///
/// The client has a hard request timeout, a stable User-Agent, and a
/// bounded redirect policy.
///
/// # Errors
///
/// Returns [`SearchError::Config`] if the client cannot be constructed.
pub fn build_client(timeout_ms: u64) -> Result<reqwest::Client, SearchError> {
    reqwest::Client::builder()
        .timeout(Duration::from_millis(timeout_ms))
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .map_err(|e| SearchError::Config(format!("failed to build HTTP client: {e}")))
}
