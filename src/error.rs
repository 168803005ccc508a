//! Error types for the bazaar-search crate.
//!
//! Only call-level failures surface as [`SearchError`]; per-source failures
//! travel as [`crate::types::ErrorInfo`] values inside results and never
//! cross the adapter boundary as errors.

/// Errors that fail an orchestration call as a whole.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// Invalid configuration or per-call options.
    #[error("config error: {0}")]
    Config(String),

    /// No requested source id matched a registered adapter.
    #[error("no valid sources: {0}")]
    NoValidSources(String),

    /// A source timed out and `fallback_on_timeout` was disabled.
    #[error("source timed out: {0}")]
    Timeout(String),
}

impl SearchError {
    /// Stable machine-readable code for transport layers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG",
            Self::NoValidSources(_) => "NO_VALID_SOURCES",
            Self::Timeout(_) => "TIMEOUT",
        }
    }
}

/// Convenience type alias for bazaar-search results.
pub type Result<T> = std::result::Result<T, SearchError>;
