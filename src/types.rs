//! Core data types for multi-source product search.
//!
//! Every type crossing the adapter boundary lives here. Adapters normalise
//! their provider's response into the closed [`Product`] schema before
//! returning — no open `serde_json::Value` maps leak past the contract.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A scalar product attribute value.
///
/// Attributes are deliberately restricted to scalars so that adapters cannot
/// smuggle provider-specific nested structures past the normalisation step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    /// Free-text attribute (colour, brand, condition, …).
    Str(String),
    /// Integer attribute (stock count, model year, …).
    Int(i64),
    /// Floating-point attribute (weight, size, …).
    Float(f64),
    /// Boolean attribute (in stock, on sale, …).
    Bool(bool),
}

/// A single product returned by a source adapter.
///
/// Identity fields (`id`, `title`, `price`, `source_id`) are immutable once
/// an adapter has returned the product. The orchestrator only ever adds
/// derived `attributes` entries (e.g. an enrichment annotation).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Provider-assigned identifier, unique within one search response.
    pub id: String,
    /// Product title as shown by the provider.
    pub title: String,
    /// Formatted price string, including currency (e.g. `"£24.99"`).
    pub price: String,
    /// Thumbnail image URL, if the provider supplies one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    /// Link to the product page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// Average rating in the range 0–5.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    /// Number of reviews behind the rating.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_count: Option<u64>,
    /// Which source adapter returned this product.
    pub source_id: String,
    /// Normalised scalar attributes.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, AttrValue>,
}

/// Machine-readable failure codes attached to per-source errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The adapter's token bucket was empty; the call was never made.
    RateLimited,
    /// The adapter did not respond within the per-source timeout.
    Timeout,
    /// The upstream provider failed (HTTP error, malformed response, …).
    Upstream,
    /// The adapter's circuit breaker is open after repeated failures.
    CircuitOpen,
    /// No requested source id matched a registered adapter.
    NoValidSources,
}

impl ErrorCode {
    /// Returns the stable wire name of this code.
    pub fn name(&self) -> &'static str {
        match self {
            Self::RateLimited => "RATE_LIMITED",
            Self::Timeout => "TIMEOUT",
            Self::Upstream => "UPSTREAM",
            Self::CircuitOpen => "CIRCUIT_OPEN",
            Self::NoValidSources => "NO_VALID_SOURCES",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Structured error attached to a failed per-source call.
///
/// Presence of an `ErrorInfo` on a [`SearchResult`] implies the result
/// carries no products.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Human-readable failure description.
    pub message: String,
    /// Machine-readable failure code.
    pub code: ErrorCode,
    /// Which source the failure belongs to.
    pub source_id: String,
}

impl ErrorInfo {
    /// Build an error for the given code and source.
    pub fn new(code: ErrorCode, source_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code,
            source_id: source_id.into(),
        }
    }

    /// Rate-limit denial for a source.
    pub fn rate_limited(source_id: &str) -> Self {
        Self::new(
            ErrorCode::RateLimited,
            source_id,
            format!("{source_id}: rate limit exceeded"),
        )
    }

    /// Per-source timeout.
    pub fn timeout(source_id: &str, timeout_ms: u64) -> Self {
        Self::new(
            ErrorCode::Timeout,
            source_id,
            format!("{source_id}: no response within {timeout_ms}ms"),
        )
    }

    /// Upstream provider failure.
    pub fn upstream(source_id: &str, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Upstream, source_id, message)
    }

    /// Open circuit — the source is temporarily disabled.
    pub fn circuit_open(source_id: &str) -> Self {
        Self::new(
            ErrorCode::CircuitOpen,
            source_id,
            format!("{source_id}: circuit open after repeated failures"),
        )
    }
}

/// The outcome of one adapter `search` call.
///
/// Constructed via [`SearchResult::success`] or [`SearchResult::failure`] so
/// the "error implies empty products" invariant holds by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Products in the provider's ranking order.
    pub products: Vec<Product>,
    /// Total matches reported by the provider (may exceed `products.len()`).
    pub total_count: usize,
    /// Which source produced this result.
    pub source_id: String,
    /// Wall-clock duration of the adapter call in milliseconds.
    pub latency_ms: u64,
    /// Failure detail; `None` means the call succeeded (possibly with
    /// zero products).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

impl SearchResult {
    /// A successful result carrying `products`.
    pub fn success(
        source_id: impl Into<String>,
        products: Vec<Product>,
        total_count: usize,
        latency_ms: u64,
    ) -> Self {
        Self {
            products,
            total_count,
            source_id: source_id.into(),
            latency_ms,
            error: None,
        }
    }

    /// A failed result. Products are always empty.
    pub fn failure(source_id: impl Into<String>, error: ErrorInfo, latency_ms: u64) -> Self {
        Self {
            products: Vec::new(),
            total_count: 0,
            source_id: source_id.into(),
            latency_ms,
            error: Some(error),
        }
    }

    /// Whether the call succeeded.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// A citation supporting enrichment content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// Title of the cited page.
    pub title: String,
    /// Full URL of the cited page.
    pub url: String,
    /// Registrable domain of the URL (for compact display).
    pub domain: String,
    /// Optional supporting snippet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

/// The outcome of one adapter `enrich` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentResult {
    /// Contextual prose about the enrichment subject.
    pub content: String,
    /// Sources backing the content, in citation order.
    pub citations: Vec<Citation>,
    /// Wall-clock duration of the enrichment call in milliseconds.
    pub latency_ms: u64,
    /// Failure detail; a failed enrichment carries no content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

impl EnrichmentResult {
    /// A successful enrichment.
    pub fn success(content: impl Into<String>, citations: Vec<Citation>, latency_ms: u64) -> Self {
        Self {
            content: content.into(),
            citations,
            latency_ms,
            error: None,
        }
    }

    /// A failed enrichment. Content and citations are empty.
    pub fn failure(error: ErrorInfo, latency_ms: u64) -> Self {
        Self {
            content: String::new(),
            citations: Vec::new(),
            latency_ms,
            error: Some(error),
        }
    }

    /// Whether the enrichment succeeded.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-source outcome summary included in every [`MultiSourceResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSummary {
    /// Which source this summary describes.
    pub source_id: String,
    /// Number of products the source contributed before merging.
    pub count: usize,
    /// Duration of the source's call in milliseconds.
    pub latency_ms: u64,
    /// Failure detail for sources that errored, were denied, or timed out.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

/// The merged response returned to the caller and stored in the
/// composite cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiSourceResult {
    /// Merged products, bounded by the requested `max_results`. Product
    /// ids are unique within one response.
    pub products: Vec<Product>,
    /// Exactly one entry per adapter selected for the query, in selection
    /// order, regardless of per-source success or failure.
    pub source_summaries: Vec<SourceSummary>,
    /// Contextual enrichment for the top merged product, when requested
    /// and available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrichment: Option<EnrichmentResult>,
    /// End-to-end orchestration latency in milliseconds.
    pub latency_ms: u64,
    /// When the response was assembled.
    pub timestamp: DateTime<Utc>,
}

/// Strategy for combining per-source result lists into one ordered list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    /// Round-robin across sources in priority order.
    #[default]
    Interleave,
    /// All products from the highest-priority source, then the next, etc.
    Sequential,
    /// Only the single highest-priority source's products.
    Priority,
}

impl MergeStrategy {
    /// Returns the stable name of this strategy.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Interleave => "interleave",
            Self::Sequential => "sequential",
            Self::Priority => "priority",
        }
    }

    /// Parse a strategy name leniently.
    ///
    /// Unknown names fall back to [`MergeStrategy::Interleave`] with a
    /// warning rather than failing the call.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "interleave" => Self::Interleave,
            "sequential" => Self::Sequential,
            "priority" => Self::Priority,
            other => {
                tracing::warn!(strategy = other, "unknown merge strategy; using interleave");
                Self::Interleave
            }
        }
    }
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
