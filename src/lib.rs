//! # bazaar-search
//!
//! Multi-source product search orchestration.
//!
//! This crate aggregates product search results from N independent upstream
//! providers under a latency budget. Providers plug in as [`SourceAdapter`]
//! implementations; the [`Orchestrator`] fans queries out to the selected
//! adapters concurrently, races each call against a per-source timeout,
//! merges whatever came back under a configurable strategy, and optionally
//! enriches the top result with contextual information.
//!
//! ## Design
//!
//! - Adapters are black boxes returning a standard result shape; upstream
//!   failures travel as values, never as thrown errors
//! - Per-adapter token-bucket rate limiting and TTL result caching,
//!   owned one-per-adapter and never shared
//! - Graceful degradation: a slow, denied, or failing source contributes
//!   an errored summary entry while the others still return products
//! - Merge ordering is deterministic — it depends on adapter priorities
//!   and the strategy, never on response arrival order
//! - All shared state (registry, caches, circuit breaker) is constructed
//!   at process start and passed by reference; nothing is a global
//!
//! ## Example
//!
//! ```no_run
//! # async fn example() -> bazaar_search::Result<()> {
//! use std::sync::Arc;
//! use bazaar_search::{
//!     AdapterRegistry, Orchestrator, OrchestratorConfig, RestAdapter, SearchOptions,
//! };
//!
//! let config = OrchestratorConfig::default();
//! let mut registry = AdapterRegistry::new();
//! registry.register(
//!     Arc::new(RestAdapter::new("shop", 1, "https://shop.example.com/search", 800)?),
//!     &config.adapter_defaults,
//! );
//!
//! let orchestrator = Orchestrator::new(registry, config)?;
//! let result = orchestrator.search("usb-c cable", &SearchOptions::default()).await?;
//! for product in &result.products {
//!     println!("{}: {} ({})", product.source_id, product.title, product.price);
//! }
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod adapters;
pub mod breaker;
pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod orchestrator;
pub mod rate_limit;
pub mod registry;
pub mod types;

pub use adapter::{EnrichOptions, SourceAdapter, SourceSearchOptions};
pub use adapters::RestAdapter;
pub use config::{AdapterParams, OrchestratorConfig, SearchOptions};
pub use error::{Result, SearchError};
pub use orchestrator::Orchestrator;
pub use registry::AdapterRegistry;
pub use types::{
    AttrValue, Citation, EnrichmentResult, ErrorCode, ErrorInfo, MergeStrategy, MultiSourceResult,
    Product, SearchResult, SourceSummary,
};
