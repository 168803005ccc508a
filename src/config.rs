//! Orchestrator configuration and per-call search options.
//!
//! [`OrchestratorConfig`] holds process-start configuration (default source
//! set, cache sizing, per-adapter defaults). [`SearchOptions`] is the
//! per-call knob set with the documented defaults. Both validate eagerly
//! with field-naming error messages.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::breaker::BreakerConfig;
use crate::error::SearchError;
use crate::types::MergeStrategy;

/// Hard ceiling on `max_results`, enforced regardless of caller input.
pub const MAX_RESULTS_CEILING: usize = 50;

/// Per-adapter resource parameters, applied at registration time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterParams {
    /// Token bucket burst capacity.
    pub rate_limit_capacity: u32,
    /// Tokens restored per second.
    pub rate_limit_refill_per_sec: f64,
    /// Per-adapter result cache TTL in seconds. `0` disables caching.
    pub cache_ttl_seconds: u64,
    /// Maximum entries held by the per-adapter cache.
    pub cache_capacity: u64,
}

impl Default for AdapterParams {
    fn default() -> Self {
        Self {
            rate_limit_capacity: 10,
            rate_limit_refill_per_sec: 2.0,
            cache_ttl_seconds: 300,
            cache_capacity: 100,
        }
    }
}

/// Process-start configuration for an [`crate::orchestrator::Orchestrator`].
///
/// Loading is the caller's concern; the type derives `serde` so any config
/// layer can produce it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Source ids used when a call does not name its own.
    pub default_sources: Vec<String>,
    /// Merge strategy seeded into [`OrchestratorConfig::options`].
    pub default_merge_strategy: MergeStrategy,
    /// Default cap on merged products.
    pub default_max_results: usize,
    /// Default cap on simultaneous in-flight source calls.
    pub default_max_parallel: usize,
    /// Default per-source timeout in milliseconds.
    pub default_timeout_ms: u64,
    /// Default result count requested from each source.
    pub default_results_per_source: usize,
    /// Whether enrichment runs by default.
    pub include_enrichment: bool,
    /// Composite cache TTL in seconds. `0` disables the composite cache.
    pub composite_cache_ttl_seconds: u64,
    /// Maximum entries held by the composite cache.
    pub composite_cache_capacity: u64,
    /// Parameters applied to adapters registered without overrides.
    pub adapter_defaults: AdapterParams,
    /// Circuit breaker thresholds shared by all sources.
    pub breaker: BreakerConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            default_sources: Vec::new(),
            default_merge_strategy: MergeStrategy::Interleave,
            default_max_results: 10,
            default_max_parallel: 3,
            default_timeout_ms: 800,
            default_results_per_source: 3,
            include_enrichment: true,
            composite_cache_ttl_seconds: 120,
            composite_cache_capacity: 100,
            adapter_defaults: AdapterParams::default(),
            breaker: BreakerConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Validates this configuration, returning an error if any field is
    /// invalid.
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.default_max_results == 0 {
            return Err(SearchError::Config(
                "default_max_results must be greater than 0".into(),
            ));
        }
        if self.default_max_parallel == 0 {
            return Err(SearchError::Config(
                "default_max_parallel must be greater than 0".into(),
            ));
        }
        if self.default_timeout_ms == 0 {
            return Err(SearchError::Config(
                "default_timeout_ms must be greater than 0".into(),
            ));
        }
        if self.default_results_per_source == 0 {
            return Err(SearchError::Config(
                "default_results_per_source must be greater than 0".into(),
            ));
        }
        if self.composite_cache_capacity == 0 {
            return Err(SearchError::Config(
                "composite_cache_capacity must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Build per-call options seeded from this configuration's defaults.
    pub fn options(&self) -> SearchOptions {
        SearchOptions {
            sources: self.default_sources.clone(),
            merge_strategy: self.default_merge_strategy,
            max_results: self.default_max_results,
            max_parallel: self.default_max_parallel,
            timeout_ms: self.default_timeout_ms,
            results_per_source: self.default_results_per_source,
            include_enrichment: self.include_enrichment,
            ..SearchOptions::default()
        }
    }
}

/// Per-call options for one multi-source search.
///
/// Missing fields deserialize to the documented defaults, so a transport
/// layer can pass through a sparse options object unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    /// Source ids to query. Empty means the orchestrator's default set.
    pub sources: Vec<String>,
    /// Dispatch sources concurrently rather than one after another.
    pub parallel: bool,
    /// How per-source results are combined.
    pub merge_strategy: MergeStrategy,
    /// Cap on merged products, clamped to [`MAX_RESULTS_CEILING`].
    pub max_results: usize,
    /// Cap on simultaneous in-flight source calls; excess sources are
    /// dropped by ascending priority.
    pub max_parallel: usize,
    /// Per-source timeout in milliseconds.
    pub timeout_ms: u64,
    /// On a per-source timeout, degrade to an empty errored result rather
    /// than failing the whole call.
    pub fallback_on_timeout: bool,
    /// Result count requested from each source.
    pub results_per_source: usize,
    /// Run the enrichment step when an enrichment-capable source exists.
    pub include_enrichment: bool,
    /// Bypass cache reads and writes for this call.
    pub no_cache: bool,
    /// Provider-agnostic filters forwarded to every adapter.
    pub filters: BTreeMap<String, String>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            parallel: true,
            merge_strategy: MergeStrategy::Interleave,
            max_results: 10,
            max_parallel: 3,
            timeout_ms: 800,
            fallback_on_timeout: true,
            results_per_source: 3,
            include_enrichment: true,
            no_cache: false,
            filters: BTreeMap::new(),
        }
    }
}

impl SearchOptions {
    /// Validates these options, returning an error if any field is invalid.
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.max_results == 0 {
            return Err(SearchError::Config(
                "max_results must be greater than 0".into(),
            ));
        }
        if self.max_parallel == 0 {
            return Err(SearchError::Config(
                "max_parallel must be greater than 0".into(),
            ));
        }
        if self.timeout_ms == 0 {
            return Err(SearchError::Config(
                "timeout_ms must be greater than 0".into(),
            ));
        }
        if self.results_per_source == 0 {
            return Err(SearchError::Config(
                "results_per_source must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// `max_results` with the hard ceiling applied.
    pub(crate) fn clamped_max_results(&self) -> usize {
        self.max_results.min(MAX_RESULTS_CEILING)
    }
}
