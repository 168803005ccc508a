//! Core search orchestrator: concurrent multi-source fan-out with
//! per-source timeouts, merge, and optional enrichment.
//!
//! The pipeline per call: composite cache check → adapter selection →
//! priority truncation → dispatch (parallel fan-out or sequential loop)
//! → collect → merge → enrich → finalise. Partial failure is the normal
//! case: every selected source contributes a summary entry whether it
//! succeeded, errored, was denied, or timed out.

use std::time::{Duration, Instant};

use chrono::Utc;

use crate::adapter::{EnrichOptions, SourceSearchOptions};
use crate::breaker::CircuitBreaker;
use crate::cache::{self, TtlCache};
use crate::config::{OrchestratorConfig, SearchOptions};
use crate::error::{Result, SearchError};
use crate::registry::{AdapterRegistry, SourceHandle};
use crate::types::{
    AttrValue, EnrichmentResult, ErrorCode, ErrorInfo, MultiSourceResult, Product, SearchResult,
    SourceSummary,
};

use super::merge::{merge, RankedResult};

/// Attribute key under which the enrichment annotation lands on the top
/// merged product.
const ENRICHED_DESCRIPTION_ATTR: &str = "enriched_description";

/// Multi-source search orchestrator.
///
/// Owns the adapter registry, the composite result cache, and the
/// per-source circuit breaker. All three are constructed once at process
/// start and passed in or built from explicit configuration — there is no
/// hidden global state.
pub struct Orchestrator {
    registry: AdapterRegistry,
    config: OrchestratorConfig,
    composite_cache: TtlCache<MultiSourceResult>,
    breaker: CircuitBreaker,
}

impl Orchestrator {
    /// Create an orchestrator over a populated registry.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] if the configuration is invalid.
    pub fn new(registry: AdapterRegistry, config: OrchestratorConfig) -> Result<Self> {
        config.validate()?;
        let composite_cache = TtlCache::new(config.composite_cache_capacity);
        let breaker = CircuitBreaker::new(config.breaker.clone());
        Ok(Self {
            registry,
            config,
            composite_cache,
            breaker,
        })
    }

    /// The registry this orchestrator dispatches to.
    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    /// The configuration this orchestrator was built with.
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Circuit breaker health for all tracked sources.
    pub fn source_health(&self) -> Vec<(String, crate::breaker::CircuitState, u32)> {
        self.breaker.health_report()
    }

    /// Run one multi-source search.
    ///
    /// # Errors
    ///
    /// - [`SearchError::Config`] for a blank query or invalid options.
    /// - [`SearchError::NoValidSources`] when no requested source id
    ///   matches a registered adapter.
    /// - [`SearchError::Timeout`] when a source times out and
    ///   `fallback_on_timeout` is disabled.
    ///
    /// Per-source failures do not error the call; they surface in
    /// `source_summaries`.
    pub async fn search(&self, query: &str, options: &SearchOptions) -> Result<MultiSourceResult> {
        let started = Instant::now();
        let query = query.trim();
        if query.is_empty() {
            return Err(SearchError::Config("query must not be empty".into()));
        }
        options.validate()?;
        let max_results = options.clamped_max_results();
        tracing::trace!(query, "multi-source search");

        let requested: &[String] = if options.sources.is_empty() {
            &self.config.default_sources
        } else {
            &options.sources
        };

        let key = cache::composite_key(
            query,
            requested,
            options.merge_strategy,
            max_results,
            options.results_per_source,
            &options.filters,
        );
        if !options.no_cache {
            if let Some(hit) = self.composite_cache.get(&key).await {
                tracing::debug!(query, "composite cache hit");
                return Ok(hit);
            }
        }

        // Selection: intersect with the registry, then truncate by
        // ascending priority (stable, so request order breaks ties).
        let mut selected = self.registry.select(requested);
        if selected.is_empty() {
            return Err(SearchError::NoValidSources(format!(
                "requested {requested:?}, registered {:?}",
                self.registry.ids()
            )));
        }
        selected.sort_by_key(|handle| handle.priority());
        if selected.len() > options.max_parallel {
            tracing::debug!(
                dropped = selected.len() - options.max_parallel,
                max_parallel = options.max_parallel,
                "truncating source set by priority"
            );
            selected.truncate(options.max_parallel);
        }

        let source_options = SourceSearchOptions {
            limit: options.results_per_source,
            filters: options.filters.clone(),
        };

        let outcomes = if options.parallel {
            self.dispatch_parallel(query, &selected, &source_options, options)
                .await?
        } else {
            self.dispatch_sequential(query, &selected, &source_options, options)
                .await?
        };

        let mut products = merge(&outcomes, options.merge_strategy, max_results);

        let enrichment = if options.include_enrichment && !products.is_empty() {
            self.run_enrichment(query, &mut products, options).await
        } else {
            None
        };

        let source_summaries = outcomes
            .iter()
            .map(|outcome| SourceSummary {
                source_id: outcome.result.source_id.clone(),
                count: outcome.result.products.len(),
                latency_ms: outcome.result.latency_ms,
                error: outcome.result.error.clone(),
            })
            .collect();

        let result = MultiSourceResult {
            products,
            source_summaries,
            enrichment,
            latency_ms: started.elapsed().as_millis() as u64,
            timestamp: Utc::now(),
        };

        if !options.no_cache && self.config.composite_cache_ttl_seconds > 0 {
            self.composite_cache
                .insert(key, result.clone(), self.config.composite_cache_ttl_seconds)
                .await;
        }

        tracing::debug!(
            query,
            products = result.products.len(),
            sources = result.source_summaries.len(),
            latency_ms = result.latency_ms,
            "multi-source search complete"
        );
        Ok(result)
    }

    /// Fan out to all selected sources concurrently and await every
    /// outcome — a failing source never short-circuits the others.
    async fn dispatch_parallel(
        &self,
        query: &str,
        selected: &[&SourceHandle],
        source_options: &SourceSearchOptions,
        options: &SearchOptions,
    ) -> Result<Vec<RankedResult>> {
        let timeout = Duration::from_millis(options.timeout_ms);
        let calls: Vec<_> = selected
            .iter()
            .map(|&handle| async move {
                let outcome = tokio::time::timeout(
                    timeout,
                    self.call_source(handle, query, source_options, options.no_cache),
                )
                .await;
                (handle, outcome)
            })
            .collect();

        let settled = futures::future::join_all(calls).await;

        let mut outcomes = Vec::with_capacity(settled.len());
        for (handle, outcome) in settled {
            let result = self.settle_outcome(handle, outcome, options)?;
            outcomes.push(RankedResult {
                priority: handle.priority(),
                result,
            });
        }
        Ok(outcomes)
    }

    /// Call the selected sources one after another. A failure or timeout
    /// in one source does not abort the rest.
    async fn dispatch_sequential(
        &self,
        query: &str,
        selected: &[&SourceHandle],
        source_options: &SourceSearchOptions,
        options: &SearchOptions,
    ) -> Result<Vec<RankedResult>> {
        let timeout = Duration::from_millis(options.timeout_ms);
        let mut outcomes = Vec::with_capacity(selected.len());
        for &handle in selected {
            let outcome = tokio::time::timeout(
                timeout,
                self.call_source(handle, query, source_options, options.no_cache),
            )
            .await;
            let result = self.settle_outcome(handle, outcome, options)?;
            outcomes.push(RankedResult {
                priority: handle.priority(),
                result,
            });
        }
        Ok(outcomes)
    }

    /// Convert a timeout race outcome into a per-source result, or escalate
    /// the timeout to a call-level failure when fallback is disabled.
    ///
    /// Dropping the timed-out future cancels the adapter call, so a late
    /// response cannot reach the merge step or write stale cache entries.
    fn settle_outcome(
        &self,
        handle: &SourceHandle,
        outcome: std::result::Result<SearchResult, tokio::time::error::Elapsed>,
        options: &SearchOptions,
    ) -> Result<SearchResult> {
        match outcome {
            Ok(result) => Ok(result),
            Err(_elapsed) => {
                self.breaker.record_failure(handle.id());
                tracing::warn!(
                    source = handle.id(),
                    timeout_ms = options.timeout_ms,
                    "source timed out"
                );
                if !options.fallback_on_timeout {
                    return Err(SearchError::Timeout(format!(
                        "{} exceeded {}ms",
                        handle.id(),
                        options.timeout_ms
                    )));
                }
                Ok(SearchResult::failure(
                    handle.id(),
                    ErrorInfo::timeout(handle.id(), options.timeout_ms),
                    options.timeout_ms,
                ))
            }
        }
    }

    /// Run one gated source call, consulting and feeding the circuit
    /// breaker.
    async fn call_source(
        &self,
        handle: &SourceHandle,
        query: &str,
        source_options: &SourceSearchOptions,
        no_cache: bool,
    ) -> SearchResult {
        if !self.breaker.should_attempt(handle.id()) {
            tracing::debug!(source = handle.id(), "circuit open; skipping source");
            return SearchResult::failure(handle.id(), ErrorInfo::circuit_open(handle.id()), 0);
        }

        let result = handle.search(query, source_options, no_cache).await;
        match &result.error {
            None => self.breaker.record_success(handle.id()),
            Some(info) if info.code == ErrorCode::Upstream => {
                tracing::warn!(source = handle.id(), error = %info.message, "source query failed");
                self.breaker.record_failure(handle.id());
            }
            // Rate-limit denials are local back-pressure, not upstream
            // health signal.
            Some(_) => {}
        }
        result
    }

    /// Enrich the top merged product, swallowing every failure.
    ///
    /// The enrichment query is the top product's title; the call runs
    /// against the preferred enrichment-capable adapter with twice the
    /// per-source timeout. On success the top product gains a derived
    /// description attribute — identity fields stay untouched.
    async fn run_enrichment(
        &self,
        query: &str,
        products: &mut [Product],
        options: &SearchOptions,
    ) -> Option<EnrichmentResult> {
        let handle = self.registry.enrichment_handle()?;
        let top = products.first_mut()?;

        let enrich_query = top.title.clone();
        let timeout = Duration::from_millis(options.timeout_ms.saturating_mul(2));
        tracing::trace!(source = handle.id(), query, subject = %enrich_query, "enrichment");

        match tokio::time::timeout(timeout, handle.enrich(&enrich_query, &EnrichOptions::default()))
            .await
        {
            Ok(result) if result.is_ok() => {
                if !result.content.is_empty() {
                    top.attributes.insert(
                        ENRICHED_DESCRIPTION_ATTR.to_string(),
                        AttrValue::Str(result.content.clone()),
                    );
                }
                Some(result)
            }
            Ok(result) => {
                let message = result
                    .error
                    .as_ref()
                    .map(|e| e.message.clone())
                    .unwrap_or_default();
                tracing::warn!(
                    source = handle.id(),
                    error = %message,
                    "enrichment failed; returning results without it"
                );
                None
            }
            Err(_elapsed) => {
                tracing::warn!(
                    source = handle.id(),
                    timeout_ms = options.timeout_ms * 2,
                    "enrichment timed out; returning results without it"
                );
                None
            }
        }
    }
}
