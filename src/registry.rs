//! Adapter registry and per-source dispatch handles.
//!
//! A [`SourceHandle`] pairs one registered adapter with its private
//! [`TokenBucket`] and result [`TtlCache`] — both are owned here, one per
//! source, and never shared across sources. The
//! [`AdapterRegistry`] maps source ids to handles and answers selection
//! queries for the orchestrator.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use crate::adapter::{EnrichOptions, SourceAdapter, SourceSearchOptions};
use crate::cache::{self, TtlCache};
use crate::config::AdapterParams;
use crate::rate_limit::TokenBucket;
use crate::types::{EnrichmentResult, ErrorInfo, SearchResult};

/// One registered source: the adapter plus its private rate limiter and
/// result cache.
pub struct SourceHandle {
    adapter: Arc<dyn SourceAdapter>,
    bucket: TokenBucket,
    cache: TtlCache<SearchResult>,
    cache_ttl_seconds: u64,
}

impl SourceHandle {
    /// Build a handle from an adapter and its resource parameters.
    pub fn new(adapter: Arc<dyn SourceAdapter>, params: &AdapterParams) -> Self {
        Self {
            adapter,
            bucket: TokenBucket::new(params.rate_limit_capacity, params.rate_limit_refill_per_sec),
            cache: TtlCache::new(params.cache_capacity),
            cache_ttl_seconds: params.cache_ttl_seconds,
        }
    }

    /// The adapter's source id.
    pub fn id(&self) -> &str {
        self.adapter.id()
    }

    /// The adapter's merge/truncation priority (lower wins).
    pub fn priority(&self) -> i32 {
        self.adapter.priority()
    }

    /// Whether the adapter implements the enrichment capability.
    pub fn supports_enrichment(&self) -> bool {
        self.adapter.supports_enrichment()
    }

    /// Run one gated search call.
    ///
    /// Pipeline: private cache lookup (a hit spends no token) → token
    /// bucket gate → adapter call → cache write for successful results.
    /// Denials come back as error-carrying results, never as `Err`.
    pub async fn search(
        &self,
        query: &str,
        options: &SourceSearchOptions,
        no_cache: bool,
    ) -> SearchResult {
        let key = cache::adapter_key(self.id(), query, options.limit, &options.filters);

        if !no_cache {
            if let Some(hit) = self.cache.get(&key).await {
                tracing::debug!(source = self.id(), "adapter cache hit");
                return hit;
            }
        }

        if !self.bucket.try_consume(1) {
            tracing::debug!(source = self.id(), "rate limit denied dispatch");
            return SearchResult::failure(self.id(), ErrorInfo::rate_limited(self.id()), 0);
        }

        let started = Instant::now();
        let mut result = self.adapter.search(query, options).await;
        result.latency_ms = started.elapsed().as_millis() as u64;

        // Uphold the contract even against a misbehaving adapter: an
        // errored result carries no products.
        if result.error.is_some() && !result.products.is_empty() {
            tracing::warn!(
                source = self.id(),
                "adapter returned products alongside an error; dropping them"
            );
            result.products.clear();
            result.total_count = 0;
        }

        if !no_cache && result.is_ok() && self.cache_ttl_seconds > 0 {
            self.cache
                .insert(key, result.clone(), self.cache_ttl_seconds)
                .await;
        }

        result
    }

    /// Run one gated enrichment call.
    ///
    /// Shares the source's token bucket with searches; a denial surfaces
    /// as an error-carrying result for the orchestrator to swallow.
    pub async fn enrich(&self, query: &str, options: &EnrichOptions) -> EnrichmentResult {
        if !self.bucket.try_consume(1) {
            return EnrichmentResult::failure(ErrorInfo::rate_limited(self.id()), 0);
        }

        let started = Instant::now();
        let mut result = self.adapter.enrich(query, options).await;
        result.latency_ms = started.elapsed().as_millis() as u64;
        result
    }
}

/// Mapping from source id to [`SourceHandle`], populated at startup.
#[derive(Default)]
pub struct AdapterRegistry {
    handles: BTreeMap<String, SourceHandle>,
}

impl AdapterRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under its own id, replacing any previous
    /// registration for that id.
    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>, params: &AdapterParams) {
        let id = adapter.id().to_string();
        if self.handles.contains_key(&id) {
            tracing::warn!(source = %id, "replacing previously registered adapter");
        }
        self.handles.insert(id, SourceHandle::new(adapter, params));
    }

    /// Look up a handle by source id.
    pub fn get(&self, source_id: &str) -> Option<&SourceHandle> {
        self.handles.get(source_id)
    }

    /// All registered source ids, sorted.
    pub fn ids(&self) -> Vec<&str> {
        self.handles.keys().map(String::as_str).collect()
    }

    /// Number of registered adapters.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether no adapters are registered.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Intersect requested source ids with registered adapters, preserving
    /// request order and skipping duplicates.
    ///
    /// Unknown ids are dropped with a warning — worth logging, not fatal.
    pub(crate) fn select(&self, requested: &[String]) -> Vec<&SourceHandle> {
        let mut selected: Vec<&SourceHandle> = Vec::new();
        for id in requested {
            match self.handles.get(id) {
                Some(handle) => {
                    if !selected.iter().any(|h| h.id() == handle.id()) {
                        selected.push(handle);
                    }
                }
                None => {
                    tracing::warn!(source = %id, "requested source is not registered; dropping");
                }
            }
        }
        selected
    }

    /// The preferred enrichment-capable handle (lowest priority value), if
    /// any adapter advertises the capability.
    pub(crate) fn enrichment_handle(&self) -> Option<&SourceHandle> {
        self.handles
            .values()
            .filter(|h| h.supports_enrichment())
            .min_by_key(|h| h.priority())
    }
}
