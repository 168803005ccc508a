//! TTL result caches with deterministic keys.
//!
//! Two cache layers exist: one [`TtlCache`] per adapter (keyed by query +
//! normalised adapter options) and one composite cache on the orchestrator
//! (keyed by the full call shape). Caches are constructed explicitly and
//! injected — nothing here is a process-wide singleton. Entries expire
//! lazily: an entry past its TTL is treated as absent on the next lookup.
//!
//! Purely in-process; contents are lost on restart by design.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use moka::future::Cache;
use moka::Expiry;

use crate::types::MergeStrategy;

/// A cached value together with the TTL it was stored under.
#[derive(Debug, Clone)]
struct Entry<T> {
    value: T,
    ttl: Duration,
}

/// Expiry policy reading the TTL stored beside each entry, so every insert
/// can carry its own lifetime.
struct PerEntryTtl;

impl<K, T> Expiry<K, Entry<T>> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &K,
        entry: &Entry<T>,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &K,
        entry: &Entry<T>,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// Bounded in-memory cache with per-entry TTL.
pub struct TtlCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Cache<String, Entry<T>>,
}

impl<T> TtlCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a cache bounded to `max_entries`.
    pub fn new(max_entries: u64) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_entries)
                .expire_after(PerEntryTtl)
                .build(),
        }
    }

    /// Look up a value. Expired entries read as absent.
    pub async fn get(&self, key: &str) -> Option<T> {
        self.inner.get(key).await.map(|entry| entry.value)
    }

    /// Insert a value under its own TTL, replacing any existing entry.
    pub async fn insert(&self, key: String, value: T, ttl_seconds: u64) {
        self.inner
            .insert(
                key,
                Entry {
                    value,
                    ttl: Duration::from_secs(ttl_seconds),
                },
            )
            .await;
    }

    /// Whether an unexpired entry exists for `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }
}

/// Build the deterministic key for one adapter's private cache.
///
/// The query is trimmed and lowercased; filters serialise in sorted order
/// (`BTreeMap`), so equivalent calls always hash alike.
pub fn adapter_key(
    source_id: &str,
    query: &str,
    limit: usize,
    filters: &BTreeMap<String, String>,
) -> String {
    serde_json::json!({
        "source": source_id,
        "q": query.trim().to_lowercase(),
        "limit": limit,
        "filters": filters,
    })
    .to_string()
}

/// Build the deterministic key for the composite cache.
///
/// Source ids are sorted so `["a", "b"]` and `["b", "a"]` share an entry.
pub fn composite_key(
    query: &str,
    sources: &[String],
    strategy: MergeStrategy,
    max_results: usize,
    results_per_source: usize,
    filters: &BTreeMap<String, String>,
) -> String {
    let mut sorted: Vec<&str> = sources.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    serde_json::json!({
        "q": query.trim().to_lowercase(),
        "sources": sorted,
        "strategy": strategy.name(),
        "max_results": max_results,
        "results_per_source": results_per_source,
        "filters": filters,
    })
    .to_string()
}
