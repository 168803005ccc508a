//! Trait definition for pluggable source adapters.
//!
//! Each upstream provider implements [`SourceAdapter`] to expose the
//! standardised search contract. Adapters translate provider-specific
//! request/response shapes into the closed [`SearchResult`] /
//! [`EnrichmentResult`] types; the orchestrator never sees a raw provider
//! payload.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::{EnrichmentResult, ErrorInfo, SearchResult};

/// Options forwarded to one adapter `search` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSearchOptions {
    /// Requested result count. Adapters clamp to their own page size
    /// silently.
    pub limit: usize,
    /// Provider-agnostic filters (category, price band, …).
    pub filters: BTreeMap<String, String>,
}

impl Default for SourceSearchOptions {
    fn default() -> Self {
        Self {
            limit: 3,
            filters: BTreeMap::new(),
        }
    }
}

/// Options forwarded to one adapter `enrich` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichOptions {
    /// Upper bound on returned citations.
    pub max_citations: usize,
}

impl Default for EnrichOptions {
    fn default() -> Self {
        Self { max_citations: 5 }
    }
}

/// A pluggable upstream product search provider.
///
/// Implementations translate one provider's API into the standardised
/// result shape. The contract:
///
/// - `search` MUST NOT return `Err` for ordinary upstream failures — it
///   encodes them as a [`SearchResult`] with `error` set and no products.
///   Panics are reserved for programming errors.
/// - `enrich` is an optional capability; implementors that support it
///   override [`SourceAdapter::supports_enrichment`].
/// - Implementations must be `Send + Sync` for concurrent dispatch.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Stable identifier used for registry lookup and result attribution.
    fn id(&self) -> &str;

    /// Merge tie-break and truncation rank. Lower value wins.
    fn priority(&self) -> i32;

    /// Perform a product search against the upstream provider.
    async fn search(&self, query: &str, options: &SourceSearchOptions) -> SearchResult;

    /// Whether this adapter implements the `enrich` capability.
    fn supports_enrichment(&self) -> bool {
        false
    }

    /// Fetch contextual enrichment for a query subject.
    ///
    /// The default implementation reports the capability as unsupported;
    /// adapters that advertise `supports_enrichment` override this.
    async fn enrich(&self, query: &str, options: &EnrichOptions) -> EnrichmentResult {
        let _ = (query, options);
        EnrichmentResult::failure(
            ErrorInfo::upstream(self.id(), "enrichment not supported by this source"),
            0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Product;
    use std::sync::Arc;

    /// A mock adapter for testing trait bounds and defaults.
    struct MockAdapter {
        id: String,
        products: Vec<Product>,
    }

    #[async_trait]
    impl SourceAdapter for MockAdapter {
        fn id(&self) -> &str {
            &self.id
        }

        fn priority(&self) -> i32 {
            1
        }

        async fn search(&self, _query: &str, options: &SourceSearchOptions) -> SearchResult {
            let mut products = self.products.clone();
            products.truncate(options.limit);
            let total = self.products.len();
            SearchResult::success(&self.id, products, total, 1)
        }
    }

    fn make_product(id: &str) -> Product {
        Product {
            id: id.into(),
            title: format!("Product {id}"),
            price: "£1.00".into(),
            thumbnail_url: None,
            link: None,
            rating: None,
            review_count: None,
            source_id: "mock".into(),
            attributes: BTreeMap::new(),
        }
    }

    #[test]
    fn adapter_is_object_safe() {
        let adapter: Arc<dyn SourceAdapter> = Arc::new(MockAdapter {
            id: "mock".into(),
            products: vec![],
        });
        assert_eq!(adapter.id(), "mock");
        assert_eq!(adapter.priority(), 1);
        assert!(!adapter.supports_enrichment());
    }

    #[tokio::test]
    async fn mock_adapter_clamps_to_limit() {
        let adapter = MockAdapter {
            id: "mock".into(),
            products: vec![make_product("a"), make_product("b"), make_product("c")],
        };
        let options = SourceSearchOptions {
            limit: 2,
            ..Default::default()
        };
        let result = adapter.search("anything", &options).await;
        assert!(result.is_ok());
        assert_eq!(result.products.len(), 2);
        assert_eq!(result.total_count, 3);
    }

    #[tokio::test]
    async fn default_enrich_reports_unsupported() {
        let adapter = MockAdapter {
            id: "mock".into(),
            products: vec![],
        };
        let result = adapter.enrich("query", &EnrichOptions::default()).await;
        assert!(!result.is_ok());
        let error = result.error.expect("error set");
        assert_eq!(error.source_id, "mock");
        assert!(error.message.contains("not supported"));
    }

    #[test]
    fn source_options_defaults() {
        let options = SourceSearchOptions::default();
        assert_eq!(options.limit, 3);
        assert!(options.filters.is_empty());
        assert_eq!(EnrichOptions::default().max_citations, 5);
    }

    #[test]
    fn adapter_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MockAdapter>();
    }
}
