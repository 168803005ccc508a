//! Generic JSON-over-HTTP provider adapter.
//!
//! [`RestAdapter`] queries a provider exposing a plain search endpoint
//! (`GET {endpoint}?q=…&limit=…` plus filters as query parameters) and
//! normalises the response into the closed [`Product`] schema. Transport
//! and decode failures are mapped into error-carrying results; nothing
//! crosses the adapter boundary as a thrown error.

use std::collections::BTreeMap;
use std::time::Instant;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use crate::adapter::{SourceAdapter, SourceSearchOptions};
use crate::error::SearchError;
use crate::http;
use crate::types::{AttrValue, ErrorInfo, Product, SearchResult};

/// Largest page a single request will ask a provider for.
const DEFAULT_MAX_PAGE_SIZE: usize = 24;

/// Adapter for providers exposing a JSON search endpoint.
pub struct RestAdapter {
    id: String,
    priority: i32,
    endpoint: Url,
    client: reqwest::Client,
    max_page_size: usize,
}

impl RestAdapter {
    /// Create an adapter for the given endpoint.
    ///
    /// * `id` — source id the adapter registers under.
    /// * `priority` — merge/truncation rank (lower wins).
    /// * `endpoint` — absolute URL of the provider's search endpoint.
    /// * `timeout_ms` — hard HTTP request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] if the endpoint does not parse or
    /// the HTTP client cannot be built.
    pub fn new(
        id: impl Into<String>,
        priority: i32,
        endpoint: &str,
        timeout_ms: u64,
    ) -> Result<Self, SearchError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| SearchError::Config(format!("invalid endpoint URL: {e}")))?;
        let client = http::build_client(timeout_ms)?;
        Ok(Self {
            id: id.into(),
            priority,
            endpoint,
            client,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        })
    }

    /// Override the provider's page-size ceiling.
    pub fn with_max_page_size(mut self, max_page_size: usize) -> Self {
        self.max_page_size = max_page_size.max(1);
        self
    }

    fn request_url(&self, query: &str, limit: usize, filters: &BTreeMap<String, String>) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("q", query);
            pairs.append_pair("limit", &limit.to_string());
            for (key, value) in filters {
                pairs.append_pair(key, value);
            }
        }
        url
    }
}

#[async_trait]
impl SourceAdapter for RestAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    async fn search(&self, query: &str, options: &SourceSearchOptions) -> SearchResult {
        let started = Instant::now();
        let limit = options.limit.min(self.max_page_size);
        let url = self.request_url(query, limit, &options.filters);
        tracing::trace!(source = %self.id, query, limit, "REST provider search");

        let elapsed = |started: Instant| started.elapsed().as_millis() as u64;

        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                return SearchResult::failure(
                    &self.id,
                    ErrorInfo::upstream(&self.id, format!("request failed: {e}")),
                    elapsed(started),
                );
            }
        };

        let response = match response.error_for_status() {
            Ok(response) => response,
            Err(e) => {
                return SearchResult::failure(
                    &self.id,
                    ErrorInfo::upstream(&self.id, format!("provider returned error status: {e}")),
                    elapsed(started),
                );
            }
        };

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return SearchResult::failure(
                    &self.id,
                    ErrorInfo::upstream(&self.id, format!("response read failed: {e}")),
                    elapsed(started),
                );
            }
        };

        match parse_catalogue_json(&body, &self.id, limit) {
            Ok((products, total_count)) => {
                tracing::debug!(source = %self.id, count = products.len(), "REST provider results parsed");
                SearchResult::success(&self.id, products, total_count, elapsed(started))
            }
            Err(message) => SearchResult::failure(
                &self.id,
                ErrorInfo::upstream(&self.id, message),
                elapsed(started),
            ),
        }
    }
}

/// Wire shape of a provider search response.
#[derive(Debug, Deserialize)]
struct WireResponse {
    items: Vec<WireItem>,
    #[serde(default)]
    total: Option<usize>,
}

/// Wire shape of one catalogue item.
#[derive(Debug, Deserialize)]
struct WireItem {
    #[serde(default)]
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    price: String,
    #[serde(default)]
    thumbnail: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    rating: Option<f64>,
    #[serde(default)]
    reviews: Option<u64>,
    #[serde(default)]
    attributes: BTreeMap<String, serde_json::Value>,
}

/// Parse a provider response body into normalised products.
///
/// Extracted as a separate function for testability with canned JSON.
/// Items missing an id or title are skipped; ratings are clamped into the
/// 0–5 range; non-scalar attribute values are dropped during
/// normalisation.
pub(crate) fn parse_catalogue_json(
    body: &str,
    source_id: &str,
    limit: usize,
) -> Result<(Vec<Product>, usize), String> {
    let response: WireResponse =
        serde_json::from_str(body).map_err(|e| format!("malformed provider response: {e}"))?;

    let total_count = response.total.unwrap_or(response.items.len());

    let mut products = Vec::new();
    for item in response.items {
        let Some(product) = normalise_item(item, source_id) else {
            continue;
        };
        products.push(product);
        if products.len() >= limit {
            break;
        }
    }

    Ok((products, total_count))
}

/// Normalise one wire item into the closed [`Product`] schema.
fn normalise_item(item: WireItem, source_id: &str) -> Option<Product> {
    let id = item.id.trim();
    let title = item.title.trim();
    if id.is_empty() || title.is_empty() {
        return None;
    }

    let attributes = item
        .attributes
        .into_iter()
        .filter_map(|(key, value)| scalar_attr(value).map(|v| (key, v)))
        .collect();

    Some(Product {
        id: id.to_string(),
        title: title.to_string(),
        price: item.price,
        thumbnail_url: item.thumbnail.filter(|s| !s.is_empty()),
        link: item.url.filter(|s| !s.is_empty()),
        rating: item.rating.map(|r| r.clamp(0.0, 5.0)),
        review_count: item.reviews,
        source_id: source_id.to_string(),
        attributes,
    })
}

/// Map a raw JSON value onto the scalar attribute schema, dropping
/// anything nested.
fn scalar_attr(value: serde_json::Value) -> Option<AttrValue> {
    match value {
        serde_json::Value::String(s) => Some(AttrValue::Str(s)),
        serde_json::Value::Bool(b) => Some(AttrValue::Bool(b)),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(AttrValue::Int(i))
            } else {
                n.as_f64().map(AttrValue::Float)
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MOCK_CATALOGUE_JSON: &str = r#"{
        "total": 37,
        "items": [
            {
                "id": "sku-1001",
                "title": "USB-C Cable 2m",
                "price": "£7.99",
                "thumbnail": "https://cdn.example.com/sku-1001.jpg",
                "url": "https://shop.example.com/sku-1001",
                "rating": 4.6,
                "reviews": 812,
                "attributes": {
                    "colour": "black",
                    "length_m": 2,
                    "braided": true,
                    "variants": ["1m", "2m"]
                }
            },
            {
                "id": "sku-1002",
                "title": "USB-C Cable 1m",
                "price": "£5.49",
                "rating": 9.9
            },
            {
                "id": "",
                "title": "Ghost item without id",
                "price": "£0.00"
            },
            {
                "id": "sku-1003",
                "title": "USB-C Wall Charger",
                "price": "£12.00"
            }
        ]
    }"#;

    #[test]
    fn parse_mock_json_returns_products() {
        let (products, total) =
            parse_catalogue_json(MOCK_CATALOGUE_JSON, "shop", 10).expect("should parse");
        // The id-less ghost item is skipped.
        assert_eq!(products.len(), 3);
        assert_eq!(total, 37);

        assert_eq!(products[0].id, "sku-1001");
        assert_eq!(products[0].title, "USB-C Cable 2m");
        assert_eq!(products[0].price, "£7.99");
        assert_eq!(products[0].source_id, "shop");
        assert_eq!(products[0].review_count, Some(812));
    }

    #[test]
    fn parse_respects_limit() {
        let (products, total) =
            parse_catalogue_json(MOCK_CATALOGUE_JSON, "shop", 2).expect("should parse");
        assert_eq!(products.len(), 2);
        assert_eq!(total, 37);
    }

    #[test]
    fn rating_clamped_into_range() {
        let (products, _) =
            parse_catalogue_json(MOCK_CATALOGUE_JSON, "shop", 10).expect("should parse");
        assert_eq!(products[1].rating, Some(5.0));
    }

    #[test]
    fn non_scalar_attributes_dropped() {
        let (products, _) =
            parse_catalogue_json(MOCK_CATALOGUE_JSON, "shop", 10).expect("should parse");
        let attrs = &products[0].attributes;
        assert_eq!(attrs.get("colour"), Some(&AttrValue::Str("black".into())));
        assert_eq!(attrs.get("length_m"), Some(&AttrValue::Int(2)));
        assert_eq!(attrs.get("braided"), Some(&AttrValue::Bool(true)));
        assert!(!attrs.contains_key("variants"));
    }

    #[test]
    fn malformed_json_is_an_error() {
        let result = parse_catalogue_json("{not json", "shop", 10);
        assert!(result.unwrap_err().contains("malformed"));
    }

    #[test]
    fn missing_total_falls_back_to_item_count() {
        let body = r#"{"items":[{"id":"a","title":"A","price":"£1"}]}"#;
        let (products, total) = parse_catalogue_json(body, "shop", 10).expect("should parse");
        assert_eq!(products.len(), 1);
        assert_eq!(total, 1);
    }

    #[test]
    fn empty_items_parse_to_empty() {
        let (products, total) =
            parse_catalogue_json(r#"{"items":[]}"#, "shop", 10).expect("should parse");
        assert!(products.is_empty());
        assert_eq!(total, 0);
    }

    #[test]
    fn adapter_construction_validates_endpoint() {
        assert!(RestAdapter::new("shop", 1, "https://shop.example.com/search", 800).is_ok());
        assert!(RestAdapter::new("shop", 1, "not a url", 800).is_err());
    }

    #[test]
    fn request_url_encodes_query_limit_and_filters() {
        let adapter =
            RestAdapter::new("shop", 1, "https://shop.example.com/search", 800).expect("adapter");
        let mut filters = BTreeMap::new();
        filters.insert("category".to_string(), "cables & adapters".to_string());

        let url = adapter.request_url("usb cable", 3, &filters);
        let query = url.query().expect("query string");
        assert!(query.contains("q=usb+cable"));
        assert!(query.contains("limit=3"));
        assert!(query.contains("category=cables+%26+adapters"));
    }

    #[test]
    fn max_page_size_floor_is_one() {
        let adapter = RestAdapter::new("shop", 1, "https://shop.example.com/search", 800)
            .expect("adapter")
            .with_max_page_size(0);
        assert_eq!(adapter.max_page_size, 1);
    }

    #[test]
    fn adapter_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RestAdapter>();
    }
}
