//! Pure merge engine combining per-source results under a strategy.
//!
//! Ordering depends only on the collected results, adapter priorities, and
//! the strategy — never on wall-clock arrival order. Duplicate product ids
//! across sources are dropped silently, keeping the first occurrence in
//! merge order, so every merged response carries unique ids.

use std::collections::HashSet;

use crate::types::{MergeStrategy, Product, SearchResult};

/// A collected per-source outcome paired with its adapter priority.
#[derive(Debug, Clone)]
pub struct RankedResult {
    /// The source adapter's priority (lower wins).
    pub priority: i32,
    /// The outcome of the source's call.
    pub result: SearchResult,
}

/// Combine per-source results into one bounded, ordered product list.
///
/// Results carrying an error or no products are ignored. The remaining
/// results are ordered by ascending priority (stable, so the caller's
/// selection order breaks ties) before the strategy applies:
///
/// - [`MergeStrategy::Interleave`] — round-robin, one product per source
///   per turn, until `max_results` or exhaustion.
/// - [`MergeStrategy::Sequential`] — all of the best source, then the
///   next, truncated to `max_results`.
/// - [`MergeStrategy::Priority`] — only the single best source's products.
pub fn merge(results: &[RankedResult], strategy: MergeStrategy, max_results: usize) -> Vec<Product> {
    let mut valid: Vec<&RankedResult> = results
        .iter()
        .filter(|r| r.result.error.is_none() && !r.result.products.is_empty())
        .collect();

    if valid.is_empty() {
        return Vec::new();
    }
    valid.sort_by_key(|r| r.priority);

    if valid.len() == 1 {
        return take_unique(valid[0].result.products.iter(), max_results);
    }

    match strategy {
        MergeStrategy::Interleave => interleave(&valid, max_results),
        MergeStrategy::Sequential => {
            take_unique(valid.iter().flat_map(|r| r.result.products.iter()), max_results)
        }
        MergeStrategy::Priority => take_unique(valid[0].result.products.iter(), max_results),
    }
}

/// Collect up to `max_results` products, skipping duplicate ids.
fn take_unique<'a>(products: impl Iterator<Item = &'a Product>, max_results: usize) -> Vec<Product> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut merged = Vec::new();
    for product in products {
        if merged.len() >= max_results {
            break;
        }
        if seen.insert(product.id.as_str()) {
            merged.push(product.clone());
        }
    }
    merged
}

/// Round-robin across sources in priority order.
///
/// Each turn takes the source's next not-yet-seen product; exhausted
/// sources drop out of the rotation. The iteration cap is a safety valve
/// against pathological inputs, not a semantic bound.
fn interleave(valid: &[&RankedResult], max_results: usize) -> Vec<Product> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut merged: Vec<Product> = Vec::new();
    let mut cursors = vec![0usize; valid.len()];

    let iteration_cap = valid.len() * 100;
    let mut iterations = 0;

    'rounds: loop {
        let mut advanced = false;
        for (index, source) in valid.iter().enumerate() {
            iterations += 1;
            if iterations > iteration_cap {
                break 'rounds;
            }

            let products = &source.result.products;
            while cursors[index] < products.len() {
                let product = &products[cursors[index]];
                cursors[index] += 1;
                if seen.insert(product.id.clone()) {
                    merged.push(product.clone());
                    advanced = true;
                    break;
                }
            }

            if merged.len() >= max_results {
                break 'rounds;
            }
        }
        if !advanced {
            break;
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ErrorInfo;
    use std::collections::BTreeMap;

    fn make_product(id: &str, source_id: &str) -> Product {
        Product {
            id: id.to_string(),
            title: format!("Product {id}"),
            price: "£1.00".into(),
            thumbnail_url: None,
            link: None,
            rating: None,
            review_count: None,
            source_id: source_id.to_string(),
            attributes: BTreeMap::new(),
        }
    }

    fn ranked(priority: i32, source_id: &str, ids: &[&str]) -> RankedResult {
        let products = ids.iter().map(|id| make_product(id, source_id)).collect();
        RankedResult {
            priority,
            result: SearchResult::success(source_id, products, ids.len(), 5),
        }
    }

    fn merged_ids(products: &[Product]) -> Vec<&str> {
        products.iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn interleave_round_robin_in_priority_order() {
        let results = vec![
            ranked(1, "a", &["a1", "a2", "a3"]),
            ranked(2, "b", &["b1", "b2"]),
        ];
        let merged = merge(&results, MergeStrategy::Interleave, 4);
        assert_eq!(merged_ids(&merged), vec!["a1", "b1", "a2", "b2"]);
    }

    #[test]
    fn sequential_concatenates_by_priority() {
        let results = vec![
            ranked(1, "a", &["a1", "a2", "a3"]),
            ranked(2, "b", &["b1", "b2"]),
        ];
        let merged = merge(&results, MergeStrategy::Sequential, 4);
        assert_eq!(merged_ids(&merged), vec!["a1", "a2", "a3", "b1"]);
    }

    #[test]
    fn priority_keeps_only_best_source() {
        let results = vec![
            ranked(1, "a", &["a1", "a2", "a3"]),
            ranked(2, "b", &["b1", "b2"]),
        ];
        let merged = merge(&results, MergeStrategy::Priority, 4);
        assert_eq!(merged_ids(&merged), vec!["a1", "a2", "a3"]);
    }

    #[test]
    fn priority_order_ignores_input_order() {
        // Same sources presented backwards: priority still decides.
        let results = vec![
            ranked(2, "b", &["b1", "b2"]),
            ranked(1, "a", &["a1", "a2", "a3"]),
        ];
        let merged = merge(&results, MergeStrategy::Interleave, 4);
        assert_eq!(merged_ids(&merged), vec!["a1", "b1", "a2", "b2"]);
    }

    #[test]
    fn no_valid_results_yields_empty() {
        assert!(merge(&[], MergeStrategy::Interleave, 10).is_empty());

        let errored = RankedResult {
            priority: 1,
            result: SearchResult::failure("a", ErrorInfo::timeout("a", 800), 800),
        };
        let empty = ranked(2, "b", &[]);
        let merged = merge(&[errored, empty], MergeStrategy::Interleave, 10);
        assert!(merged.is_empty());
    }

    #[test]
    fn single_valid_result_short_circuits_strategy() {
        let results = vec![
            ranked(2, "b", &["b1", "b2", "b3"]),
            RankedResult {
                priority: 1,
                result: SearchResult::failure("a", ErrorInfo::rate_limited("a"), 0),
            },
        ];
        for strategy in [
            MergeStrategy::Interleave,
            MergeStrategy::Sequential,
            MergeStrategy::Priority,
        ] {
            let merged = merge(&results, strategy, 2);
            assert_eq!(merged_ids(&merged), vec!["b1", "b2"]);
        }
    }

    #[test]
    fn interleave_continues_after_source_exhaustion() {
        let results = vec![
            ranked(1, "a", &["a1"]),
            ranked(2, "b", &["b1", "b2", "b3"]),
        ];
        let merged = merge(&results, MergeStrategy::Interleave, 10);
        assert_eq!(merged_ids(&merged), vec!["a1", "b1", "b2", "b3"]);
    }

    #[test]
    fn duplicate_ids_keep_first_occurrence() {
        let results = vec![
            ranked(1, "a", &["shared", "a2"]),
            ranked(2, "b", &["shared", "b2"]),
        ];
        let merged = merge(&results, MergeStrategy::Interleave, 10);
        assert_eq!(merged_ids(&merged), vec!["shared", "a2", "b2"]);
        // The kept copy is source a's.
        assert_eq!(merged[0].source_id, "a");

        let merged = merge(&results, MergeStrategy::Sequential, 10);
        assert_eq!(merged_ids(&merged), vec!["shared", "a2", "b2"]);
    }

    #[test]
    fn bound_respected_for_all_strategies() {
        let results = vec![
            ranked(1, "a", &["a1", "a2", "a3", "a4", "a5"]),
            ranked(2, "b", &["b1", "b2", "b3", "b4", "b5"]),
        ];
        for strategy in [
            MergeStrategy::Interleave,
            MergeStrategy::Sequential,
            MergeStrategy::Priority,
        ] {
            assert!(merge(&results, strategy, 3).len() <= 3);
        }
    }

    #[test]
    fn merge_is_deterministic() {
        let results = vec![
            ranked(1, "a", &["a1", "a2"]),
            ranked(1, "b", &["b1", "b2"]),
            ranked(3, "c", &["c1"]),
        ];
        let first = merge(&results, MergeStrategy::Interleave, 10);
        let second = merge(&results, MergeStrategy::Interleave, 10);
        assert_eq!(first, second);
    }

    #[test]
    fn equal_priorities_keep_input_order() {
        let results = vec![ranked(1, "a", &["a1"]), ranked(1, "b", &["b1"])];
        let merged = merge(&results, MergeStrategy::Interleave, 10);
        assert_eq!(merged_ids(&merged), vec!["a1", "b1"]);
    }

    #[test]
    fn three_source_interleave() {
        let results = vec![
            ranked(1, "a", &["a1", "a2"]),
            ranked(2, "b", &["b1"]),
            ranked(3, "c", &["c1", "c2"]),
        ];
        let merged = merge(&results, MergeStrategy::Interleave, 10);
        assert_eq!(merged_ids(&merged), vec!["a1", "b1", "c1", "a2", "c2"]);
    }
}
