//! Multi-source search orchestration: fan-out, collect, merge, enrich.
//!
//! [`search::Orchestrator`] drives the per-call pipeline; [`merge`] holds
//! the pure strategy engine it delegates to.

pub mod merge;
pub mod search;

pub use merge::{merge as merge_products, RankedResult};
pub use search::Orchestrator;
