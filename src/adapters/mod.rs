//! Bundled source adapter implementations.
//!
//! Most providers live outside this crate and plug in through
//! [`crate::adapter::SourceAdapter`]. The adapters here cover the common
//! case of a provider exposing a plain JSON search endpoint.

pub mod rest;

pub use rest::RestAdapter;
