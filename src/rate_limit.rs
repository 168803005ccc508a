//! Token-bucket rate limiter gating adapter dispatch.
//!
//! Each registered adapter owns one [`TokenBucket`]; buckets are never
//! shared across adapters. Denied callers treat the denial as an immediate
//! source-level failure — there is no blocking or retry-in-place.

use std::sync::Mutex;
use std::time::Instant;

/// Internal mutable state for the token-bucket algorithm.
#[derive(Debug)]
struct BucketState {
    /// Maximum number of tokens (burst capacity).
    capacity: f64,
    /// Currently available tokens (fractional for sub-token accumulation).
    available: f64,
    /// Tokens added per second.
    refill_per_sec: f64,
    /// Timestamp of the last refill calculation.
    last_refill: Instant,
}

/// A token bucket with lazy, elapsed-time based refill.
///
/// All state sits behind a [`Mutex`], so concurrent `try_consume` calls
/// from parallel dispatches are linearised — tokens cannot be
/// double-spent.
#[derive(Debug)]
pub struct TokenBucket {
    inner: Mutex<BucketState>,
}

impl TokenBucket {
    /// Create a full bucket.
    ///
    /// * `capacity` — maximum burst size (tokens available initially).
    /// * `refill_per_sec` — tokens restored per second.
    pub fn new(capacity: u32, refill_per_sec: f64) -> Self {
        Self {
            inner: Mutex::new(BucketState {
                capacity: f64::from(capacity),
                available: f64::from(capacity),
                refill_per_sec,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Try to consume `n` tokens.
    ///
    /// Refills lazily from the elapsed time since the last refill, capped
    /// at capacity, then either consumes `n` tokens atomically or leaves
    /// the state unchanged and returns `false`.
    pub fn try_consume(&self, n: u32) -> bool {
        let Ok(mut state) = self.inner.lock() else {
            return false;
        };
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.last_refill = now;
        state.available = (state.available + elapsed * state.refill_per_sec).min(state.capacity);

        let wanted = f64::from(n);
        if state.available >= wanted {
            state.available -= wanted;
            true
        } else {
            false
        }
    }

    /// Returns the burst capacity.
    pub fn capacity(&self) -> u32 {
        self.inner.lock().map(|s| s.capacity as u32).unwrap_or(0)
    }

    /// Currently available tokens (refill not applied).
    pub fn available(&self) -> f64 {
        self.inner.lock().map(|s| s.available).unwrap_or(0.0)
    }
}
