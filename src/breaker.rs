//! Per-source circuit breaker for adaptive source gating.
//!
//! Tracks success/failure counts per source and temporarily disables
//! sources that fail repeatedly. After a cooldown period, a tripped source
//! enters a half-open state where a single probe request determines whether
//! to restore or re-trip the circuit.
//!
//! A breaker is constructed per orchestrator and passed by reference —
//! there is no process-wide instance, so tests stay isolated.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Circuit state for a single source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Source is healthy — all requests are allowed through.
    Closed,
    /// Source has failed too many times — requests are blocked until the
    /// cooldown expires.
    Open,
    /// Cooldown has elapsed — one probe request is allowed to test
    /// recovery.
    HalfOpen,
}

/// Health tracking data for a single source.
#[derive(Debug, Clone)]
struct SourceHealth {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure_at: Option<Instant>,
}

impl Default for SourceHealth {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            last_failure_at: None,
        }
    }
}

/// Configuration for circuit breaker behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive failures before tripping the circuit to Open.
    pub failure_threshold: u32,
    /// Seconds to wait in Open state before allowing a probe.
    pub cooldown_secs: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown_secs: 60,
        }
    }
}

/// Per-source circuit breaker.
///
/// Each source has independent health tracking keyed by its id. State sits
/// behind a [`Mutex`] so recording from parallel dispatches is serialised.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    sources: Mutex<HashMap<String, SourceHealth>>,
}

impl CircuitBreaker {
    /// Create a breaker with the given configuration.
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            sources: Mutex::new(HashMap::new()),
        }
    }

    /// Record a successful call for `source_id`.
    ///
    /// Resets the consecutive failure count and closes the circuit
    /// regardless of previous state.
    pub fn record_success(&self, source_id: &str) {
        let Ok(mut sources) = self.sources.lock() else {
            return;
        };
        let health = sources.entry(source_id.to_string()).or_default();
        health.state = CircuitState::Closed;
        health.consecutive_failures = 0;
    }

    /// Record a failed call for `source_id`.
    ///
    /// Trips the circuit to Open once the consecutive failure count
    /// reaches the configured threshold.
    pub fn record_failure(&self, source_id: &str) {
        let Ok(mut sources) = self.sources.lock() else {
            return;
        };
        let health = sources.entry(source_id.to_string()).or_default();
        health.consecutive_failures += 1;
        health.last_failure_at = Some(Instant::now());

        if health.consecutive_failures >= self.config.failure_threshold {
            health.state = CircuitState::Open;
        }
    }

    /// Whether a call to `source_id` should be attempted.
    ///
    /// - `Closed` / `HalfOpen`: `true`
    /// - `Open`: `true` only once the cooldown has elapsed (the circuit
    ///   transitions to `HalfOpen` and one probe passes through)
    pub fn should_attempt(&self, source_id: &str) -> bool {
        let Ok(mut sources) = self.sources.lock() else {
            return true;
        };
        let health = sources.entry(source_id.to_string()).or_default();

        match health.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let cooldown_elapsed = health
                    .last_failure_at
                    .is_none_or(|t| t.elapsed().as_secs() >= self.config.cooldown_secs);

                if cooldown_elapsed {
                    health.state = CircuitState::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Current circuit state for a source.
    pub fn status(&self, source_id: &str) -> CircuitState {
        self.sources
            .lock()
            .ok()
            .and_then(|sources| sources.get(source_id).map(|h| h.state))
            .unwrap_or(CircuitState::Closed)
    }

    /// `(source_id, state, consecutive_failures)` for every tracked source.
    pub fn health_report(&self) -> Vec<(String, CircuitState, u32)> {
        self.sources
            .lock()
            .map(|sources| {
                sources
                    .iter()
                    .map(|(id, health)| (id.clone(), health.state, health.consecutive_failures))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Reset all sources to healthy.
    pub fn reset(&self) {
        if let Ok(mut sources) = self.sources.lock() {
            sources.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_breaker(threshold: u32, cooldown_secs: u64) -> CircuitBreaker {
        CircuitBreaker::new(BreakerConfig {
            failure_threshold: threshold,
            cooldown_secs,
        })
    }

    #[test]
    fn initial_state_is_closed() {
        let breaker = make_breaker(3, 60);
        assert_eq!(breaker.status("shop"), CircuitState::Closed);
        assert!(breaker.should_attempt("shop"));
    }

    #[test]
    fn stays_closed_below_threshold() {
        let breaker = make_breaker(3, 60);
        breaker.record_failure("shop");
        breaker.record_failure("shop");
        assert_eq!(breaker.status("shop"), CircuitState::Closed);
    }

    #[test]
    fn trips_to_open_at_threshold() {
        let breaker = make_breaker(3, 60);
        for _ in 0..3 {
            breaker.record_failure("shop");
        }
        assert_eq!(breaker.status("shop"), CircuitState::Open);
        assert!(!breaker.should_attempt("shop"));
    }

    #[test]
    fn open_transitions_to_half_open_after_cooldown() {
        let breaker = make_breaker(3, 0);
        for _ in 0..3 {
            breaker.record_failure("shop");
        }
        assert_eq!(breaker.status("shop"), CircuitState::Open);

        // Zero cooldown: the next attempt check opens the probe window.
        assert!(breaker.should_attempt("shop"));
        assert_eq!(breaker.status("shop"), CircuitState::HalfOpen);
    }

    #[test]
    fn half_open_success_restores_closed() {
        let breaker = make_breaker(3, 0);
        for _ in 0..3 {
            breaker.record_failure("shop");
        }
        let _ = breaker.should_attempt("shop");
        breaker.record_success("shop");
        assert_eq!(breaker.status("shop"), CircuitState::Closed);
    }

    #[test]
    fn half_open_failure_retrips() {
        let breaker = make_breaker(1, 0);
        breaker.record_failure("shop");
        let _ = breaker.should_attempt("shop");
        breaker.record_failure("shop");
        assert_eq!(breaker.status("shop"), CircuitState::Open);
    }

    #[test]
    fn success_resets_consecutive_failures() {
        let breaker = make_breaker(5, 60);
        breaker.record_failure("shop");
        breaker.record_failure("shop");
        breaker.record_success("shop");

        let report = breaker.health_report();
        let (_, state, failures) = report
            .iter()
            .find(|(id, _, _)| id == "shop")
            .expect("shop tracked");
        assert_eq!(*state, CircuitState::Closed);
        assert_eq!(*failures, 0);
    }

    #[test]
    fn sources_are_independent() {
        let breaker = make_breaker(2, 60);
        breaker.record_failure("shop");
        breaker.record_failure("shop");
        assert_eq!(breaker.status("shop"), CircuitState::Open);
        assert_eq!(breaker.status("marketplace"), CircuitState::Closed);
        assert!(breaker.should_attempt("marketplace"));
    }

    #[test]
    fn reset_clears_all_state() {
        let breaker = make_breaker(2, 60);
        breaker.record_failure("shop");
        breaker.record_failure("shop");
        breaker.reset();
        assert_eq!(breaker.status("shop"), CircuitState::Closed);
        assert!(breaker.health_report().is_empty());
    }

    #[test]
    fn alternating_outcomes_never_trip() {
        let breaker = make_breaker(3, 60);
        for _ in 0..10 {
            breaker.record_failure("shop");
            breaker.record_success("shop");
        }
        assert_eq!(breaker.status("shop"), CircuitState::Closed);
    }

    #[test]
    fn default_config_values() {
        let config = BreakerConfig::default();
        assert_eq!(config.failure_threshold, 3);
        assert_eq!(config.cooldown_secs, 60);
    }
}
