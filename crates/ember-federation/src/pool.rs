//! Per-destination connection pool state and circuit breaker.
//!
//! `reqwest::Client` already maintains its own HTTP connection pool; what's
//! modelled here is the *per-destination* availability state layered on top
//! of it: whether DNS/TLS has been pre-warmed (`prelink`), and whether the
//! destination is currently `errant` (failing fast) after repeated failures.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use ember_common::config::FederationConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkState {
    /// DNS/TLS not yet warmed.
    Unlinked,
    /// `prelink` has resolved and connected; ordinary requests may reuse it.
    Linked,
}

#[derive(Debug, Clone)]
struct DestinationState {
    link: LinkState,
    consecutive_failures: u32,
    errant_until: Option<Instant>,
}

impl Default for DestinationState {
    fn default() -> Self {
        Self { link: LinkState::Unlinked, consecutive_failures: 0, errant_until: None }
    }
}

/// Tracks connection-pool and circuit-breaker state per destination server.
pub struct ConnectionPool {
    destinations: RwLock<HashMap<String, DestinationState>>,
    break_threshold: u32,
    break_ttl: Duration,
}

impl ConnectionPool {
    pub fn new(config: &FederationConfig) -> Self {
        Self {
            destinations: RwLock::new(HashMap::new()),
            break_threshold: config.circuit_break_threshold,
            break_ttl: Duration::from_secs(config.circuit_break_ttl_secs),
        }
    }

    /// Mark a destination as pre-warmed (DNS resolved, connection primed).
    /// The actual warm-up I/O is the caller's responsibility; this just
    /// records that it happened.
    pub fn prelink(&self, destination: &str) {
        self.destinations.write().entry(destination.to_owned()).or_default().link = LinkState::Linked;
    }

    /// Whether `destination` has ever been seen by this pool.
    pub fn exists(&self, destination: &str) -> bool {
        self.destinations.read().contains_key(destination)
    }

    /// Whether `destination` has a pre-warmed connection.
    pub fn linked(&self, destination: &str) -> bool {
        matches!(self.destinations.read().get(destination).map(|d| d.link), Some(LinkState::Linked))
    }

    /// Whether `destination` is currently tripped (failing fast).
    pub fn errant(&self, destination: &str) -> bool {
        match self.destinations.read().get(destination).and_then(|d| d.errant_until) {
            Some(until) => Instant::now() < until,
            None => false,
        }
    }

    /// Whether `destination` may currently be used — the inverse of
    /// `errant`, exposed separately because "available" is the predicate
    /// call sites actually branch on.
    pub fn avail(&self, destination: &str) -> bool {
        !self.errant(destination)
    }

    /// Record a successful call: clears the failure counter and any trip.
    pub fn record_success(&self, destination: &str) {
        let mut destinations = self.destinations.write();
        let state = destinations.entry(destination.to_owned()).or_default();
        state.consecutive_failures = 0;
        state.errant_until = None;
    }

    /// Record a failed call. Trips the circuit once `circuit_break_threshold`
    /// consecutive failures accumulate.
    pub fn record_failure(&self, destination: &str) {
        let mut destinations = self.destinations.write();
        let state = destinations.entry(destination.to_owned()).or_default();
        state.consecutive_failures += 1;
        if state.consecutive_failures >= self.break_threshold {
            state.errant_until = Some(Instant::now() + self.break_ttl);
        }
    }

    /// Manually clear a trip before its TTL expires.
    pub fn clear_errant(&self, destination: &str) {
        if let Some(state) = self.destinations.write().get_mut(destination) {
            state.consecutive_failures = 0;
            state.errant_until = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> FederationConfig {
        FederationConfig {
            request_timeout_secs: 30,
            max_retry_attempts: 8,
            retry_base_secs: 2,
            retry_cap_secs: 60,
            circuit_break_threshold: 3,
            circuit_break_ttl_secs: 60,
        }
    }

    #[test]
    fn prelink_marks_linked_and_existing() {
        let pool = ConnectionPool::new(&config());
        assert!(!pool.exists("a.example"));
        pool.prelink("a.example");
        assert!(pool.exists("a.example"));
        assert!(pool.linked("a.example"));
    }

    #[test]
    fn repeated_failures_trip_the_circuit() {
        let pool = ConnectionPool::new(&config());
        assert!(pool.avail("a.example"));
        pool.record_failure("a.example");
        pool.record_failure("a.example");
        assert!(pool.avail("a.example"));
        pool.record_failure("a.example");
        assert!(!pool.avail("a.example"));
        assert!(pool.errant("a.example"));
    }

    #[test]
    fn success_clears_failure_count() {
        let pool = ConnectionPool::new(&config());
        pool.record_failure("a.example");
        pool.record_failure("a.example");
        pool.record_success("a.example");
        pool.record_failure("a.example");
        pool.record_failure("a.example");
        assert!(pool.avail("a.example"));
    }

    #[test]
    fn clear_errant_reopens_immediately() {
        let pool = ConnectionPool::new(&config());
        for _ in 0..3 {
            pool.record_failure("a.example");
        }
        assert!(!pool.avail("a.example"));
        pool.clear_errant("a.example");
        assert!(pool.avail("a.example"));
    }
}
