//! Counters shared by the handler registry and the decoder.
//!
//! A dispatch miss is a decoded event with no handler; it is derived as
//! `dispatch_calls - dispatch_hits` rather than counted separately.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Metrics and capacity tracking for a registry.
#[derive(Debug)]
pub struct RegistryMetrics {
    /// Number of items currently registered.
    pub registered_count: AtomicUsize,
    /// Total number of dispatch lookups.
    pub dispatch_calls: AtomicU64,
    /// Lookups that found a handler.
    pub dispatch_hits: AtomicU64,
    /// Logs that did not decode (unknown topic or ABI mismatch).
    pub decode_misses: AtomicU64,
    /// Maximum capacity of the registry (0 = unlimited).
    pub capacity_limit: usize,
    /// Name of the registry for logging.
    pub name: &'static str,
}

impl RegistryMetrics {
    /// `capacity_limit` of 0 means unbounded.
    #[must_use]
    pub fn new(name: &'static str, capacity_limit: usize) -> Self {
        Self {
            registered_count: AtomicUsize::new(0),
            dispatch_calls: AtomicU64::new(0),
            dispatch_hits: AtomicU64::new(0),
            decode_misses: AtomicU64::new(0),
            capacity_limit,
            name,
        }
    }

    /// Returns `true` if the registry enforces a limit and adding one more item would exceed it.
    #[must_use]
    pub fn is_full(&self) -> bool {
        if self.capacity_limit == 0 {
            return false;
        }
        self.registered_count.load(Ordering::Relaxed) >= self.capacity_limit
    }

    pub fn inc_registered(&self) {
        self.registered_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_calls(&self) {
        self.dispatch_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_hits(&self) {
        self.dispatch_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_decode_misses(&self) {
        self.decode_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Lookups that found no handler.
    #[must_use]
    pub fn dispatch_misses(&self) -> u64 {
        self.dispatch_calls
            .load(Ordering::Relaxed)
            .saturating_sub(self.dispatch_hits.load(Ordering::Relaxed))
    }

    /// Logs a snapshot of the counters.
    pub fn report(&self) {
        crate::utils::logging::log_registry(
            self.name,
            self.registered_count.load(Ordering::Relaxed),
            self.capacity_limit,
            self.dispatch_calls.load(Ordering::Relaxed),
            self.dispatch_misses(),
            self.decode_misses.load(Ordering::Relaxed),
        );
    }
}
