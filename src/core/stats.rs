//! Process-wide read statistics.
//!
//! Counters are registered per endpoint. Two pollers pointing at the same
//! endpoint share the same counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use serde::Serialize;

/// Read outcome counters for one endpoint.
#[derive(Debug, Default)]
pub struct ReadStats {
    read_success: AtomicU64,
    read_error: AtomicU64,
}

/// Point-in-time copy of a `ReadStats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ReadStatsSnapshot {
    pub read_success: u64,
    pub read_error: u64,
}

impl ReadStats {
    /// Create unregistered counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a successful read cycle.
    #[inline]
    pub fn increment_read_success(&self) {
        self.read_success.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a failed read cycle.
    #[inline]
    pub fn increment_read_error(&self) {
        self.read_error.fetch_add(1, Ordering::Relaxed);
    }

    /// Current values.
    pub fn snapshot(&self) -> ReadStatsSnapshot {
        ReadStatsSnapshot {
            read_success: self.read_success.load(Ordering::Relaxed),
            read_error: self.read_error.load(Ordering::Relaxed),
        }
    }
}

static REGISTRY: Lazy<DashMap<String, Arc<ReadStats>>> = Lazy::new(DashMap::new);

/// Get or create the counters for an endpoint.
pub fn register(endpoint: &str) -> Arc<ReadStats> {
    REGISTRY
        .entry(endpoint.to_string())
        .or_insert_with(|| Arc::new(ReadStats::new()))
        .clone()
}

/// Snapshot of all registered endpoints.
pub fn snapshot_all() -> Vec<(String, ReadStatsSnapshot)> {
    let mut all: Vec<_> = REGISTRY
        .iter()
        .map(|e| (e.key().clone(), e.value().snapshot()))
        .collect();
    all.sort_by(|a, b| a.0.cmp(&b.0));
    all
}
