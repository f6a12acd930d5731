//! Shared health state for the /health endpoint.
//! Updated by the bet and stats handlers.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Shared counters. Updated by handlers, read by /health.
#[derive(Default)]
pub struct HealthState {
    /// Bets created since startup.
    pub bets_created: AtomicU64,
    /// Stats aggregations served since startup.
    pub stats_computed: AtomicU64,
    /// Bet records skipped as corrupt across all aggregations.
    pub corrupt_records_skipped: AtomicU64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: &'static str,
    pub backend: &'static str,
    pub bets_created: u64,
    pub stats_computed: u64,
    pub corrupt_records_skipped: u64,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_bets_created(&self) {
        self.bets_created.fetch_add(1, Ordering::Relaxed);
    }

    /// One aggregation finished, having skipped `skipped` corrupt records.
    pub fn record_stats(&self, skipped: usize) {
        self.stats_computed.fetch_add(1, Ordering::Relaxed);
        self.corrupt_records_skipped
            .fetch_add(skipped as u64, Ordering::Relaxed);
    }

    pub fn report(&self, backend: &'static str) -> HealthReport {
        HealthReport {
            status: "ok",
            backend,
            bets_created: self.bets_created.load(Ordering::Relaxed),
            stats_computed: self.stats_computed.load(Ordering::Relaxed),
            corrupt_records_skipped: self.corrupt_records_skipped.load(Ordering::Relaxed),
        }
    }
}
