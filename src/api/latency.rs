//! In-memory latency histogram for stats computation.
//! Records the time spent aggregating one stats request (after the store read).

use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;

/// Shared latency stats. Stats handlers record, /stats/latency reads.
/// Values stored in microseconds.
pub struct LatencyStats {
    inner: Mutex<hdrhistogram::Histogram<u64>>,
}

#[derive(Debug, Serialize)]
pub struct LatencyReport {
    pub samples: u64,
    pub p50_us: Option<u64>,
    pub p95_us: Option<u64>,
    pub p99_us: Option<u64>,
}

impl LatencyStats {
    /// Create a new histogram. Tracks 1us to 100s, 3 significant figures.
    pub fn new() -> Self {
        let histogram = hdrhistogram::Histogram::new_with_bounds(1, 100_000_000, 3)
            .expect("valid histogram bounds");
        Self {
            inner: Mutex::new(histogram),
        }
    }

    /// Record from a std::time::Duration. Sub-microsecond runs count as 1us.
    pub fn record(&self, d: Duration) {
        let us = d.as_micros().clamp(1, u128::from(u64::MAX)) as u64;
        if let Ok(mut h) = self.inner.lock() {
            let _ = h.record(us);
        }
    }

    pub fn report(&self) -> LatencyReport {
        let Ok(h) = self.inner.lock() else {
            return LatencyReport { samples: 0, p50_us: None, p95_us: None, p99_us: None };
        };
        if h.len() == 0 {
            return LatencyReport { samples: 0, p50_us: None, p95_us: None, p99_us: None };
        }
        LatencyReport {
            samples: h.len(),
            p50_us: Some(h.value_at_quantile(0.5)),
            p95_us: Some(h.value_at_quantile(0.95)),
            p99_us: Some(h.value_at_quantile(0.99)),
        }
    }
}

impl Default for LatencyStats {
    fn default() -> Self {
        Self::new()
    }
}
