//! Rescoring statistics

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collector shared by rescoring engines
pub struct RescoreMetrics {
    /// Requests that produced a rescored window
    rescored_requests: AtomicU64,
    /// Requests that failed
    failed_requests: AtomicU64,
    /// Candidates whose score was recomputed
    candidates_rescored: AtomicU64,
    /// Failures by error kind
    failures_by_kind: RwLock<HashMap<&'static str, u64>>,
    /// Request latencies (in microseconds)
    latencies: RwLock<Vec<u64>>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl RescoreMetrics {
    pub fn new() -> Self {
        Self {
            rescored_requests: AtomicU64::new(0),
            failed_requests: AtomicU64::new(0),
            candidates_rescored: AtomicU64::new(0),
            failures_by_kind: RwLock::new(HashMap::new()),
            latencies: RwLock::new(Vec::with_capacity(1000)),
            start_time: Instant::now(),
        }
    }

    /// Record a successful request
    pub fn record_request(&self, elapsed: Duration, candidates: usize) {
        self.rescored_requests.fetch_add(1, Ordering::Relaxed);
        self.candidates_rescored
            .fetch_add(candidates as u64, Ordering::Relaxed);

        if let Ok(mut latencies) = self.latencies.write() {
            latencies.push(elapsed.as_micros() as u64);
            // Keep only the most recent samples
            if latencies.len() > 10000 {
                latencies.drain(0..5000);
            }
        }
    }

    /// Record a failed request
    pub fn record_failure(&self, kind: &'static str) {
        self.failed_requests.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut by_kind) = self.failures_by_kind.write() {
            *by_kind.entry(kind).or_insert(0) += 1;
        }
    }

    pub fn rescored_requests(&self) -> u64 {
        self.rescored_requests.load(Ordering::Relaxed)
    }

    pub fn failed_requests(&self) -> u64 {
        self.failed_requests.load(Ordering::Relaxed)
    }

    pub fn candidates_rescored(&self) -> u64 {
        self.candidates_rescored.load(Ordering::Relaxed)
    }

    pub fn failures_by_kind(&self) -> HashMap<&'static str, u64> {
        self.failures_by_kind
            .read()
            .map(|by_kind| by_kind.clone())
            .unwrap_or_default()
    }

    /// Latency statistics over the retained samples
    pub fn latency_stats(&self) -> LatencyStats {
        let mut sorted = self
            .latencies
            .read()
            .map(|latencies| latencies.clone())
            .unwrap_or_default();
        if sorted.is_empty() {
            return LatencyStats::default();
        }
        sorted.sort_unstable();

        let count = sorted.len();
        let percentile = |p: f64| sorted[((count as f64 * p) as usize).min(count - 1)];

        LatencyStats {
            count: count as u64,
            mean_us: sorted.iter().sum::<u64>() / count as u64,
            p50_us: percentile(0.50),
            p95_us: percentile(0.95),
            p99_us: percentile(0.99),
            max_us: sorted[count - 1],
        }
    }

    /// Requests per second since creation
    pub fn throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            (self.rescored_requests() + self.failed_requests()) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Log summary statistics
    pub fn print_summary(&self) {
        let latency = self.latency_stats();

        info!(
            rescored_requests = self.rescored_requests(),
            failed_requests = self.failed_requests(),
            candidates_rescored = self.candidates_rescored(),
            throughput = format!("{:.1} req/s", self.throughput()),
            "Rescoring summary"
        );
        info!(
            mean_us = latency.mean_us,
            p50_us = latency.p50_us,
            p95_us = latency.p95_us,
            p99_us = latency.p99_us,
            max_us = latency.max_us,
            "Rescoring latency"
        );
        for (kind, count) in self.failures_by_kind() {
            info!(kind, count, "Rescoring failures");
        }
    }
}

impl Default for RescoreMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Request latency statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LatencyStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}
