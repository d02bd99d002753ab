//! Transfer metrics for tuner sessions.
//!
//! The manager owns one sink and records every delivered chunk against it;
//! callers hold a shared handle for reporting. Counters are advisory
//! telemetry: relaxed atomics, tolerant of benign races, never consulted for
//! control flow.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::info;

/// Cumulative transfer counters across all sessions of one manager.
pub struct TunerMetrics {
    /// Manager start time, for rate computation.
    start_time: Instant,
    /// TS bytes fetched from drivers.
    bytes_fetched: AtomicU64,
    /// Chunks delivered to callers.
    chunks_delivered: AtomicU64,
    /// Reads that timed out with no data.
    empty_reads: AtomicU64,
    /// Reads the driver failed.
    driver_errors: AtomicU64,
    /// Sessions created.
    sessions_created: AtomicU64,
    /// Sessions finalized.
    sessions_finalized: AtomicU64,
}

impl TunerMetrics {
    /// Create a new shared metrics sink.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Record a delivered chunk of `bytes`.
    pub fn record_chunk(&self, bytes: u64) {
        self.bytes_fetched.fetch_add(bytes, Ordering::Relaxed);
        self.chunks_delivered.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a read that returned no data within its timeout.
    pub fn record_empty_read(&self) {
        self.empty_reads.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a driver-reported read failure.
    pub fn record_driver_error(&self) {
        self.driver_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a session creation.
    pub fn record_session_created(&self) {
        self.sessions_created.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a session finalization.
    pub fn record_session_finalized(&self) {
        self.sessions_finalized.fetch_add(1, Ordering::Relaxed);
    }

    /// Total TS bytes fetched from drivers.
    pub fn bytes_fetched(&self) -> u64 {
        self.bytes_fetched.load(Ordering::Relaxed)
    }

    /// Total chunks delivered.
    pub fn chunks_delivered(&self) -> u64 {
        self.chunks_delivered.load(Ordering::Relaxed)
    }

    /// Total empty reads.
    pub fn empty_reads(&self) -> u64 {
        self.empty_reads.load(Ordering::Relaxed)
    }

    /// Total driver read failures.
    pub fn driver_errors(&self) -> u64 {
        self.driver_errors.load(Ordering::Relaxed)
    }

    /// Total sessions created.
    pub fn sessions_created(&self) -> u64 {
        self.sessions_created.load(Ordering::Relaxed)
    }

    /// Total sessions finalized.
    pub fn sessions_finalized(&self) -> u64 {
        self.sessions_finalized.load(Ordering::Relaxed)
    }

    /// Time since the sink was created.
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Fetch rate in bytes per second since creation.
    pub fn fetch_rate_bytes_per_sec(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed < 0.01 {
            return 0.0;
        }
        self.bytes_fetched() as f64 / elapsed
    }

    /// Log a human-readable report.
    pub fn print_report(&self) {
        info!(
            "[Tuner] Metrics: uptime={:.1}s, bytes={}, rate={:.2} MB/s, chunks={}, \
             empty_reads={}, driver_errors={}, sessions={} (finalized={})",
            self.uptime().as_secs_f64(),
            self.bytes_fetched(),
            self.fetch_rate_bytes_per_sec() / 1_000_000.0,
            self.chunks_delivered(),
            self.empty_reads(),
            self.driver_errors(),
            self.sessions_created(),
            self.sessions_finalized()
        );
    }
}

impl Default for TunerMetrics {
    fn default() -> Self {
        Self {
            start_time: Instant::now(),
            bytes_fetched: AtomicU64::new(0),
            chunks_delivered: AtomicU64::new(0),
            empty_reads: AtomicU64::new(0),
            driver_errors: AtomicU64::new(0),
            sessions_created: AtomicU64::new(0),
            sessions_finalized: AtomicU64::new(0),
        }
    }
}
