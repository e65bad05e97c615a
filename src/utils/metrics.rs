//! Observability counters for sign-in attempts.
//!
//! Uses atomic counters so a `Metrics` can be shared between a client and
//! whatever reports on it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Counters for connection and login activity
#[derive(Debug)]
pub struct Metrics {
    /// Transport opens attempted
    pub connect_attempts: AtomicU64,
    /// Transport opens that failed with an error
    pub connect_failures: AtomicU64,
    /// Transport opens that hit the connect timeout
    pub connect_timeouts: AtomicU64,
    /// Frames written
    pub frames_sent: AtomicU64,
    /// Frames received
    pub frames_received: AtomicU64,
    /// Bytes written
    pub bytes_sent: AtomicU64,
    /// Bytes received
    pub bytes_received: AtomicU64,
    /// Responses with code 0
    pub logins_accepted: AtomicU64,
    /// Responses with a nonzero code
    pub logins_rejected: AtomicU64,
    /// Inbound frames replaced by the parse-error sentinel
    pub decode_faults: AtomicU64,
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            connect_attempts: AtomicU64::new(0),
            connect_failures: AtomicU64::new(0),
            connect_timeouts: AtomicU64::new(0),
            frames_sent: AtomicU64::new(0),
            frames_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            logins_accepted: AtomicU64::new(0),
            logins_rejected: AtomicU64::new(0),
            decode_faults: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn connect_attempt(&self) {
        self.connect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connect_failed(&self) {
        self.connect_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connect_timed_out(&self) {
        self.connect_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frame_sent(&self, byte_count: u64) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn frame_received(&self, byte_count: u64) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn login_accepted(&self) {
        self.logins_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn login_rejected(&self) {
        self.logins_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decode_fault(&self) {
        self.decode_faults.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connect_attempts: self.connect_attempts.load(Ordering::Relaxed),
            connect_failures: self.connect_failures.load(Ordering::Relaxed),
            connect_timeouts: self.connect_timeouts.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            logins_accepted: self.logins_accepted.load(Ordering::Relaxed),
            logins_rejected: self.logins_rejected.load(Ordering::Relaxed),
            decode_faults: self.decode_faults.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            connect_attempts = snapshot.connect_attempts,
            connect_failures = snapshot.connect_failures,
            connect_timeouts = snapshot.connect_timeouts,
            frames_sent = snapshot.frames_sent,
            frames_received = snapshot.frames_received,
            bytes_sent = snapshot.bytes_sent,
            bytes_received = snapshot.bytes_received,
            logins_accepted = snapshot.logins_accepted,
            logins_rejected = snapshot.logins_rejected,
            decode_faults = snapshot.decode_faults,
            uptime_seconds = snapshot.uptime_seconds,
            "Sign-in metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub connect_attempts: u64,
    pub connect_failures: u64,
    pub connect_timeouts: u64,
    pub frames_sent: u64,
    pub frames_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub logins_accepted: u64,
    pub logins_rejected: u64,
    pub decode_faults: u64,
    pub uptime_seconds: u64,
}

/// Logs how long an operation took when dropped
pub struct Timer {
    start: Instant,
    operation: &'static str,
}

impl Timer {
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        debug!(
            operation = self.operation,
            duration_ms = duration.as_millis(),
            "Operation completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = Metrics::new();
        metrics.connect_attempt();
        metrics.frame_sent(10);
        metrics.frame_sent(5);
        metrics.login_rejected();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.connect_attempts, 1);
        assert_eq!(snapshot.frames_sent, 2);
        assert_eq!(snapshot.bytes_sent, 15);
        assert_eq!(snapshot.logins_rejected, 1);
        assert_eq!(snapshot.logins_accepted, 0);
    }
}
