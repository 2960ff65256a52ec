//! Metrics collection for proxy sessions.
//!
//! Tracks packet and synthetic-action counters across the link and the
//! predictors. Counters are atomic so every component shares one instance
//! without locking; `snapshot()` produces a serializable view for logging.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Shared session counters.
#[derive(Debug)]
pub struct SessionMetrics {
    /// Frames observed on the link (both directions).
    packets_observed: AtomicU64,
    /// Packets written to the server through the link.
    packets_sent: AtomicU64,
    /// Synthetic action events emitted by predictors.
    synthetics_emitted: AtomicU64,
    /// Synthetic ticks suppressed by the human-control gate.
    synthetics_suppressed: AtomicU64,
    /// Session restarts after disconnects.
    reconnects: AtomicU32,
    /// When the session started.
    started: Instant,
}

impl Default for SessionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionMetrics {
    /// Create a fresh counter set.
    pub fn new() -> Self {
        Self {
            packets_observed: AtomicU64::new(0),
            packets_sent: AtomicU64::new(0),
            synthetics_emitted: AtomicU64::new(0),
            synthetics_suppressed: AtomicU64::new(0),
            reconnects: AtomicU32::new(0),
            started: Instant::now(),
        }
    }

    /// Record an observed frame.
    pub fn record_observed(&self) {
        self.packets_observed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a packet written to the server.
    pub fn record_sent(&self) {
        self.packets_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an emitted synthetic action event.
    pub fn record_synthetic(&self) {
        self.synthetics_emitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a synthetic tick suppressed because a human was attached.
    pub fn record_suppressed(&self) {
        self.synthetics_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a session restart.
    pub fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    /// Produce a point-in-time view of the counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            packets_observed: self.packets_observed.load(Ordering::Relaxed),
            packets_sent: self.packets_sent.load(Ordering::Relaxed),
            synthetics_emitted: self.synthetics_emitted.load(Ordering::Relaxed),
            synthetics_suppressed: self.synthetics_suppressed.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            uptime_ms: self.started.elapsed().as_millis() as u64,
        }
    }

    /// Session duration so far.
    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Point-in-time view of [`SessionMetrics`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub packets_observed: u64,
    pub packets_sent: u64,
    pub synthetics_emitted: u64,
    pub synthetics_suppressed: u64,
    pub reconnects: u32,
    pub uptime_ms: u64,
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "observed={} sent={} synthetic={} suppressed={} reconnects={} uptime={}s",
            self.packets_observed,
            self.packets_sent,
            self.synthetics_emitted,
            self.synthetics_suppressed,
            self.reconnects,
            self.uptime_ms / 1000
        )
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_start_at_zero() {
        let snapshot = SessionMetrics::new().snapshot();

        assert_eq!(snapshot.packets_observed, 0);
        assert_eq!(snapshot.packets_sent, 0);
        assert_eq!(snapshot.synthetics_emitted, 0);
        assert_eq!(snapshot.synthetics_suppressed, 0);
        assert_eq!(snapshot.reconnects, 0);
    }

    #[test]
    fn counters_accumulate() {
        let metrics = SessionMetrics::new();

        metrics.record_observed();
        metrics.record_observed();
        metrics.record_sent();
        metrics.record_synthetic();
        metrics.record_suppressed();
        metrics.record_reconnect();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.packets_observed, 2);
        assert_eq!(snapshot.packets_sent, 1);
        assert_eq!(snapshot.synthetics_emitted, 1);
        assert_eq!(snapshot.synthetics_suppressed, 1);
        assert_eq!(snapshot.reconnects, 1);
    }

    #[test]
    fn snapshot_serializes() {
        let metrics = SessionMetrics::new();
        metrics.record_sent();

        let json = serde_json::to_string(&metrics.snapshot()).unwrap();
        let restored: MetricsSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.packets_sent, 1);
    }

    #[test]
    fn display_is_compact() {
        let text = SessionMetrics::new().snapshot().to_string();
        assert!(text.starts_with("observed=0"));
        assert!(text.contains("reconnects=0"));
    }
}
