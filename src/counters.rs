//! Ingest counters.
//!
//! Tracks how many messages and batches have passed through the agent
//! since start-up. Counters are lock-free so handlers can update them
//! without holding the controller lock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Running ingest counters.
#[derive(Debug)]
pub struct IngestCounters {
    /// Number of vibration messages accepted
    vibration_messages: AtomicU64,
    /// Number of temperature messages accepted
    temperature_messages: AtomicU64,
    /// Number of batches handed to the consumer
    batches_dispatched: AtomicU64,
    /// Number of messages that failed
    rejected_messages: AtomicU64,
    /// Start time
    started_at: DateTime<Utc>,
}

impl IngestCounters {
    pub fn new() -> Self {
        Self {
            vibration_messages: AtomicU64::new(0),
            temperature_messages: AtomicU64::new(0),
            batches_dispatched: AtomicU64::new(0),
            rejected_messages: AtomicU64::new(0),
            started_at: Utc::now(),
        }
    }

    /// Record an accepted vibration message and the batches it dispatched.
    pub fn record_vibration(&self, batches: usize) {
        self.vibration_messages.fetch_add(1, Ordering::Relaxed);
        self.batches_dispatched
            .fetch_add(batches as u64, Ordering::Relaxed);
    }

    /// Record an accepted temperature message and the batches it dispatched.
    pub fn record_temperature(&self, batches: usize) {
        self.temperature_messages.fetch_add(1, Ordering::Relaxed);
        self.batches_dispatched
            .fetch_add(batches as u64, Ordering::Relaxed);
    }

    /// Record a message that failed validation or processing.
    pub fn record_rejected(&self) {
        self.rejected_messages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> IngestStats {
        IngestStats {
            vibration_messages: self.vibration_messages.load(Ordering::Relaxed),
            temperature_messages: self.temperature_messages.load(Ordering::Relaxed),
            batches_dispatched: self.batches_dispatched.load(Ordering::Relaxed),
            rejected_messages: self.rejected_messages.load(Ordering::Relaxed),
            started_at: self.started_at,
            uptime_secs: (Utc::now() - self.started_at).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.snapshot();
        format!(
            "Ingest Statistics:\n\
             - Vibration messages: {}\n\
             - Temperature messages: {}\n\
             - Batches dispatched: {}\n\
             - Rejected messages: {}\n\
             - Uptime: {} seconds",
            stats.vibration_messages,
            stats.temperature_messages,
            stats.batches_dispatched,
            stats.rejected_messages,
            stats.uptime_secs
        )
    }
}

impl Default for IngestCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestStats {
    pub vibration_messages: u64,
    pub temperature_messages: u64,
    pub batches_dispatched: u64,
    pub rejected_messages: u64,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: u64,
}

/// Thread-safe shared counters.
pub type SharedCounters = Arc<IngestCounters>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counting() {
        let counters = IngestCounters::new();

        counters.record_vibration(0);
        counters.record_temperature(2);
        counters.record_rejected();

        let stats = counters.snapshot();
        assert_eq!(stats.vibration_messages, 1);
        assert_eq!(stats.temperature_messages, 1);
        assert_eq!(stats.batches_dispatched, 2);
        assert_eq!(stats.rejected_messages, 1);
    }

    #[test]
    fn test_summary_format() {
        let summary = IngestCounters::new().summary();
        assert!(summary.contains("Vibration messages"));
        assert!(summary.contains("Batches dispatched"));
    }
}
