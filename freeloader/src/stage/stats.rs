//! Per-stage counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters describing what a stage did with the items and signals it saw.
#[derive(Debug, Default)]
pub struct StageStats {
    /// Items handed to the handler.
    accepted: AtomicU64,
    /// Items dropped because the stage was not running.
    dropped: AtomicU64,
    /// Items whose handler returned an error.
    failed: AtomicU64,
    /// Pause signals received from consumers.
    pauses_received: AtomicU64,
}

impl StageStats {
    /// Records an accepted item.
    pub fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a dropped item.
    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a handler failure.
    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a pause received from downstream.
    pub fn record_pause(&self) {
        self.pauses_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of accepted items.
    #[must_use]
    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    /// Returns the number of dropped items.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Returns the number of failed items.
    #[must_use]
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Returns the number of pause signals received.
    #[must_use]
    pub fn pauses_received(&self) -> u64 {
        self.pauses_received.load(Ordering::Relaxed)
    }

    /// Returns the share of submitted items that were dropped, in percent.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn drop_rate(&self) -> f64 {
        let accepted = self.accepted();
        let dropped = self.dropped();
        let total = accepted + dropped;
        if total == 0 {
            0.0
        } else {
            (dropped as f64 / total as f64) * 100.0
        }
    }

    /// Converts the counters to a dictionary.
    #[must_use]
    pub fn to_dict(&self) -> serde_json::Value {
        serde_json::json!({
            "accepted": self.accepted(),
            "dropped": self.dropped(),
            "failed": self.failed(),
            "pauses_received": self.pauses_received(),
            "drop_rate_percent": (self.drop_rate() * 100.0).round() / 100.0
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_default() {
        let stats = StageStats::default();
        assert_eq!(stats.accepted(), 0);
        assert_eq!(stats.dropped(), 0);
        assert_eq!(stats.drop_rate(), 0.0);
    }

    #[test]
    fn test_stats_recording() {
        let stats = StageStats::default();
        stats.record_accepted();
        stats.record_accepted();
        stats.record_dropped();
        stats.record_failed();
        stats.record_pause();

        assert_eq!(stats.accepted(), 2);
        assert_eq!(stats.dropped(), 1);
        assert_eq!(stats.failed(), 1);
        assert_eq!(stats.pauses_received(), 1);
        assert!((stats.drop_rate() - 33.333).abs() < 1.0);
    }

    #[test]
    fn test_stats_to_dict() {
        let stats = StageStats::default();
        stats.record_accepted();

        let dict = stats.to_dict();
        assert_eq!(dict["accepted"], 1);
        assert_eq!(dict["dropped"], 0);
    }
}
