use serde::Serialize;

use crate::counter::RateCounter;

/// Per-`source_tag` counters, per spec §6. `jitter_estimate_ms` and
/// `timeshift_buffer_size` live on the tag's `TimeshiftBuffer` itself; this
/// type only tracks arrival rate, which belongs to the receiver side.
#[derive(Default)]
pub struct TagStats {
    packets_received: RateCounter,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct TagStatsSnapshot {
    pub jitter_estimate_ms: f64,
    pub packets_per_second: f64,
    pub timeshift_buffer_size: usize,
}

impl TagStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_packet(&self) {
        self.packets_received.increment();
    }

    pub fn packets_received(&self) -> u64 {
        self.packets_received.total()
    }

    pub fn snapshot(&self, jitter_estimate_ms: f64, timeshift_buffer_size: usize) -> TagStatsSnapshot {
        TagStatsSnapshot {
            jitter_estimate_ms,
            packets_per_second: self.packets_received.rate_per_second(),
            timeshift_buffer_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reports_supplied_buffer_state() {
        let stats = TagStats::new();
        stats.record_packet();
        let snap = stats.snapshot(1.5, 42);
        assert_eq!(snap.jitter_estimate_ms, 1.5);
        assert_eq!(snap.timeshift_buffer_size, 42);
    }
}
