use serde::Serialize;

use crate::counter::{Gauge, RateCounter};

/// Per-sink counters, per spec §6. `send_errors` mirrors spec §7's
/// `SinkSendError` disposition ("log once per N seconds, count, continue").
#[derive(Default)]
pub struct SinkStats {
    active_input_streams: Gauge,
    total_input_streams: Gauge,
    packets_mixed: RateCounter,
    send_errors: Gauge,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct SinkStatsSnapshot {
    pub active_input_streams: i64,
    pub total_input_streams: i64,
    pub packets_mixed_per_second: f64,
    pub send_error_count: i64,
}

impl SinkStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_active_input_streams(&self, count: usize) {
        self.active_input_streams.set(count as i64);
    }

    pub fn set_total_input_streams(&self, count: usize) {
        self.total_input_streams.set(count as i64);
    }

    pub fn record_packet_mixed(&self) {
        self.packets_mixed.increment();
    }

    pub fn record_send_error(&self) {
        self.send_errors.set(self.send_errors.get() + 1);
    }

    pub fn snapshot(&self) -> SinkStatsSnapshot {
        SinkStatsSnapshot {
            active_input_streams: self.active_input_streams.get(),
            total_input_streams: self.total_input_streams.get(),
            packets_mixed_per_second: self.packets_mixed.rate_per_second(),
            send_error_count: self.send_errors.get(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_streams_tracked_independently_of_total() {
        let stats = SinkStats::new();
        stats.set_total_input_streams(5);
        stats.set_active_input_streams(2);
        let snap = stats.snapshot();
        assert_eq!(snap.total_input_streams, 5);
        assert_eq!(snap.active_input_streams, 2);
    }
}
