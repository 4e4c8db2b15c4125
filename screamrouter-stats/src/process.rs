use serde::Serialize;

use crate::counter::RateCounter;

/// Process-wide counters, per spec §6 "per process" statistics.
#[derive(Default)]
pub struct ProcessStats {
    packets_added_to_timeshift: RateCounter,
}

/// Snapshot of [`ProcessStats`] plus the one figure it cannot track itself:
/// the live sum of every timeshift buffer's occupancy, which only
/// `screamrouter-timeshift`'s registry can answer.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ProcessStatsSnapshot {
    pub packets_added_to_timeshift_per_second: f64,
    pub timeshift_buffer_total_size: usize,
}

impl ProcessStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_packet_added(&self) {
        self.packets_added_to_timeshift.increment();
    }

    pub fn snapshot(&self, timeshift_buffer_total_size: usize) -> ProcessStatsSnapshot {
        ProcessStatsSnapshot {
            packets_added_to_timeshift_per_second: self.packets_added_to_timeshift.rate_per_second(),
            timeshift_buffer_total_size,
        }
    }
}
