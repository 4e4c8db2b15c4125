use serde::Serialize;

use crate::counter::{Gauge, RateCounter};

/// Per-`path_id` counters, per spec §6. `underruns`/`resampler_resets` are
/// not part of the published statistics surface but are kept alongside the
/// queue gauges since they share the same lifetime and owner (the path's
/// processor loop), matching spec §7's "count" disposition for
/// `BufferUnderrun`/`ResamplerError`.
#[derive(Default)]
pub struct PathStats {
    input_queue_size: Gauge,
    output_queue_size: Gauge,
    packets_processed: RateCounter,
    underruns: Gauge,
    resampler_resets: Gauge,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct PathStatsSnapshot {
    pub input_queue_size: i64,
    pub output_queue_size: i64,
    pub packets_processed_per_second: f64,
    pub underrun_count: i64,
    pub resampler_reset_count: i64,
}

impl PathStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_input_queue_size(&self, size: usize) {
        self.input_queue_size.set(size as i64);
    }

    pub fn set_output_queue_size(&self, size: usize) {
        self.output_queue_size.set(size as i64);
    }

    pub fn record_packet_processed(&self) {
        self.packets_processed.increment();
    }

    pub fn record_underrun(&self) {
        self.underruns.set(self.underruns.get() + 1);
    }

    pub fn record_resampler_reset(&self) {
        self.resampler_resets.set(self.resampler_resets.get() + 1);
    }

    pub fn snapshot(&self) -> PathStatsSnapshot {
        PathStatsSnapshot {
            input_queue_size: self.input_queue_size.get(),
            output_queue_size: self.output_queue_size.get(),
            packets_processed_per_second: self.packets_processed.rate_per_second(),
            underrun_count: self.underruns.get(),
            resampler_reset_count: self.resampler_resets.get(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_gauges_reflect_latest_value() {
        let stats = PathStats::new();
        stats.set_input_queue_size(3);
        stats.set_output_queue_size(1);
        let snap = stats.snapshot();
        assert_eq!(snap.input_queue_size, 3);
        assert_eq!(snap.output_queue_size, 1);
    }

    #[test]
    fn underruns_accumulate() {
        let stats = PathStats::new();
        stats.record_underrun();
        stats.record_underrun();
        assert_eq!(stats.snapshot().underrun_count, 2);
    }
}
