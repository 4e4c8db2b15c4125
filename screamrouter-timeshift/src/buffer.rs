use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::packet::TimeshiftPacket;

/// Highest plausible packet rate the ring must absorb: 48 kHz stereo
/// 32-bit PCM at 1152 bytes/packet, per spec §4.3.
const MAX_PLAUSIBLE_PACKETS_PER_SEC: f64 = 343.0;

/// Default rolling history window.
pub const DEFAULT_MAX_HISTORY_SECONDS: f64 = 300.0;

fn capacity_for(max_history_seconds: f64) -> usize {
    ((max_history_seconds * MAX_PLAUSIBLE_PACKETS_PER_SEC).ceil() as usize).max(1)
}

/// A per-`source_tag` bounded ring of recent packets. Single writer (the
/// receiver thread demuxing that tag), many readers (every source-path
/// consuming the tag). The lock is held only long enough to mutate the
/// `VecDeque` or copy a packet out — never across I/O.
pub struct TimeshiftBuffer {
    ring: Mutex<VecDeque<TimeshiftPacket>>,
    capacity: usize,
    jitter: Mutex<JitterEstimator>,
}

impl TimeshiftBuffer {
    pub fn new(max_history_seconds: f64) -> Self {
        Self {
            ring: Mutex::new(VecDeque::with_capacity(capacity_for(max_history_seconds))),
            capacity: capacity_for(max_history_seconds),
            jitter: Mutex::new(JitterEstimator::new()),
        }
    }

    /// Appends a packet, evicting the oldest entry on overflow (newest-wins
    /// eviction per spec §4.2 backpressure policy). O(1).
    pub fn append(&self, pkt: TimeshiftPacket) {
        self.jitter.lock().observe(pkt.capture_monotonic_ns);
        let mut ring = self.ring.lock();
        if ring.len() >= self.capacity {
            ring.pop_front();
        }
        ring.push_back(pkt);
    }

    /// Returns the packet whose `capture_monotonic_ns` is the greatest
    /// value `<= now_ns - offset_ns`, or `None` if no such packet exists
    /// (offset too far in the past, or the ring is empty/too young).
    pub fn read_at(&self, now_ns: u64, offset_ns: u64) -> Option<TimeshiftPacket> {
        let target = now_ns.checked_sub(offset_ns)?;
        let ring = self.ring.lock();
        ring.iter()
            .rev()
            .find(|pkt| pkt.capture_monotonic_ns <= target)
            .cloned()
    }

    /// Rolling EWMA of inter-arrival deviation from nominal cadence, in
    /// milliseconds.
    pub fn jitter_estimate_ms(&self) -> f64 {
        self.jitter.lock().estimate_ms()
    }

    /// Returns, oldest first, every packet with `capture_monotonic_ns`
    /// strictly greater than `after_ns` (or every packet currently held, if
    /// `after_ns` is `None`), capped at `limit` entries. Used by source-path
    /// processors to drain a tag sequentially rather than at a single
    /// timeshift offset.
    pub fn packets_since(&self, after_ns: Option<u64>, limit: usize) -> Vec<TimeshiftPacket> {
        let ring = self.ring.lock();
        ring.iter()
            .filter(|pkt| match after_ns {
                Some(after) => pkt.capture_monotonic_ns > after,
                None => true,
            })
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.ring.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TimeshiftBuffer {
    fn default() -> Self {
        TimeshiftBuffer::new(DEFAULT_MAX_HISTORY_SECONDS)
    }
}

/// EWMA of the absolute deviation between successive inter-arrival gaps,
/// seeded with the first observed gap so the estimate starts at zero
/// deviation rather than a spurious spike.
struct JitterEstimator {
    last_arrival_ns: Option<u64>,
    last_gap_ns: Option<u64>,
    ewma_deviation_ns: f64,
}

const EWMA_ALPHA: f64 = 0.1;

impl JitterEstimator {
    fn new() -> Self {
        Self {
            last_arrival_ns: None,
            last_gap_ns: None,
            ewma_deviation_ns: 0.0,
        }
    }

    fn observe(&mut self, arrival_ns: u64) {
        if let Some(last) = self.last_arrival_ns {
            let gap = arrival_ns.saturating_sub(last);
            if let Some(prev_gap) = self.last_gap_ns {
                let deviation = gap.abs_diff(prev_gap) as f64;
                self.ewma_deviation_ns =
                    EWMA_ALPHA * deviation + (1.0 - EWMA_ALPHA) * self.ewma_deviation_ns;
            }
            self.last_gap_ns = Some(gap);
        }
        self.last_arrival_ns = Some(arrival_ns);
    }

    fn estimate_ms(&self) -> f64 {
        self.ewma_deviation_ns / 1_000_000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use screamrouter_codec::constants::PACKET_DATA_SIZE;
    use screamrouter_codec::StreamFormat;

    fn pkt(ts_ns: u64) -> TimeshiftPacket {
        TimeshiftPacket::new(
            ts_ns,
            StreamFormat::new(48_000, 16, 2).unwrap(),
            [0u8; PACKET_DATA_SIZE],
        )
    }

    #[test]
    fn read_at_returns_latest_packet_at_or_before_target() {
        let buf = TimeshiftBuffer::new(1.0);
        buf.append(pkt(1_000));
        buf.append(pkt(2_000));
        buf.append(pkt(3_000));
        let found = buf.read_at(3_000, 500).unwrap();
        assert_eq!(found.capture_monotonic_ns, 2_000);
    }

    #[test]
    fn read_at_returns_none_when_offset_too_far_back() {
        let buf = TimeshiftBuffer::new(1.0);
        buf.append(pkt(5_000));
        assert!(buf.read_at(5_000, 10_000).is_none());
    }

    #[test]
    fn read_at_on_empty_buffer_returns_none() {
        let buf = TimeshiftBuffer::new(1.0);
        assert!(buf.read_at(1_000, 0).is_none());
    }

    #[test]
    fn overflow_evicts_oldest_entry() {
        let buf = TimeshiftBuffer::new(0.01); // tiny capacity
        let capacity = capacity_for(0.01);
        for i in 0..(capacity as u64 + 5) {
            buf.append(pkt(i * 1_000_000));
        }
        assert_eq!(buf.len(), capacity);
        // oldest surviving entry should not be timestamp 0
        assert!(buf.read_at(0, 0).is_none());
    }

    #[test]
    fn jitter_estimate_is_zero_for_perfectly_regular_arrivals() {
        let buf = TimeshiftBuffer::new(1.0);
        for i in 0..10u64 {
            buf.append(pkt(i * 24_000_000));
        }
        assert!(buf.jitter_estimate_ms() < 1e-6);
    }

    #[test]
    fn packets_since_returns_only_newer_entries_in_order() {
        let buf = TimeshiftBuffer::new(1.0);
        buf.append(pkt(1_000));
        buf.append(pkt(2_000));
        buf.append(pkt(3_000));
        let since = buf.packets_since(Some(1_000), 10);
        let timestamps: Vec<u64> = since.iter().map(|p| p.capture_monotonic_ns).collect();
        assert_eq!(timestamps, vec![2_000, 3_000]);
    }

    #[test]
    fn packets_since_none_returns_everything_up_to_limit() {
        let buf = TimeshiftBuffer::new(1.0);
        buf.append(pkt(1_000));
        buf.append(pkt(2_000));
        buf.append(pkt(3_000));
        let since = buf.packets_since(None, 2);
        assert_eq!(since.len(), 2);
    }

    #[test]
    fn jitter_estimate_rises_with_irregular_arrivals() {
        let buf = TimeshiftBuffer::new(1.0);
        let gaps = [24_000_000u64, 24_000_000, 48_000_000, 10_000_000, 24_000_000];
        let mut t = 0u64;
        for g in gaps {
            t += g;
            buf.append(pkt(t));
        }
        assert!(buf.jitter_estimate_ms() > 0.0);
    }
}
