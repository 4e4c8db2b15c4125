use std::sync::Arc;

use screamrouter_codec::StreamFormat;
use screamrouter_config::{Equalizer, SourcePath};
use screamrouter_dsp::{apply_matrix, decode_planar, DelayLine, EqChain, GainStage, Resampler};
use screamrouter_stats::PathStats;
use screamrouter_timeshift::TimeshiftBuffer;

/// How many newly-available packets a single tick will drain from the
/// timeshift buffer before giving up and running with whatever history the
/// resampler already has. Generous enough to absorb a burst after a stall
/// without letting one slow path's catch-up monopolize a pool worker.
const MAX_PACKETS_PER_TICK: usize = 64;

/// `(1 / rms(bands))` clamped to a sane range, applied as an extra output
/// gain when a path opts into `eq_normalization`. The EQ chain itself only
/// shapes frequency response; a heavily boosted band otherwise changes
/// the path's overall loudness as a side effect, which this factor cancels
/// back out towards unity.
fn eq_normalization_factor(equalizer: &Equalizer) -> f32 {
    let sum_sq: f32 = equalizer.bands.iter().map(|b| b * b).sum();
    let rms = (sum_sq / equalizer.bands.len() as f32).sqrt();
    if rms <= 1e-6 {
        1.0
    } else {
        (1.0 / rms).clamp(0.25, 4.0)
    }
}

/// Drives one `SourcePath`'s fixed DSP chain: remap, resample, EQ, gain,
/// delay, in that order (per the channel/rate/EQ/gain/delay pipeline
/// order). One instance is owned exclusively by the pool slot currently
/// servicing the path; state (resampler history, EQ fade, gain ramp, delay
/// line) persists across ticks.
pub struct SourcePathWorker {
    path: SourcePath,
    buffer: Arc<TimeshiftBuffer>,
    stats: Arc<PathStats>,
    resampler: Resampler,
    resampler_input_channels: u8,
    eq: EqChain,
    gain: GainStage,
    delay: DelayLine,
    last_read_ns: Option<u64>,
}

impl SourcePathWorker {
    pub fn new(path: SourcePath, buffer: Arc<TimeshiftBuffer>, stats: Arc<PathStats>) -> Self {
        let target_channels = path.target_channels;
        let target_sample_rate = path.target_sample_rate;
        let resampler = Resampler::new(target_sample_rate, target_sample_rate, target_channels);
        let eq = EqChain::new(target_channels, target_sample_rate);
        let gain = GainStage::new(target_sample_rate, path.volume, path.volume_normalization);
        let delay = DelayLine::new(target_channels, target_sample_rate, path.delay_ms);
        let mut worker = Self {
            path,
            buffer,
            stats,
            resampler,
            resampler_input_channels: target_channels,
            eq,
            gain,
            delay,
            last_read_ns: None,
        };
        worker.eq.set_equalizer(worker.path.equalizer);
        worker
    }

    pub fn path_id(&self) -> screamrouter_config::PathId {
        self.path.path_id
    }

    /// Applies a non-structural parameter update in place (volume, EQ,
    /// delay, timeshift offset, normalization flags, speaker layouts).
    /// Structural changes (tag, sink, channel count, sample rate) are a
    /// destroy+create at the registry, never routed here.
    pub fn update(&mut self, path: SourcePath) {
        self.eq.set_equalizer(path.equalizer);
        self.gain.set_volume(path.volume);
        self.gain.set_volume_normalization(path.volume_normalization);
        self.delay.set_delay_ms(path.delay_ms);
        self.path = path;
    }

    fn remap_matrix(&self, input_channels: u8) -> screamrouter_config::SpeakerMatrix {
        if self.path.auto_mode {
            screamrouter_config::auto_matrix(input_channels, self.path.target_channels)
        } else {
            self.path
                .speaker_layouts
                .get(&input_channels)
                .copied()
                .unwrap_or_else(|| screamrouter_config::auto_matrix(input_channels, self.path.target_channels))
        }
    }

    fn ensure_resampler_for(&mut self, format: StreamFormat) {
        if format.channels != self.resampler_input_channels
            || self.resampler.input_rate() != format.sample_rate
        {
            self.resampler = Resampler::new(
                format.sample_rate,
                self.path.target_sample_rate,
                self.path.target_channels,
            );
            self.resampler_input_channels = format.channels;
            self.stats.record_resampler_reset();
        }
    }

    fn timeshift_offset_ns(&self) -> u64 {
        ((-self.path.timeshift_sec).max(0.0) as f64 * 1_000_000_000.0) as u64
    }

    /// Drains every newly-available, now-playable packet from the
    /// timeshift buffer into the resampler's input history.
    fn ingest_ready_packets(&mut self, now_ns: u64) {
        let Some(target_ns) = now_ns.checked_sub(self.timeshift_offset_ns()) else {
            return;
        };
        let packets = self
            .buffer
            .packets_since(self.last_read_ns, MAX_PACKETS_PER_TICK);
        for packet in packets {
            if packet.capture_monotonic_ns > target_ns {
                break;
            }
            self.ensure_resampler_for(packet.format);
            let decoded = decode_planar(
                packet.format.bit_depth,
                packet.format.channels,
                &packet.payload,
            );
            let matrix = self.remap_matrix(packet.format.channels);
            let remapped = apply_matrix(&decoded, &matrix, self.path.target_channels);
            self.resampler.push_input(&remapped);
            self.last_read_ns = Some(packet.capture_monotonic_ns);
            self.stats.record_packet_processed();
        }
    }

    /// Produces exactly `output_len` frames of fully processed audio for
    /// this tick, or `None` on underrun (not enough history yet to fill
    /// the tick — the mixer substitutes silence and moves on).
    pub fn process_tick(&mut self, now_ns: u64, output_len: usize) -> Option<Vec<Vec<f32>>> {
        self.ingest_ready_packets(now_ns);
        let mut frame = self.resampler.pull_output(output_len)?;
        self.eq.process_planar(&mut frame);
        if self.path.eq_normalization {
            let factor = eq_normalization_factor(&self.path.equalizer);
            for block in &mut frame {
                for sample in block.iter_mut() {
                    *sample *= factor;
                }
            }
        }
        self.gain.process_planar(&mut frame);
        self.delay.process_planar(&mut frame);
        Some(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use screamrouter_codec::constants::PACKET_DATA_SIZE;
    use screamrouter_config::{Equalizer, PathId, SinkId};
    use screamrouter_stats::PathStats;
    use screamrouter_timeshift::TimeshiftPacket;
    use std::collections::HashMap;

    fn test_path() -> SourcePath {
        SourcePath {
            path_id: PathId(1),
            source_tag: "10.0.0.5".to_string(),
            target_sink_id: SinkId("living-room".to_string()),
            volume: 1.0,
            equalizer: Equalizer::unity(),
            delay_ms: 0,
            timeshift_sec: 0.0,
            target_channels: 2,
            target_sample_rate: 48_000,
            speaker_layouts: HashMap::new(),
            auto_mode: true,
            eq_normalization: false,
            volume_normalization: false,
        }
    }

    fn push_silence(buffer: &TimeshiftBuffer, when_ns: u64) {
        let format = StreamFormat::new(48_000, 16, 2).unwrap();
        buffer.append(TimeshiftPacket::new(
            when_ns,
            format,
            [0u8; PACKET_DATA_SIZE],
        ));
    }

    #[test]
    fn underrun_before_any_packet_arrives() {
        let buffer = Arc::new(TimeshiftBuffer::new(1.0));
        let stats = Arc::new(PathStats::new());
        let mut worker = SourcePathWorker::new(test_path(), buffer, stats);
        assert!(worker.process_tick(1_000_000_000, 256).is_none());
    }

    #[test]
    fn processes_ingested_silence_without_panicking() {
        let buffer = Arc::new(TimeshiftBuffer::new(1.0));
        for i in 0..40 {
            push_silence(&buffer, i * 6_000_000);
        }
        let stats = Arc::new(PathStats::new());
        let mut worker = SourcePathWorker::new(test_path(), buffer, stats.clone());
        let frame = worker.process_tick(1_000_000_000_000, 256);
        assert!(frame.is_some());
        assert_eq!(frame.unwrap().len(), 2);
        assert!(stats.snapshot().packets_processed_per_second >= 0.0);
    }

    #[test]
    fn update_changes_volume_without_rebuilding_structural_state() {
        let buffer = Arc::new(TimeshiftBuffer::new(1.0));
        let stats = Arc::new(PathStats::new());
        let mut worker = SourcePathWorker::new(test_path(), buffer, stats);
        let mut updated = test_path();
        updated.volume = 0.1;
        worker.update(updated);
        assert_eq!(worker.gain.volume(), 1.0); // ramped, not stepped
    }

    #[test]
    fn timeshift_offset_delays_ingestion() {
        // timeshift_sec is a past offset (solver invariant: never positive);
        // -2.0 means "play what was captured 2s ago".
        let mut path = test_path();
        path.timeshift_sec = -2.0;
        let buffer = Arc::new(TimeshiftBuffer::new(10.0));
        for i in 0..40 {
            push_silence(&buffer, i * 6_000_000);
        }
        let stats = Arc::new(PathStats::new());
        let mut worker = SourcePathWorker::new(path, buffer, stats.clone());
        // "now" is only 1s in, short of the 2s past-offset, so none of the
        // captured packets are old enough to play yet.
        assert!(worker.process_tick(1_000_000_000, 64).is_none());
        assert_eq!(stats.snapshot().packets_processed_per_second, 0.0);

        // Far enough past capture, the same packets become playable.
        let frame = worker.process_tick(1_000_000_000_000, 64);
        assert!(frame.is_some());
        assert!(stats.snapshot().packets_processed_per_second > 0.0);
    }
}
