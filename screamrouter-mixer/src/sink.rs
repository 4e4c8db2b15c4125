use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::bounded;
use parking_lot::Mutex;
use screamrouter_codec::constants::PACKET_DATA_SIZE;
use screamrouter_codec::{build_rtp_packet, build_scream_packet, payload_type_for_format};
use screamrouter_config::{PathId, Protocol, Sink};
use screamrouter_dsp::{quantize_interleaved, DelayLine, EqChain, GainStage};
use screamrouter_mp3::{Mp3Encoder, Mp3Queue};
use screamrouter_pipeline::{PathRegistry, WorkerPool};
use screamrouter_stats::SinkStats;
use screamrouter_timeshift::monotonic_now_ns;

use crate::error::MixerError;
use crate::timesync::TimeSyncShift;

/// How long [`SinkHandle::stop`] waits for the pacing thread to notice the
/// shutdown flag and finish its current tick before giving up on the join
/// and returning anyway (spec §4.5 state machine: "thread joined").
const SHUTDOWN_JOIN_TIMEOUT: Duration = Duration::from_millis(500);

struct Shared {
    sink: Mutex<Sink>,
    connected_paths: Mutex<Vec<PathId>>,
}

/// One running sink: owns its egress socket, its MP3 encoder, and the
/// pacing thread that drives the mix loop described in spec §4.5.
/// Cloning the connected-path list and current parameters is cheap enough
/// (a handful of small values, at most a few dozen `PathId`s) to do once
/// per tick rather than holding a lock across the whole mix.
pub struct SinkHandle {
    shared: Arc<Shared>,
    shutdown: Arc<AtomicBool>,
    join: Option<thread::JoinHandle<()>>,
    mp3_queue: Arc<Mp3Queue>,
    stats: Arc<SinkStats>,
}

impl SinkHandle {
    pub fn spawn(
        sink: Sink,
        path_registry: Arc<PathRegistry>,
        pool: Arc<WorkerPool>,
        stats: Arc<SinkStats>,
        mp3_bitrate_kbps: u32,
    ) -> Result<Self, MixerError> {
        let dest = SocketAddr::new(sink.output_ip, sink.output_port);
        let socket = UdpSocket::bind(("0.0.0.0", 0)).map_err(|source| MixerError::Bind {
            addr: dest,
            source,
        })?;
        let mp3_encoder = Mp3Encoder::new(sink.format.sample_rate, mp3_bitrate_kbps)?;
        let mp3_queue = Arc::new(Mp3Queue::new());

        let shared = Arc::new(Shared {
            sink: Mutex::new(sink),
            connected_paths: Mutex::new(Vec::new()),
        });
        let shutdown = Arc::new(AtomicBool::new(false));

        let loop_shared = shared.clone();
        let loop_shutdown = shutdown.clone();
        let loop_stats = stats.clone();
        let loop_mp3_queue = mp3_queue.clone();
        let join = thread::Builder::new()
            .name(format!("sr-sink-{}", dest))
            .spawn(move || {
                run(
                    loop_shared,
                    loop_shutdown,
                    path_registry,
                    pool,
                    socket,
                    dest,
                    mp3_encoder,
                    loop_mp3_queue,
                    loop_stats,
                )
            })
            .expect("spawning a sink pacing thread");

        Ok(Self {
            shared,
            shutdown,
            join: Some(join),
            mp3_queue,
            stats,
        })
    }

    pub fn update_sink(&self, sink: Sink) {
        *self.shared.sink.lock() = sink;
    }

    pub fn add_path(&self, path_id: PathId) {
        let mut paths = self.shared.connected_paths.lock();
        if !paths.contains(&path_id) {
            paths.push(path_id);
        }
    }

    pub fn remove_path(&self, path_id: PathId) {
        self.shared.connected_paths.lock().retain(|&p| p != path_id);
    }

    pub fn mp3_queue(&self) -> Arc<Mp3Queue> {
        self.mp3_queue.clone()
    }

    pub fn stats(&self) -> Arc<SinkStats> {
        self.stats.clone()
    }

    /// Signals the pacing loop to stop and waits up to
    /// [`SHUTDOWN_JOIN_TIMEOUT`] for it to exit. The encoder is flushed by
    /// the loop itself just before it returns.
    pub fn stop(mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        let Some(join) = self.join.take() else {
            return;
        };
        let (done_tx, done_rx) = bounded::<()>(1);
        let waiter = thread::spawn(move || {
            let _ = join.join();
            let _ = done_tx.send(());
        });
        if done_rx.recv_timeout(SHUTDOWN_JOIN_TIMEOUT).is_err() {
            tracing::warn!("sink pacing thread did not exit within shutdown timeout");
        }
        let _ = waiter.join();
    }
}

#[allow(clippy::too_many_arguments)]
fn run(
    shared: Arc<Shared>,
    shutdown: Arc<AtomicBool>,
    path_registry: Arc<PathRegistry>,
    pool: Arc<WorkerPool>,
    socket: UdpSocket,
    dest: SocketAddr,
    mut mp3_encoder: Mp3Encoder,
    mp3_queue: Arc<Mp3Queue>,
    stats: Arc<SinkStats>,
) {
    let initial = shared.sink.lock().clone();
    let mut eq = EqChain::new(initial.format.channels, initial.format.sample_rate);
    let mut gain = GainStage::new(initial.format.sample_rate, initial.volume, false);
    let mut delay = DelayLine::new(
        initial.format.channels,
        initial.format.sample_rate,
        initial.delay_ms,
    );
    let mut time_sync = TimeSyncShift::new(initial.format.channels, initial.time_sync_offset_samples);
    let mut last_offset_samples = initial.time_sync_offset_samples;
    let mut sequence: u16 = 0;
    let mut rtp_timestamp: u32 = 0;
    let ssrc: u32 = rand::random();

    while !shutdown.load(Ordering::Relaxed) {
        let sink = shared.sink.lock().clone();
        let paths = shared.connected_paths.lock().clone();
        let channels = sink.format.channels as usize;
        let frame_len = sink.format.frames_per_packet(PACKET_DATA_SIZE).max(1);

        let now_ns = monotonic_now_ns();
        pool.submit_and_wait(&paths, now_ns, frame_len);

        let mut mix = vec![vec![0.0f32; frame_len]; channels];
        let mut active = 0usize;
        for path_id in &paths {
            let Some(slot) = path_registry.slot(*path_id) else {
                continue;
            };
            let Some(frame) = slot.take() else {
                continue;
            };
            active += 1;
            for (channel, block) in frame.iter().enumerate() {
                if channel >= channels {
                    break;
                }
                for (i, sample) in block.iter().enumerate() {
                    if i >= frame_len {
                        break;
                    }
                    mix[channel][i] += sample;
                }
            }
        }
        stats.set_active_input_streams(active);
        stats.set_total_input_streams(paths.len());

        eq.set_equalizer(sink.equalizer);
        eq.process_planar(&mut mix);
        gain.set_volume(sink.volume);
        gain.process_planar(&mut mix);
        delay.set_delay_ms(sink.delay_ms);
        delay.process_planar(&mut mix);
        if sink.time_sync_offset_samples != last_offset_samples {
            time_sync = TimeSyncShift::new(sink.format.channels, sink.time_sync_offset_samples);
            last_offset_samples = sink.time_sync_offset_samples;
        }
        time_sync.process_planar(&mut mix);

        for block in &mut mix {
            for sample in block.iter_mut() {
                *sample = sample.clamp(-1.0, 1.0);
            }
        }

        match mp3_encoder.encode(&mix) {
            Ok(bytes) => mp3_queue.push(bytes),
            Err(err) => tracing::warn!(error = %err, "mp3 encode failed"),
        }

        let payload = quantize_interleaved(sink.format.bit_depth, &mix);
        let datagram = match sink.protocol {
            Protocol::Scream => build_scream_packet(&sink.format, &payload),
            Protocol::Rtp => {
                let payload_type = payload_type_for_format(&sink.format);
                Ok(build_rtp_packet(
                    payload_type,
                    sequence,
                    rtp_timestamp,
                    ssrc,
                    &payload,
                ))
            }
        };
        sequence = sequence.wrapping_add(1);
        rtp_timestamp = rtp_timestamp.wrapping_add(frame_len as u32);

        match datagram {
            Ok(bytes) => {
                if socket.send_to(&bytes, dest).is_err() {
                    stats.record_send_error();
                }
            }
            Err(err) => tracing::warn!(error = %err, "failed to build egress packet"),
        }
        stats.record_packet_mixed();

        let tick = tick_duration(frame_len, sink.format.sample_rate);
        thread::sleep(tick);
    }

    if let Ok(bytes) = mp3_encoder.flush() {
        mp3_queue.push(bytes);
    }
}

fn tick_duration(frame_len: usize, sample_rate: u32) -> Duration {
    if sample_rate == 0 {
        return Duration::from_millis(20);
    }
    Duration::from_secs_f64(frame_len as f64 / sample_rate as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_duration_matches_frame_len_over_sample_rate() {
        let d = tick_duration(480, 48_000);
        assert!((d.as_secs_f64() - 0.01).abs() < 1e-9);
    }

    #[test]
    fn tick_duration_falls_back_for_zero_sample_rate() {
        let d = tick_duration(100, 0);
        assert_eq!(d, Duration::from_millis(20));
    }
}
