use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use screamrouter_config::{diff, ApplyOp, DesiredState, PathId, SinkId};
use screamrouter_mixer::SinkRegistry;
use screamrouter_mp3::Mp3Queue;
use screamrouter_pipeline::{PathRegistry, WorkerPool};
use screamrouter_stats::StatsRegistry;
use screamrouter_timeshift::TimeshiftRegistry;

use crate::error::CoreError;
use crate::pcm::{export_pcm, PcmExport};
use crate::stats::{snapshot, StatsSnapshot};

/// How many OS threads drive per-path DSP work, independent of how many
/// paths or sinks are configured (spec §4.4: the pool is sized to
/// available cores, not live path count).
const DEFAULT_WORKER_THREADS: usize = 4;

/// Rolling history every source-tag's timeshift buffer keeps, regardless
/// of whether any path currently reads from it (spec §4.3).
const DEFAULT_MAX_HISTORY_SECONDS: f64 = 300.0;

/// Default MP3 side-channel bitrate when no override is given (spec §4.6).
const DEFAULT_MP3_BITRATE_KBPS: u32 = 128;

/// Owns every live registry and is the single entry point the control
/// plane talks to (spec §5): `apply_state` converges live state to a new
/// desired state, `get_mp3_data`/`export_pcm`/`stats` are the read-only
/// exports. Everything here is synchronous and non-blocking except
/// `apply_state`, which blocks for as long as the registries it touches do
/// (bounded: sink teardown has its own 500ms join timeout).
pub struct Engine {
    timeshift: Arc<TimeshiftRegistry>,
    path_registry: Arc<PathRegistry>,
    sink_registry: Arc<SinkRegistry>,
    stats: Arc<StatsRegistry>,
    live: Mutex<DesiredState>,
    tag_refs: Mutex<HashMap<String, usize>>,
}

impl Engine {
    pub fn new() -> Self {
        Self::with_worker_threads(DEFAULT_WORKER_THREADS)
    }

    pub fn with_worker_threads(worker_threads: usize) -> Self {
        Self::with_settings(
            worker_threads,
            DEFAULT_MP3_BITRATE_KBPS,
            DEFAULT_MAX_HISTORY_SECONDS,
        )
    }

    /// Boots every registry from explicit boot-time settings (spec §6), the
    /// constructor `screamrouter-app::Settings` drives; the two convenience
    /// constructors above just fill in the defaults a bare library caller
    /// (e.g. a unit test) usually doesn't care about.
    pub fn with_settings(
        worker_threads: usize,
        mp3_bitrate_kbps: u32,
        max_history_seconds: f64,
    ) -> Self {
        let timeshift = Arc::new(TimeshiftRegistry::new(max_history_seconds));
        let stats = Arc::new(StatsRegistry::new());
        let path_registry = Arc::new(PathRegistry::new(timeshift.clone(), stats.clone()));
        let pool = Arc::new(WorkerPool::new(worker_threads, path_registry.clone()));
        let sink_registry = Arc::new(SinkRegistry::with_mp3_bitrate(
            path_registry.clone(),
            pool,
            stats.clone(),
            mp3_bitrate_kbps,
        ));
        Self {
            timeshift,
            path_registry,
            sink_registry,
            stats,
            live: Mutex::new(DesiredState::default()),
            tag_refs: Mutex::new(HashMap::new()),
        }
    }

    /// The timeshift registry, shared with `screamrouter-net` receivers so
    /// they can append into the same buffers this engine's paths read from.
    pub fn timeshift_registry(&self) -> Arc<TimeshiftRegistry> {
        self.timeshift.clone()
    }

    pub fn stats_registry(&self) -> Arc<StatsRegistry> {
        self.stats.clone()
    }

    /// Converges live state to `desired`, applying destroy-path/destroy-sink
    /// before create-sink/create-path before update-sink/update-path (spec
    /// §4.8 ordering). Stops at the first failing op; ops already applied
    /// are not rolled back, matching the "aggregated error, data plane
    /// already serialized" propagation policy in spec §5.
    pub fn apply_state(&self, desired: DesiredState) -> Result<(), CoreError> {
        let mut live = self.live.lock();
        let ops = diff(&live, &desired);
        for op in ops {
            match op {
                ApplyOp::DestroyPath(path_id) => self.apply_destroy_path(&live, path_id),
                ApplyOp::DestroySink(sink_id) => self.sink_registry.destroy(&sink_id),
                ApplyOp::CreateSink(sink) => self.sink_registry.create(sink)?,
                ApplyOp::CreatePath(path) => {
                    self.acquire_tag(&path.source_tag);
                    let target_sink_id = path.target_sink_id.clone();
                    let path_id = path.path_id;
                    self.path_registry.create(path);
                    self.sink_registry.connect_path(&target_sink_id, path_id);
                }
                ApplyOp::UpdateSink(sink) => self.sink_registry.update(sink)?,
                ApplyOp::UpdatePath(path) => self.path_registry.update(path)?,
            }
        }
        *live = desired;
        Ok(())
    }

    fn apply_destroy_path(&self, live: &DesiredState, path_id: PathId) {
        let Some(path) = live.source_paths.iter().find(|p| p.path_id == path_id) else {
            return;
        };
        self.sink_registry.disconnect_path(&path.target_sink_id, path_id);
        self.path_registry.destroy(path_id, &path.source_tag);
        self.release_tag(&path.source_tag);
    }

    /// Source-tags can be shared by multiple paths (e.g. the same process
    /// routed to two sinks); the timeshift buffer is only released from the
    /// registry once the last referencing path is torn down, per
    /// `TimeshiftRegistry`'s own lazy-create/last-reference lifecycle.
    fn acquire_tag(&self, tag: &str) {
        *self.tag_refs.lock().entry(tag.to_string()).or_insert(0) += 1;
    }

    fn release_tag(&self, tag: &str) {
        let mut refs = self.tag_refs.lock();
        if let Some(count) = refs.get_mut(tag) {
            *count -= 1;
            if *count == 0 {
                refs.remove(tag);
                self.timeshift.release(tag);
            }
        }
    }

    pub fn get_mp3_data(&self, sink_id: &SinkId) -> Vec<u8> {
        self.sink_registry
            .mp3_queue(sink_id)
            .map(|queue| queue.drain())
            .unwrap_or_default()
    }

    pub fn export_pcm(&self, source_tag: &str, lookback_seconds: f64) -> Option<PcmExport> {
        export_pcm(&self.timeshift, source_tag, lookback_seconds)
    }

    pub fn stats(&self) -> StatsSnapshot {
        snapshot(
            &self.timeshift,
            &self.path_registry,
            self.sink_registry.sink_ids(),
            &self.stats,
        )
    }

    /// Exposed so `screamrouter-app` can hand a sink's queue to its own HTTP
    /// layer without reaching through `get_mp3_data` on a hot poll loop.
    pub fn mp3_queue(&self, sink_id: &SinkId) -> Option<Arc<Mp3Queue>> {
        self.sink_registry.mp3_queue(sink_id)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use screamrouter_config::{Equalizer, Protocol, Sink, SourcePath};
    use std::collections::HashMap as Map;
    use std::net::{IpAddr, Ipv4Addr};
    use std::thread::sleep;
    use std::time::Duration;

    fn sink(port: u16) -> Sink {
        Sink {
            id: SinkId("S1".to_string()),
            output_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            output_port: port,
            protocol: Protocol::Scream,
            format: screamrouter_codec::StreamFormat::new(48_000, 16, 2).unwrap(),
            volume: 1.0,
            equalizer: Equalizer::unity(),
            delay_ms: 0,
            timeshift_sec: 0.0,
            time_sync_offset_samples: None,
        }
    }

    fn path() -> SourcePath {
        SourcePath {
            path_id: PathId(1),
            source_tag: "10.0.0.7".to_string(),
            target_sink_id: SinkId("S1".to_string()),
            volume: 1.0,
            equalizer: Equalizer::unity(),
            delay_ms: 0,
            timeshift_sec: 0.0,
            target_channels: 2,
            target_sample_rate: 48_000,
            speaker_layouts: Map::new(),
            auto_mode: true,
            eq_normalization: false,
            volume_normalization: false,
        }
    }

    #[test]
    fn apply_state_is_idempotent_against_its_own_live_state() {
        let engine = Engine::with_worker_threads(1);
        let desired = DesiredState {
            sinks: vec![sink(41_000)],
            source_paths: vec![path()],
        };
        engine.apply_state(desired.clone()).expect("first apply succeeds");
        sleep(Duration::from_millis(20));
        engine.apply_state(desired).expect("reapplying desired state is a no-op");
        assert_eq!(engine.stats().sinks.len(), 1);
    }

    #[test]
    fn destroying_a_path_releases_its_timeshift_tag() {
        let engine = Engine::with_worker_threads(1);
        engine
            .apply_state(DesiredState {
                sinks: vec![sink(41_001)],
                source_paths: vec![path()],
            })
            .unwrap();
        assert!(engine.timeshift_registry().get("10.0.0.7").is_some());

        engine
            .apply_state(DesiredState {
                sinks: vec![sink(41_001)],
                source_paths: vec![],
            })
            .unwrap();
        assert!(engine.timeshift_registry().get("10.0.0.7").is_none());
    }

    #[test]
    fn unknown_sink_update_surfaces_as_core_error() {
        let engine = Engine::with_worker_threads(1);
        let err = engine.sink_registry.update(sink(41_002));
        assert!(err.is_err());
    }

    #[test]
    fn get_mp3_data_on_unknown_sink_is_empty() {
        let engine = Engine::with_worker_threads(1);
        assert!(engine.get_mp3_data(&SinkId("ghost".to_string())).is_empty());
    }
}
