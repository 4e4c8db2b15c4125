use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use screamrouter_config::{PathId, Sink, SinkId};
use screamrouter_pipeline::{PathRegistry, WorkerPool};
use screamrouter_stats::StatsRegistry;

use crate::error::MixerError;
use crate::sink::SinkHandle;

/// Default MP3 side-channel bitrate, used when a control plane boots the
/// registry through [`SinkRegistry::new`] without an explicit override
/// (spec §4.6 leaves the bitrate "configured" without mandating a default;
/// `screamrouter-app`'s `Settings` is the usual source of an override via
/// [`SinkRegistry::with_mp3_bitrate`]).
const DEFAULT_MP3_BITRATE_KBPS: u32 = 128;

/// Owns every live `SinkHandle`, keyed by `sink_id`. Also tracks which
/// paths are connected to which sink so a `CreatePath`/`DestroyPath`
/// `ApplyOp` can be routed to the right sink without the path itself
/// knowing anything about sinks.
pub struct SinkRegistry {
    sinks: Mutex<HashMap<SinkId, SinkHandle>>,
    path_registry: Arc<PathRegistry>,
    pool: Arc<WorkerPool>,
    stats: Arc<StatsRegistry>,
    mp3_bitrate_kbps: u32,
}

impl SinkRegistry {
    pub fn new(path_registry: Arc<PathRegistry>, pool: Arc<WorkerPool>, stats: Arc<StatsRegistry>) -> Self {
        Self::with_mp3_bitrate(path_registry, pool, stats, DEFAULT_MP3_BITRATE_KBPS)
    }

    pub fn with_mp3_bitrate(
        path_registry: Arc<PathRegistry>,
        pool: Arc<WorkerPool>,
        stats: Arc<StatsRegistry>,
        mp3_bitrate_kbps: u32,
    ) -> Self {
        Self {
            sinks: Mutex::new(HashMap::new()),
            path_registry,
            pool,
            stats,
            mp3_bitrate_kbps,
        }
    }

    pub fn create(&self, sink: Sink) -> Result<(), MixerError> {
        let sink_stats = self.stats.sink(&sink.id);
        let handle = SinkHandle::spawn(
            sink.clone(),
            self.path_registry.clone(),
            self.pool.clone(),
            sink_stats,
            self.mp3_bitrate_kbps,
        )?;
        self.sinks.lock().insert(sink.id, handle);
        Ok(())
    }

    pub fn update(&self, sink: Sink) -> Result<(), MixerError> {
        let sinks = self.sinks.lock();
        match sinks.get(&sink.id) {
            Some(handle) => {
                handle.update_sink(sink);
                Ok(())
            }
            None => Err(MixerError::UnknownSink(sink.id)),
        }
    }

    pub fn destroy(&self, sink_id: &SinkId) {
        let removed = self.sinks.lock().remove(sink_id);
        if let Some(handle) = removed {
            self.stats.release_sink(sink_id);
            handle.stop();
        }
    }

    /// Registers `path_id` as connected to `sink_id`'s mix. Called after
    /// the path has already been created in the `PathRegistry`.
    pub fn connect_path(&self, sink_id: &SinkId, path_id: PathId) {
        if let Some(handle) = self.sinks.lock().get(sink_id) {
            handle.add_path(path_id);
        }
    }

    pub fn disconnect_path(&self, sink_id: &SinkId, path_id: PathId) {
        if let Some(handle) = self.sinks.lock().get(sink_id) {
            handle.remove_path(path_id);
        }
    }

    pub fn mp3_queue(&self, sink_id: &SinkId) -> Option<Arc<screamrouter_mp3::Mp3Queue>> {
        self.sinks.lock().get(sink_id).map(|h| h.mp3_queue())
    }

    pub fn stats(&self, sink_id: &SinkId) -> Option<Arc<screamrouter_stats::SinkStats>> {
        self.sinks.lock().get(sink_id).map(|h| h.stats())
    }

    pub fn sink_ids(&self) -> Vec<SinkId> {
        self.sinks.lock().keys().cloned().collect()
    }
}
