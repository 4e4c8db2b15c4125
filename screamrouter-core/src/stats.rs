use std::collections::HashMap;

use screamrouter_config::{PathId, SinkId};
use screamrouter_pipeline::PathRegistry;
use screamrouter_stats::{
    PathStatsSnapshot, ProcessStatsSnapshot, SinkStatsSnapshot, StatsRegistry, TagStatsSnapshot,
};
use screamrouter_timeshift::TimeshiftRegistry;
use serde::Serialize;

/// Full statistics export (spec §6), assembled on demand from the three
/// registries that each own one slice of it. Nothing here is cached: every
/// call walks the currently-live tags/paths/sinks.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub process: ProcessStatsSnapshot,
    pub tags: HashMap<String, TagStatsSnapshot>,
    pub paths: HashMap<PathId, PathStatsSnapshot>,
    pub sinks: HashMap<SinkId, SinkStatsSnapshot>,
}

pub(crate) fn snapshot(
    timeshift: &TimeshiftRegistry,
    path_registry: &PathRegistry,
    sink_ids: Vec<SinkId>,
    stats: &StatsRegistry,
) -> StatsSnapshot {
    let active_tags = timeshift.active_tags();
    let mut tags = HashMap::with_capacity(active_tags.len());
    let mut buffer_total = 0usize;
    for tag in &active_tags {
        let Some(buffer) = timeshift.get(tag) else {
            continue;
        };
        let size = buffer.len();
        buffer_total += size;
        tags.insert(
            tag.clone(),
            stats.tag(tag).snapshot(buffer.jitter_estimate_ms(), size),
        );
    }

    let mut paths = HashMap::new();
    for path_id in path_registry.path_ids() {
        paths.insert(path_id, stats.path(path_id).snapshot());
    }

    let mut sinks = HashMap::with_capacity(sink_ids.len());
    for sink_id in sink_ids {
        let snap = stats.sink(&sink_id).snapshot();
        sinks.insert(sink_id, snap);
    }

    StatsSnapshot {
        process: stats.process().snapshot(buffer_total),
        tags,
        paths,
        sinks,
    }
}
