use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use screamrouter_config::{PathId, SinkId};

use crate::path::PathStats;
use crate::process::ProcessStats;
use crate::sink::SinkStats;
use crate::tag::TagStats;

/// Owns every live statistics object, keyed the same way the audio plane
/// keys its live tables (`source_tag`, `path_id`, `sink_id`), plus the one
/// process-wide set. Mirrors `screamrouter-timeshift::TimeshiftRegistry`'s
/// lazy-create-on-first-reference shape.
#[derive(Default)]
pub struct StatsRegistry {
    process: ProcessStats,
    tags: RwLock<HashMap<String, Arc<TagStats>>>,
    paths: RwLock<HashMap<PathId, Arc<PathStats>>>,
    sinks: RwLock<HashMap<SinkId, Arc<SinkStats>>>,
}

impl StatsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process(&self) -> &ProcessStats {
        &self.process
    }

    pub fn tag(&self, tag: &str) -> Arc<TagStats> {
        if let Some(existing) = self.tags.read().get(tag) {
            return existing.clone();
        }
        self.tags
            .write()
            .entry(tag.to_string())
            .or_insert_with(|| Arc::new(TagStats::new()))
            .clone()
    }

    pub fn path(&self, path_id: PathId) -> Arc<PathStats> {
        if let Some(existing) = self.paths.read().get(&path_id) {
            return existing.clone();
        }
        self.paths
            .write()
            .entry(path_id)
            .or_insert_with(|| Arc::new(PathStats::new()))
            .clone()
    }

    pub fn sink(&self, sink_id: &SinkId) -> Arc<SinkStats> {
        if let Some(existing) = self.sinks.read().get(sink_id) {
            return existing.clone();
        }
        self.sinks
            .write()
            .entry(sink_id.clone())
            .or_insert_with(|| Arc::new(SinkStats::new()))
            .clone()
    }

    /// Drops tracking for a tag/path/sink whose owning object has been torn
    /// down, so the statistics tables do not grow without bound across
    /// configuration churn.
    pub fn release_tag(&self, tag: &str) {
        self.tags.write().remove(tag);
    }

    pub fn release_path(&self, path_id: PathId) {
        self.paths.write().remove(&path_id);
    }

    pub fn release_sink(&self, sink_id: &SinkId) {
        self.sinks.write().remove(sink_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_lookup_returns_same_tag_stats() {
        let registry = StatsRegistry::new();
        let a = registry.tag("10.0.0.2");
        let b = registry.tag("10.0.0.2");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn release_drops_tracking() {
        let registry = StatsRegistry::new();
        let sink_id = SinkId("S1".to_string());
        let held = registry.sink(&sink_id);
        registry.release_sink(&sink_id);
        let again = registry.sink(&sink_id);
        assert!(!Arc::ptr_eq(&held, &again));
    }
}
