use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::buffer::{TimeshiftBuffer, DEFAULT_MAX_HISTORY_SECONDS};

/// Owns the live set of per-`source_tag` timeshift buffers. A buffer is
/// created lazily on first reference and destroyed when the last
/// referencing `SourcePath` is torn down (spec §3 lifecycle), but retains
/// its history across path churn while at least one reference survives —
/// callers hold the returned `Arc` for exactly as long as their path does.
pub struct TimeshiftRegistry {
    buffers: RwLock<HashMap<String, Arc<TimeshiftBuffer>>>,
    max_history_seconds: f64,
}

impl Default for TimeshiftRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY_SECONDS)
    }
}

impl TimeshiftRegistry {
    pub fn new(max_history_seconds: f64) -> Self {
        Self {
            buffers: RwLock::new(HashMap::new()),
            max_history_seconds,
        }
    }

    /// Returns the buffer for `tag`, creating it if this is the first
    /// reference. Spec invariant 2: at most one buffer exists per tag.
    pub fn get_or_create(&self, tag: &str) -> Arc<TimeshiftBuffer> {
        if let Some(existing) = self.buffers.read().get(tag) {
            return existing.clone();
        }
        let mut buffers = self.buffers.write();
        buffers
            .entry(tag.to_string())
            .or_insert_with(|| Arc::new(TimeshiftBuffer::new(self.max_history_seconds)))
            .clone()
    }

    pub fn get(&self, tag: &str) -> Option<Arc<TimeshiftBuffer>> {
        self.buffers.read().get(tag).cloned()
    }

    /// Drops the registry's own reference to `tag`'s buffer. If no
    /// `SourcePath` holds a clone of the `Arc`, the buffer is freed.
    pub fn release(&self, tag: &str) {
        self.buffers.write().remove(tag);
    }

    pub fn active_tags(&self) -> Vec<String> {
        self.buffers.read().keys().cloned().collect()
    }
}
