use parking_lot::Mutex;

/// One `SourcePath`'s most recently produced frame, written by a pool
/// worker and read by the owning sink's pacing loop. Spec §5: "a per-slot
/// seqlock is sufficient (the mixer never blocks waiting for a slow path —
/// missing data is silence)". A `parking_lot::Mutex` accessed through
/// `try_lock` gives the same never-block-the-mixer guarantee with safe
/// code, at the cost of one uncontended lock per read instead of a
/// hand-rolled seqlock; contention is negligible since each slot has
/// exactly one writer and the mixer only ever `try_lock`s it once per tick.
pub struct SourceSlot {
    frame: Mutex<Option<Vec<Vec<f32>>>>,
}

impl SourceSlot {
    pub fn new() -> Self {
        Self {
            frame: Mutex::new(None),
        }
    }

    /// Called by the path's pool worker once per produced frame.
    pub fn publish(&self, frame: Vec<Vec<f32>>) {
        *self.frame.lock() = Some(frame);
    }

    /// Called by the mixer's pacing loop. Returns `None` (silence,
    /// substituted by the caller) if the path has not yet produced a frame
    /// for this tick or the slot is transiently locked by its writer.
    pub fn take(&self) -> Option<Vec<Vec<f32>>> {
        self.frame.try_lock().and_then(|mut guard| guard.take())
    }
}

impl Default for SourceSlot {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_without_publish_is_none() {
        let slot = SourceSlot::new();
        assert!(slot.take().is_none());
    }

    #[test]
    fn take_returns_the_published_frame_once() {
        let slot = SourceSlot::new();
        slot.publish(vec![vec![1.0, 2.0]]);
        assert_eq!(slot.take(), Some(vec![vec![1.0, 2.0]]));
        assert!(slot.take().is_none());
    }

    #[test]
    fn publish_overwrites_an_unconsumed_frame() {
        let slot = SourceSlot::new();
        slot.publish(vec![vec![1.0]]);
        slot.publish(vec![vec![2.0]]);
        assert_eq!(slot.take(), Some(vec![vec![2.0]]));
    }
}
