//! Monotonic clock shared across the data plane. Every `capture_monotonic_ns`
//! timestamp stored in a [`crate::TimeshiftBuffer`] and every `now_ns` passed
//! to `read_at` must come from this one epoch, or offsets computed between
//! them are meaningless.

use std::sync::OnceLock;
use std::time::Instant;

static EPOCH: OnceLock<Instant> = OnceLock::new();

/// Nanoseconds since an arbitrary, process-lifetime-stable epoch. Not a wall
/// clock and not comparable across process restarts; only differences
/// between two calls in the same process are meaningful.
pub fn monotonic_now_ns() -> u64 {
    let epoch = EPOCH.get_or_init(Instant::now);
    epoch.elapsed().as_nanos() as u64
}
