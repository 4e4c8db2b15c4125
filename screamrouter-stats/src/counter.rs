use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::Mutex;

/// Monotonic, lock-free counter. Incremented from receiver/path/mixer
/// threads, read occasionally by whatever assembles a statistics snapshot.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn increment(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A point-in-time value that can go up or down, e.g. a queue depth or the
/// count of currently active streams.
#[derive(Debug, Default)]
pub struct Gauge(AtomicI64);

impl Gauge {
    pub fn new() -> Self {
        Self(AtomicI64::new(0))
    }

    pub fn set(&self, value: i64) {
        self.0.store(value, Ordering::Relaxed);
    }

    pub fn get(&self) -> i64 {
        self.0.load(Ordering::Relaxed)
    }
}

struct RateWindow {
    last_sample_at: Instant,
    last_count: u64,
    rate: f64,
}

/// Derives a `*_per_second` gauge from an underlying monotonic [`Counter`],
/// per spec §6's family of per-second statistics. Resampling the rate on
/// every call would be noisy for bursty traffic, so a sample is only taken
/// once at least [`RateCounter::MIN_SAMPLE_INTERVAL_SECS`] has elapsed since
/// the last one; calls inside that window return the previous estimate.
pub struct RateCounter {
    count: Counter,
    window: Mutex<RateWindow>,
}

impl RateCounter {
    const MIN_SAMPLE_INTERVAL_SECS: f64 = 0.2;

    pub fn new() -> Self {
        Self {
            count: Counter::new(),
            window: Mutex::new(RateWindow {
                last_sample_at: Instant::now(),
                last_count: 0,
                rate: 0.0,
            }),
        }
    }

    pub fn increment(&self) {
        self.count.increment();
    }

    pub fn add(&self, n: u64) {
        self.count.add(n);
    }

    pub fn total(&self) -> u64 {
        self.count.get()
    }

    /// Current rate estimate, in events per second.
    pub fn rate_per_second(&self) -> f64 {
        let mut window = self.window.lock();
        let now = Instant::now();
        let elapsed = now.duration_since(window.last_sample_at).as_secs_f64();
        if elapsed >= Self::MIN_SAMPLE_INTERVAL_SECS {
            let current = self.count.get();
            let delta = current.saturating_sub(window.last_count);
            window.rate = delta as f64 / elapsed;
            window.last_count = current;
            window.last_sample_at = now;
        }
        window.rate
    }
}

impl Default for RateCounter {
    fn default() -> Self {
        Self::new()
    }
}
