use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, Sender};
use screamrouter_config::PathId;

use crate::registry::PathRegistry;

/// One tick's worth of work: advance `path_id`'s DSP chain up to `now_ns`,
/// producing `output_len` frames for its sink. `done`, when present, is
/// signaled once the tick has been applied so a caller can wait for a
/// whole batch to finish rather than polling the output slots.
struct Tick {
    path_id: PathId,
    now_ns: u64,
    output_len: usize,
    done: Option<Sender<()>>,
}

/// Fixed-size pool of worker threads that drive `SourcePathWorker`s. Sinks
/// submit one `Tick` per connected path per pacing tick rather than owning
/// threads themselves, so the number of OS threads stays bounded
/// regardless of how many paths or sinks exist.
pub struct WorkerPool {
    sender: Sender<Tick>,
    handles: Vec<thread::JoinHandle<()>>,
}

impl WorkerPool {
    /// `worker_count` should scale with available cores, not path count;
    /// the channel absorbs bursts when a tick arrives for more paths than
    /// there are idle workers.
    pub fn new(worker_count: usize, registry: Arc<PathRegistry>) -> Self {
        let worker_count = worker_count.max(1);
        let (sender, receiver) = bounded::<Tick>(worker_count * 64);
        let mut handles = Vec::with_capacity(worker_count);
        for index in 0..worker_count {
            let receiver = receiver.clone();
            let registry = registry.clone();
            let handle = thread::Builder::new()
                .name(format!("sr-path-worker-{index}"))
                .spawn(move || {
                    for tick in receiver {
                        registry.tick(tick.path_id, tick.now_ns, tick.output_len);
                        if let Some(done) = tick.done {
                            let _ = done.send(());
                        }
                    }
                })
                .expect("spawning a pool worker thread");
            handles.push(handle);
        }
        Self { sender, handles }
    }

    /// Enqueues one path's tick without waiting for it to be applied.
    pub fn submit(&self, path_id: PathId, now_ns: u64, output_len: usize) {
        let _ = self.sender.try_send(Tick {
            path_id,
            now_ns,
            output_len,
            done: None,
        });
    }

    /// Submits a tick for every path in `path_ids` and blocks until all of
    /// them have been applied (their output slots published). This is how
    /// a sink's pacing loop drives its connected paths in parallel while
    /// still reading a consistent set of fresh frames each tick.
    pub fn submit_and_wait(&self, path_ids: &[PathId], now_ns: u64, output_len: usize) {
        if path_ids.is_empty() {
            return;
        }
        let (done_tx, done_rx) = bounded::<()>(path_ids.len());
        for &path_id in path_ids {
            let _ = self.sender.send(Tick {
                path_id,
                now_ns,
                output_len,
                done: Some(done_tx.clone()),
            });
        }
        drop(done_tx);
        for _ in 0..path_ids.len() {
            if done_rx.recv().is_err() {
                break;
            }
        }
    }

    pub fn worker_count(&self) -> usize {
        self.handles.len()
    }

    /// Closes the tick channel and joins every worker thread. Consumes the
    /// pool since there is nothing left to submit to once this returns.
    pub fn shutdown(self) {
        drop(self.sender);
        for handle in self.handles {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use screamrouter_stats::StatsRegistry;
    use screamrouter_timeshift::TimeshiftRegistry;

    #[test]
    fn submitting_a_tick_for_an_unknown_path_does_not_panic() {
        let registry = Arc::new(PathRegistry::new(
            Arc::new(TimeshiftRegistry::new(1.0)),
            Arc::new(StatsRegistry::new()),
        ));
        let pool = WorkerPool::new(2, registry);
        pool.submit(PathId(1), 0, 64);
        assert_eq!(pool.worker_count(), 2);
        drop(pool);
    }

    #[test]
    fn worker_count_is_at_least_one() {
        let registry = Arc::new(PathRegistry::new(
            Arc::new(TimeshiftRegistry::new(1.0)),
            Arc::new(StatsRegistry::new()),
        ));
        let pool = WorkerPool::new(0, registry);
        assert_eq!(pool.worker_count(), 1);
    }

    #[test]
    fn submit_and_wait_returns_once_every_path_has_ticked() {
        let registry = Arc::new(PathRegistry::new(
            Arc::new(TimeshiftRegistry::new(1.0)),
            Arc::new(StatsRegistry::new()),
        ));
        let pool = WorkerPool::new(4, registry);
        // Unknown paths still complete (the registry's tick is a no-op),
        // so this should return promptly rather than hang.
        pool.submit_and_wait(&[PathId(1), PathId(2), PathId(3)], 0, 64);
    }

    #[test]
    fn submit_and_wait_on_empty_list_returns_immediately() {
        let registry = Arc::new(PathRegistry::new(
            Arc::new(TimeshiftRegistry::new(1.0)),
            Arc::new(StatsRegistry::new()),
        ));
        let pool = WorkerPool::new(2, registry);
        pool.submit_and_wait(&[], 0, 64);
    }
}
