use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{error, warn};

use crate::error::NetError;

/// Anything that can receive one datagram and report whether it processed
/// it, was woken spuriously, or hit a fatal error. Implemented by
/// [`crate::ScreamReceiver`], [`crate::PerProcessReceiver`] and
/// [`crate::RtpReceiver`].
pub trait Receiver {
    fn receive_once(&mut self) -> Result<bool, NetError>;
}

/// Backoff applied between restart attempts, so a persistently failing bind
/// (e.g. port already in use) does not spin a CPU core.
const RESTART_BACKOFF: Duration = Duration::from_millis(500);

/// Runs a receiver's loop and recreates it from `factory` whenever it exits
/// with a fatal error, per spec §4.2/§9: "socket errors other than
/// EAGAIN/EWOULDBLOCK terminate the receiver with a logged fatal; the
/// supervisor restarts it." `factory` is called once up front and again
/// after every fatal error; it is expected to rebuild the receiver against
/// the live registry/stats state the caller closed over.
pub struct Supervisor {
    shutdown: Arc<AtomicBool>,
    restarts: Arc<AtomicU64>,
    join: Option<thread::JoinHandle<()>>,
}

impl Supervisor {
    pub fn spawn<R, F>(name: &'static str, mut factory: F) -> Self
    where
        R: Receiver,
        F: FnMut() -> Result<R, NetError> + Send + 'static,
    {
        let shutdown = Arc::new(AtomicBool::new(false));
        let restarts = Arc::new(AtomicU64::new(0));
        let loop_shutdown = shutdown.clone();
        let loop_restarts = restarts.clone();

        let join = thread::Builder::new()
            .name(format!("supervisor-{name}"))
            .spawn(move || {
                while !loop_shutdown.load(Ordering::Relaxed) {
                    let mut receiver = match factory() {
                        Ok(receiver) => receiver,
                        Err(err) => {
                            error!(%name, ?err, "failed to (re)create receiver, backing off");
                            thread::sleep(RESTART_BACKOFF);
                            continue;
                        }
                    };

                    loop {
                        if loop_shutdown.load(Ordering::Relaxed) {
                            return;
                        }
                        match receiver.receive_once() {
                            Ok(_) => {}
                            Err(err) => {
                                warn!(%name, ?err, "receiver failed fatally, restarting");
                                loop_restarts.fetch_add(1, Ordering::Relaxed);
                                thread::sleep(RESTART_BACKOFF);
                                break;
                            }
                        }
                    }
                }
            })
            .expect("spawning supervisor thread");

        Self {
            shutdown,
            restarts,
            join: Some(join),
        }
    }

    pub fn restart_count(&self) -> u64 {
        self.restarts.load(Ordering::Relaxed)
    }

    pub fn stop(mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct FlakyReceiver {
        calls: Arc<AtomicUsize>,
    }

    impl Receiver for FlakyReceiver {
        fn receive_once(&mut self) -> Result<bool, NetError> {
            let n = self.calls.fetch_add(1, Ordering::Relaxed);
            if n == 0 {
                Err(NetError::Fatal(std::io::Error::other("boom")))
            } else {
                thread::sleep(Duration::from_millis(10));
                Ok(false)
            }
        }
    }

    #[test]
    fn restarts_after_fatal_error() {
        let calls = Arc::new(AtomicUsize::new(0));
        let factory_calls = calls.clone();
        let supervisor = Supervisor::spawn("test", move || {
            Ok::<_, NetError>(FlakyReceiver {
                calls: factory_calls.clone(),
            })
        });
        thread::sleep(Duration::from_millis(100));
        supervisor.stop();
        assert!(calls.load(Ordering::Relaxed) >= 2);
    }
}
