use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::error::NetError;

/// Receivers poll this between blocking reads rather than truly closing the
/// socket out from under the read (std's `UdpSocket` offers no portable way
/// to do that from another thread); a short read timeout keeps shutdown
/// latency bounded without spinning.
const POLL_TIMEOUT: Duration = Duration::from_millis(200);

pub fn bind_udp(addr: SocketAddr) -> Result<UdpSocket, NetError> {
    let socket = UdpSocket::bind(addr).map_err(|source| NetError::Bind {
        addr: addr.to_string(),
        source,
    })?;
    socket
        .set_read_timeout(Some(POLL_TIMEOUT))
        .map_err(|source| NetError::Bind {
            addr: addr.to_string(),
            source,
        })?;
    Ok(socket)
}

/// A running receiver thread plus the flag that tells it to stop. Dropping
/// this without calling [`ReceiverHandle::stop`] leaves the thread running
/// (mirroring spec §5's "receivers shut down by closing their socket", here
/// approximated by a cooperative poll flag since that is the idiomatic
/// portable equivalent in sync Rust).
pub struct ReceiverHandle {
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl ReceiverHandle {
    pub fn new(shutdown: Arc<AtomicBool>, join: JoinHandle<()>) -> Self {
        Self {
            shutdown,
            join: Some(join),
        }
    }

    /// Signals the receiver's run loop to exit and joins its thread. The
    /// loop notices within one [`POLL_TIMEOUT`] tick.
    pub fn stop(mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// True if `err` is the expected wakeup from the read-timeout poll rather
/// than a genuine socket failure.
pub fn is_poll_timeout(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
    )
}
