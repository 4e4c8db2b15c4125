use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use screamrouter_codec::constants::PACKET_SIZE;
use screamrouter_codec::parse_scream_packet;
use screamrouter_stats::StatsRegistry;
use screamrouter_timeshift::{monotonic_now_ns, TimeshiftPacket, TimeshiftRegistry};
use tracing::{debug, info, warn};

use crate::error::NetError;
use crate::socket::{bind_udp, is_poll_timeout, ReceiverHandle};
use crate::supervisor::Receiver;

/// Unicast/multicast Scream receiver: one UDP socket, one thread. Extracts
/// the sender's IP as the `source_tag` (spec §4.2/§9 — treated opaquely; the
/// per-process convention question does not apply to this variant).
pub struct ScreamReceiver {
    socket: UdpSocket,
    registry: Arc<TimeshiftRegistry>,
    stats: Arc<StatsRegistry>,
    malformed_packets: Arc<AtomicU64>,
    unknown_tag_drops: Arc<AtomicU64>,
}

impl ScreamReceiver {
    pub fn bind(
        addr: SocketAddr,
        registry: Arc<TimeshiftRegistry>,
        stats: Arc<StatsRegistry>,
    ) -> Result<Self, NetError> {
        Ok(Self {
            socket: bind_udp(addr)?,
            registry,
            stats,
            malformed_packets: Arc::new(AtomicU64::new(0)),
            unknown_tag_drops: Arc::new(AtomicU64::new(0)),
        })
    }

    pub fn malformed_packets(&self) -> u64 {
        self.malformed_packets.load(Ordering::Relaxed)
    }

    pub fn unknown_tag_drops(&self) -> u64 {
        self.unknown_tag_drops.load(Ordering::Relaxed)
    }

    /// Blocks on one datagram (bounded by the socket's poll timeout),
    /// parses it, and appends it to the sender tag's timeshift buffer if one
    /// exists. Returns `Ok(true)` if a packet was processed, `Ok(false)` on
    /// a poll-timeout wakeup with nothing to do, and `Err` on a fatal socket
    /// failure (spec §7 `FatalReceiverError`).
    pub fn receive_once(&mut self) -> Result<bool, NetError> {
        let mut buf = [0u8; PACKET_SIZE];
        let (len, from) = match self.socket.recv_from(&mut buf) {
            Ok(pair) => pair,
            Err(err) if is_poll_timeout(&err) => return Ok(false),
            Err(err) => return Err(NetError::Fatal(err)),
        };

        let packet = match parse_scream_packet(&buf[..len]) {
            Ok(packet) => packet,
            Err(err) => {
                self.malformed_packets.fetch_add(1, Ordering::Relaxed);
                debug!(?err, "dropping malformed scream packet");
                return Ok(true);
            }
        };

        let tag = from.ip().to_string();
        let Some(buffer) = self.registry.get(&tag) else {
            self.unknown_tag_drops.fetch_add(1, Ordering::Relaxed);
            return Ok(true);
        };

        let mut payload = [0u8; screamrouter_codec::constants::PACKET_DATA_SIZE];
        payload.copy_from_slice(packet.payload);
        buffer.append(TimeshiftPacket::new(monotonic_now_ns(), packet.format, payload));
        self.stats.tag(&tag).record_packet();
        Ok(true)
    }

    /// Spawns the receive loop on its own thread, running until
    /// [`ReceiverHandle::stop`] is called or a fatal socket error occurs.
    pub fn spawn(self) -> ReceiverHandle {
        let shutdown = Arc::new(AtomicBool::new(false));
        let loop_shutdown = shutdown.clone();
        let join = thread::Builder::new()
            .name("scream-receiver".into())
            .spawn(move || {
                info!("scream receiver started");
                while !loop_shutdown.load(Ordering::Relaxed) {
                    match self.receive_once() {
                        Ok(_) => {}
                        Err(err) => {
                            warn!(?err, "scream receiver terminating on fatal error");
                            break;
                        }
                    }
                }
                info!("scream receiver stopped");
            })
            .expect("spawning receiver thread");
        ReceiverHandle::new(shutdown, join)
    }
}

impl Receiver for ScreamReceiver {
    fn receive_once(&mut self) -> Result<bool, NetError> {
        ScreamReceiver::receive_once(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use screamrouter_codec::{build_scream_packet, StreamFormat};
    use std::net::UdpSocket as StdUdpSocket;

    fn local_addr(socket: &UdpSocket) -> SocketAddr {
        socket.local_addr().unwrap()
    }

    #[test]
    fn unknown_tag_is_dropped_and_counted() {
        let registry = Arc::new(TimeshiftRegistry::new(1.0));
        let stats = Arc::new(StatsRegistry::new());
        let mut receiver =
            ScreamReceiver::bind("127.0.0.1:0".parse().unwrap(), registry, stats).unwrap();
        let addr = local_addr(&receiver.socket);

        let sender = StdUdpSocket::bind("127.0.0.1:0").unwrap();
        let format = StreamFormat::new(48_000, 16, 2).unwrap();
        let payload = vec![0u8; screamrouter_codec::constants::PACKET_DATA_SIZE];
        let datagram = build_scream_packet(&format, &payload).unwrap();
        sender.send_to(&datagram, addr).unwrap();

        assert!(receiver.receive_once().unwrap());
        assert_eq!(receiver.unknown_tag_drops(), 1);
    }

    #[test]
    fn known_tag_buffers_the_packet() {
        let registry = Arc::new(TimeshiftRegistry::new(1.0));
        let stats = Arc::new(StatsRegistry::new());
        let mut receiver =
            ScreamReceiver::bind("127.0.0.1:0".parse().unwrap(), registry.clone(), stats.clone())
                .unwrap();
        let addr = local_addr(&receiver.socket);

        let sender = StdUdpSocket::bind("127.0.0.1:0").unwrap();
        let sender_tag = sender.local_addr().unwrap().ip().to_string();
        let buffer = registry.get_or_create(&sender_tag);

        let format = StreamFormat::new(48_000, 16, 2).unwrap();
        let payload = vec![0x7Fu8; screamrouter_codec::constants::PACKET_DATA_SIZE];
        let datagram = build_scream_packet(&format, &payload).unwrap();
        sender.send_to(&datagram, addr).unwrap();

        assert!(receiver.receive_once().unwrap());
        assert_eq!(buffer.len(), 1);
        assert_eq!(stats.tag(&sender_tag).packets_received(), 1);
    }

    #[test]
    fn malformed_packet_is_dropped_and_counted() {
        let registry = Arc::new(TimeshiftRegistry::new(1.0));
        let stats = Arc::new(StatsRegistry::new());
        let mut receiver =
            ScreamReceiver::bind("127.0.0.1:0".parse().unwrap(), registry, stats).unwrap();
        let addr = local_addr(&receiver.socket);

        let sender = StdUdpSocket::bind("127.0.0.1:0").unwrap();
        sender.send_to(&[0u8; PACKET_SIZE], addr).unwrap(); // all-zero header: bit depth 0 is invalid

        assert!(receiver.receive_once().unwrap());
        assert_eq!(receiver.malformed_packets(), 1);
    }
}
