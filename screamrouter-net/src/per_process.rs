use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use screamrouter_codec::constants::PER_PROCESS_PACKET_SIZE;
use screamrouter_codec::parse_per_process_packet;
use screamrouter_stats::StatsRegistry;
use screamrouter_timeshift::{monotonic_now_ns, TimeshiftPacket, TimeshiftRegistry};
use tracing::{debug, info, warn};

use crate::error::NetError;
use crate::socket::{bind_udp, is_poll_timeout, ReceiverHandle};
use crate::supervisor::Receiver;

/// Per-process Scream receiver. The packet's own 45-byte tag field is used
/// as the `source_tag` verbatim — per spec §9's open question, this
/// implementation treats whatever string the sender embeds (bare IP or
/// `IP:process`) as opaque and does not normalize it; route wiring is the
/// operator's responsibility to match what the deployed sources emit.
pub struct PerProcessReceiver {
    socket: UdpSocket,
    registry: Arc<TimeshiftRegistry>,
    stats: Arc<StatsRegistry>,
    malformed_packets: Arc<AtomicU64>,
    unknown_tag_drops: Arc<AtomicU64>,
}

impl PerProcessReceiver {
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

    pub fn receive_once(&mut self) -> Result<bool, NetError> {
        let mut buf = [0u8; PER_PROCESS_PACKET_SIZE];
        let len = match self.socket.recv(&mut buf) {
            Ok(len) => len,
            Err(err) if is_poll_timeout(&err) => return Ok(false),
            Err(err) => return Err(NetError::Fatal(err)),
        };

        let packet = match parse_per_process_packet(&buf[..len]) {
            Ok(packet) => packet,
            Err(err) => {
                self.malformed_packets.fetch_add(1, Ordering::Relaxed);
                debug!(?err, "dropping malformed per-process packet");
                return Ok(true);
            }
        };

        let Some(buffer) = self.registry.get(&packet.tag) else {
            self.unknown_tag_drops.fetch_add(1, Ordering::Relaxed);
            return Ok(true);
        };

        let mut payload = [0u8; screamrouter_codec::constants::PACKET_DATA_SIZE];
        payload.copy_from_slice(packet.payload);
        buffer.append(TimeshiftPacket::new(monotonic_now_ns(), packet.format, payload));
        self.stats.tag(&packet.tag).record_packet();
        Ok(true)
    }

    pub fn spawn(self) -> ReceiverHandle {
        let shutdown = Arc::new(AtomicBool::new(false));
        let loop_shutdown = shutdown.clone();
        let join = thread::Builder::new()
            .name("per-process-receiver".into())
            .spawn(move || {
                info!("per-process receiver started");
                while !loop_shutdown.load(Ordering::Relaxed) {
                    match self.receive_once() {
                        Ok(_) => {}
                        Err(err) => {
                            warn!(?err, "per-process receiver terminating on fatal error");
                            break;
                        }
                    }
                }
                info!("per-process receiver stopped");
            })
            .expect("spawning receiver thread");
        ReceiverHandle::new(shutdown, join)
    }
}

impl Receiver for PerProcessReceiver {
    fn receive_once(&mut self) -> Result<bool, NetError> {
        PerProcessReceiver::receive_once(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use screamrouter_codec::{build_per_process_packet, StreamFormat};
    use std::net::UdpSocket as StdUdpSocket;

    #[test]
    fn known_tag_buffers_the_packet() {
        let registry = Arc::new(TimeshiftRegistry::new(1.0));
        let stats = Arc::new(StatsRegistry::new());
        let mut receiver = PerProcessReceiver::bind(
            "127.0.0.1:0".parse().unwrap(),
            registry.clone(),
            stats.clone(),
        )
        .unwrap();
        let addr = receiver.socket.local_addr().unwrap();
        let buffer = registry.get_or_create("10.0.0.5:firefox.exe");

        let sender = StdUdpSocket::bind("127.0.0.1:0").unwrap();
        let format = StreamFormat::new(48_000, 16, 2).unwrap();
        let payload = vec![0x11u8; screamrouter_codec::constants::PACKET_DATA_SIZE];
        let datagram =
            build_per_process_packet(&format, "10.0.0.5:firefox.exe", &payload).unwrap();
        sender.send_to(&datagram, addr).unwrap();

        assert!(receiver.receive_once().unwrap());
        assert_eq!(buffer.len(), 1);
        assert_eq!(stats.tag("10.0.0.5:firefox.exe").packets_received(), 1);
    }

    #[test]
    fn unknown_tag_is_dropped_and_counted() {
        let registry = Arc::new(TimeshiftRegistry::new(1.0));
        let stats = Arc::new(StatsRegistry::new());
        let mut receiver =
            PerProcessReceiver::bind("127.0.0.1:0".parse().unwrap(), registry, stats).unwrap();
        let addr = receiver.socket.local_addr().unwrap();

        let sender = StdUdpSocket::bind("127.0.0.1:0").unwrap();
        let format = StreamFormat::new(48_000, 16, 2).unwrap();
        let payload = vec![0u8; screamrouter_codec::constants::PACKET_DATA_SIZE];
        let datagram = build_per_process_packet(&format, "nobody:listens", &payload).unwrap();
        sender.send_to(&datagram, addr).unwrap();

        assert!(receiver.receive_once().unwrap());
        assert_eq!(receiver.unknown_tag_drops(), 1);
    }
}
