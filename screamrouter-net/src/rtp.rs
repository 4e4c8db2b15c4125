use std::collections::HashMap;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use screamrouter_codec::{parse_rtp_packet, SequenceTracker, DEFAULT_REORDER_WINDOW};
use screamrouter_stats::StatsRegistry;
use screamrouter_timeshift::{monotonic_now_ns, TimeshiftPacket, TimeshiftRegistry};
use tracing::{debug, info, warn};

use crate::error::NetError;
use crate::socket::{bind_udp, is_poll_timeout, ReceiverHandle};
use crate::supervisor::Receiver;

/// Largest RTP datagram this receiver accepts; payload length is implied by
/// the resolved `StreamFormat` and never exceeds one canonical 1152-byte
/// Scream payload plus the 12-byte RTP header.
const MAX_RTP_DATAGRAM: usize = 12 + screamrouter_codec::constants::PACKET_DATA_SIZE;

fn rtp_tag(ssrc: u32) -> String {
    format!("rtp:{ssrc:08x}")
}

/// RTP receiver. One `SequenceTracker` per SSRC, since reordering windows
/// are meaningful only within a single stream (spec §4.1).
pub struct RtpReceiver {
    socket: UdpSocket,
    registry: Arc<TimeshiftRegistry>,
    stats: Arc<StatsRegistry>,
    trackers: HashMap<u32, SequenceTracker>,
    malformed_packets: Arc<AtomicU64>,
    unknown_tag_drops: Arc<AtomicU64>,
    sequence_errors: Arc<AtomicU64>,
}

impl RtpReceiver {
    pub fn bind(
        addr: SocketAddr,
        registry: Arc<TimeshiftRegistry>,
        stats: Arc<StatsRegistry>,
    ) -> Result<Self, NetError> {
        Ok(Self {
            socket: bind_udp(addr)?,
            registry,
            stats,
            trackers: HashMap::new(),
            malformed_packets: Arc::new(AtomicU64::new(0)),
            unknown_tag_drops: Arc::new(AtomicU64::new(0)),
            sequence_errors: Arc::new(AtomicU64::new(0)),
        })
    }

    pub fn malformed_packets(&self) -> u64 {
        self.malformed_packets.load(Ordering::Relaxed)
    }

    pub fn unknown_tag_drops(&self) -> u64 {
        self.unknown_tag_drops.load(Ordering::Relaxed)
    }

    pub fn sequence_errors(&self) -> u64 {
        self.sequence_errors.load(Ordering::Relaxed)
    }

    pub fn receive_once(&mut self) -> Result<bool, NetError> {
        let mut buf = [0u8; MAX_RTP_DATAGRAM];
        let len = match self.socket.recv(&mut buf) {
            Ok(len) => len,
            Err(err) if is_poll_timeout(&err) => return Ok(false),
            Err(err) => return Err(NetError::Fatal(err)),
        };

        let packet = match parse_rtp_packet(&buf[..len]) {
            Ok(packet) => packet,
            Err(err) => {
                self.malformed_packets.fetch_add(1, Ordering::Relaxed);
                debug!(?err, "dropping malformed rtp packet");
                return Ok(true);
            }
        };

        let tracker = self
            .trackers
            .entry(packet.ssrc)
            .or_insert_with(|| SequenceTracker::new(DEFAULT_REORDER_WINDOW));
        if let Err(err) = tracker.accept(packet.sequence) {
            self.sequence_errors.fetch_add(1, Ordering::Relaxed);
            debug!(?err, "dropping out-of-window rtp packet");
            return Ok(true);
        }

        let tag = rtp_tag(packet.ssrc);
        let Some(buffer) = self.registry.get(&tag) else {
            self.unknown_tag_drops.fetch_add(1, Ordering::Relaxed);
            return Ok(true);
        };

        let mut payload = [0u8; screamrouter_codec::constants::PACKET_DATA_SIZE];
        let copy_len = packet.payload.len().min(payload.len());
        payload[..copy_len].copy_from_slice(&packet.payload[..copy_len]);
        buffer.append(TimeshiftPacket::new(monotonic_now_ns(), packet.format, payload));
        self.stats.tag(&tag).record_packet();
        Ok(true)
    }

    pub fn spawn(mut self) -> ReceiverHandle {
        let shutdown = Arc::new(AtomicBool::new(false));
        let loop_shutdown = shutdown.clone();
        let join = thread::Builder::new()
            .name("rtp-receiver".into())
            .spawn(move || {
                info!("rtp receiver started");
                while !loop_shutdown.load(Ordering::Relaxed) {
                    match self.receive_once() {
                        Ok(_) => {}
                        Err(err) => {
                            warn!(?err, "rtp receiver terminating on fatal error");
                            break;
                        }
                    }
                }
                info!("rtp receiver stopped");
            })
            .expect("spawning receiver thread");
        ReceiverHandle::new(shutdown, join)
    }
}

impl Receiver for RtpReceiver {
    fn receive_once(&mut self) -> Result<bool, NetError> {
        RtpReceiver::receive_once(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use screamrouter_codec::build_rtp_packet;
    use std::net::UdpSocket as StdUdpSocket;

    #[test]
    fn known_tag_buffers_the_packet() {
        let registry = Arc::new(TimeshiftRegistry::new(1.0));
        let stats = Arc::new(StatsRegistry::new());
        let mut receiver =
            RtpReceiver::bind("127.0.0.1:0".parse().unwrap(), registry.clone(), stats.clone())
                .unwrap();
        let addr = receiver.socket.local_addr().unwrap();
        let buffer = registry.get_or_create(&rtp_tag(0xCAFEBABE));

        let sender = StdUdpSocket::bind("127.0.0.1:0").unwrap();
        let payload = vec![0x5u8; screamrouter_codec::constants::PACKET_DATA_SIZE];
        let datagram = build_rtp_packet(96, 1, 0, 0xCAFEBABE, &payload);
        sender.send_to(&datagram, addr).unwrap();

        assert!(receiver.receive_once().unwrap());
        assert_eq!(buffer.len(), 1);
        assert_eq!(stats.tag(&rtp_tag(0xCAFEBABE)).packets_received(), 1);
    }

    #[test]
    fn far_out_of_window_sequence_is_dropped() {
        let registry = Arc::new(TimeshiftRegistry::new(1.0));
        let stats = Arc::new(StatsRegistry::new());
        let mut receiver =
            RtpReceiver::bind("127.0.0.1:0".parse().unwrap(), registry.clone(), stats).unwrap();
        let addr = receiver.socket.local_addr().unwrap();
        registry.get_or_create(&rtp_tag(42));

        let sender = StdUdpSocket::bind("127.0.0.1:0").unwrap();
        let payload = vec![0u8; screamrouter_codec::constants::PACKET_DATA_SIZE];
        sender.send_to(&build_rtp_packet(96, 0, 0, 42, &payload), addr).unwrap();
        receiver.receive_once().unwrap();
        sender.send_to(&build_rtp_packet(96, 10_000, 0, 42, &payload), addr).unwrap();
        receiver.receive_once().unwrap();

        assert_eq!(receiver.sequence_errors(), 1);
    }
}
