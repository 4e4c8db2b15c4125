//! Canonical packet sizes for the Scream protocol family.
//!
//! Taken verbatim from the upstream project's `constants.py`: the payload
//! is always 1152 bytes regardless of bit depth or channel count, and the
//! per-process variant inserts a fixed 45-byte NUL-padded ASCII tag between
//! the header and the payload.

pub const PACKET_HEADER_SIZE: usize = 5;
pub const PACKET_DATA_SIZE: usize = 1152;
pub const PACKET_SIZE: usize = PACKET_HEADER_SIZE + PACKET_DATA_SIZE;

pub const TAG_MAX_LENGTH: usize = 45;
pub const PER_PROCESS_PACKET_SIZE: usize = PACKET_SIZE + TAG_MAX_LENGTH;

pub const SCREAM_RECEIVER_PORT: u16 = 16401;
pub const SCREAM_PER_PROCESS_RECEIVER_PORT: u16 = 16402;
pub const RTP_RECEIVER_PORT: u16 = 40000;
pub const DEFAULT_SINK_PORT: u16 = 4010;

pub const SCREAM_MULTICAST_GROUP: &str = "239.255.77.77";
pub const SCREAM_MULTICAST_PORT: u16 = 4010;
