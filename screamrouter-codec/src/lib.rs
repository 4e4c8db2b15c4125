//! Wire codec for the Scream/RTP packet family.
//!
//! This crate has no knowledge of sockets, threads, or the audio plane's
//! processing pipeline — it only parses and frames bytes. Receivers
//! (`screamrouter-net`) and the sink mixer (`screamrouter-mixer`) are the
//! two call sites on either end of the wire.

pub mod constants;
mod error;
mod format;
mod rtp;
mod scream;

pub use error::CodecError;
pub use format::{decode_header, encode_header, StreamFormat};
pub use rtp::{
    build_rtp_packet, parse_rtp_packet, payload_type_for_format, RtpPacket, SequenceTracker,
    DEFAULT_REORDER_WINDOW,
};
pub use scream::{
    build_per_process_packet, build_scream_packet, parse_per_process_packet, parse_scream_packet,
    PerProcessPacket, ScreamPacket,
};
