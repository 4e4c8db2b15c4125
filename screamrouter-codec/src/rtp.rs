use crate::error::CodecError;
use crate::format::StreamFormat;

const RTP_HEADER_LEN: usize = 12;

/// Default bounded reordering window, in sequence-number steps, tolerated
/// before a packet is considered too far out of order to place.
pub const DEFAULT_REORDER_WINDOW: u16 = 64;

/// A decoded RTP packet header plus the format resolved from its payload
/// type, and a view of the payload bytes.
#[derive(Debug, Clone)]
pub struct RtpPacket<'a> {
    pub payload_type: u8,
    pub sequence: u16,
    pub ssrc: u32,
    pub format: StreamFormat,
    pub payload: &'a [u8],
}

/// Maps an RTP payload type to the `StreamFormat` it carries. This mirrors
/// a static lookup table of the handful of PCM payload types this router
/// understands (dynamic payload types used for Scream-over-RTP default to
/// 48kHz/16-bit/stereo; L16/L24/L32 follow RFC 3551 conventions extended to
/// the higher depths this project carries).
fn format_for_payload_type(payload_type: u8) -> Result<StreamFormat, CodecError> {
    match payload_type {
        10 => StreamFormat::new(44_100, 16, 2), // L16 stereo, RFC 3551
        11 => StreamFormat::new(44_100, 16, 1), // L16 mono, RFC 3551
        96 => StreamFormat::new(48_000, 16, 2), // dynamic: Scream-over-RTP default
        97 => StreamFormat::new(48_000, 24, 2),
        98 => StreamFormat::new(48_000, 32, 2),
        99 => StreamFormat::new(96_000, 24, 2),
        other => Err(CodecError::UnknownPayloadType(other)),
    }
}

/// Dynamic payload type used for sink formats that have no entry in the
/// static table above. RFC 3551 reserves 96-127 for dynamic assignment;
/// a receiver on the other end is expected to already know the format out
/// of band (this router's own RTP sinks, configured by `DesiredState`).
const DYNAMIC_PAYLOAD_TYPE: u8 = 127;

/// Inverse of [`format_for_payload_type`]: picks the static payload type
/// that exactly matches `format`, falling back to [`DYNAMIC_PAYLOAD_TYPE`]
/// for anything the static table does not cover.
pub fn payload_type_for_format(format: &StreamFormat) -> u8 {
    for candidate in [10u8, 11, 96, 97, 98, 99] {
        if let Ok(candidate_format) = format_for_payload_type(candidate) {
            if candidate_format == *format {
                return candidate;
            }
        }
    }
    DYNAMIC_PAYLOAD_TYPE
}

/// Builds a minimal RTP datagram (version 2, no extensions/CSRCs) carrying
/// `payload` under `payload_type`, with the given `sequence`/`timestamp`/
/// `ssrc` fields. The mirror of [`parse_rtp_packet`].
pub fn build_rtp_packet(
    payload_type: u8,
    sequence: u16,
    timestamp: u32,
    ssrc: u32,
    payload: &[u8],
) -> Vec<u8> {
    let mut out = Vec::with_capacity(RTP_HEADER_LEN + payload.len());
    out.push(0x80); // V=2, P=0, X=0, CC=0
    out.push(payload_type & 0x7f); // M=0
    out.extend_from_slice(&sequence.to_be_bytes());
    out.extend_from_slice(&timestamp.to_be_bytes());
    out.extend_from_slice(&ssrc.to_be_bytes());
    out.extend_from_slice(payload);
    out
}

/// Parses a raw RTP datagram. Payload length is implied by the resolved
/// format and is not independently validated beyond "header fits".
pub fn parse_rtp_packet(bytes: &[u8]) -> Result<RtpPacket<'_>, CodecError> {
    if bytes.len() < RTP_HEADER_LEN {
        return Err(CodecError::LengthMismatch {
            expected: RTP_HEADER_LEN,
            actual: bytes.len(),
        });
    }
    let payload_type = bytes[1] & 0x7f;
    let sequence = u16::from_be_bytes([bytes[2], bytes[3]]);
    let ssrc = u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
    let format = format_for_payload_type(payload_type)?;
    Ok(RtpPacket {
        payload_type,
        sequence,
        ssrc,
        format,
        payload: &bytes[RTP_HEADER_LEN..],
    })
}

/// Tracks the expected next sequence number for one RTP source and rejects
/// packets that fall outside a bounded reordering window, per spec §4.1.
pub struct SequenceTracker {
    expected: Option<u16>,
    window: u16,
}

impl SequenceTracker {
    pub fn new(window: u16) -> Self {
        Self {
            expected: None,
            window,
        }
    }

    /// Accepts the next sequence number seen, returning an error if it falls
    /// outside the reordering window around the previously expected value.
    /// On success, advances the expected value to `seq + 1`.
    pub fn accept(&mut self, seq: u16) -> Result<(), CodecError> {
        if let Some(expected) = self.expected {
            let forward_distance = seq.wrapping_sub(expected);
            // Accept anything within the window either ahead of or behind
            // `expected` (wrapping arithmetic handles u16 rollover).
            if forward_distance > self.window && forward_distance < u16::MAX - self.window {
                return Err(CodecError::SequenceOutOfWindow { seq, expected });
            }
        }
        self.expected = Some(seq.wrapping_add(1));
        Ok(())
    }
}
