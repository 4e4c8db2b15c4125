use thiserror::Error;

/// Failure modes for decoding a wire packet.
///
/// All variants are local to a single packet: callers drop the packet and
/// increment a counter rather than propagating these further up the stack.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum CodecError {
    #[error("packet length {actual} does not match expected {expected}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("unsupported bit depth {0}")]
    InvalidBitDepth(u8),

    #[error("channel count {0} out of range 1..=8")]
    InvalidChannelCount(u8),

    #[error("multiplier {0} is not one of 1, 2, 4")]
    InvalidMultiplier(u8),

    #[error("unknown RTP payload type {0}")]
    UnknownPayloadType(u8),

    #[error("RTP sequence {seq} outside the reordering window around {expected}")]
    SequenceOutOfWindow { seq: u16, expected: u16 },
}
