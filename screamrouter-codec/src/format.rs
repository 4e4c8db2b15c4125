use crate::error::CodecError;
use serde::{Deserialize, Serialize};

/// Normalized description of a PCM stream, decoded from a Scream/RTP header.
///
/// Equality ignores `channel_layout_bits`: two formats that agree on rate,
/// depth and channel count are interchangeable for every purpose the audio
/// plane cares about (resampler selection, quantizer selection, mixing);
/// the layout mask is carried only so it can be reproduced verbatim on
/// egress.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StreamFormat {
    pub sample_rate: u32,
    pub bit_depth: u8,
    pub channels: u8,
    pub channel_layout_bits: [u8; 2],
}

impl PartialEq for StreamFormat {
    fn eq(&self, other: &Self) -> bool {
        self.sample_rate == other.sample_rate
            && self.bit_depth == other.bit_depth
            && self.channels == other.channels
    }
}
impl Eq for StreamFormat {}

impl StreamFormat {
    pub fn new(sample_rate: u32, bit_depth: u8, channels: u8) -> Result<Self, CodecError> {
        validate_bit_depth(bit_depth)?;
        validate_channels(channels)?;
        Ok(Self {
            sample_rate,
            bit_depth,
            channels,
            channel_layout_bits: [0, 0],
        })
    }

    /// Bytes occupied by one interleaved frame (one sample per channel).
    pub fn bytes_per_frame(&self) -> usize {
        (self.bit_depth as usize / 8) * self.channels as usize
    }

    /// Number of interleaved frames carried in a canonical 1152-byte payload.
    pub fn frames_per_packet(&self, payload_len: usize) -> usize {
        payload_len / self.bytes_per_frame().max(1)
    }
}

fn validate_bit_depth(bit_depth: u8) -> Result<(), CodecError> {
    match bit_depth {
        16 | 24 | 32 => Ok(()),
        other => Err(CodecError::InvalidBitDepth(other)),
    }
}

fn validate_channels(channels: u8) -> Result<(), CodecError> {
    if (1..=8).contains(&channels) {
        Ok(())
    } else {
        Err(CodecError::InvalidChannelCount(channels))
    }
}

/// Decodes the 5-byte Scream header.
///
/// Byte 0: bit 7 selects the base rate (1 -> 44100, 0 -> 48000); bits 0..6
/// are an unsigned multiplier, treated as 1 when the field is zero. Byte 1
/// is the bit depth, byte 2 the channel count, bytes 3-4 an opaque
/// WAVEFORMATEXTENSIBLE channel mask preserved verbatim on egress.
pub fn decode_header(header: &[u8; 5]) -> Result<StreamFormat, CodecError> {
    let base = if header[0] & 0x80 != 0 { 44_100 } else { 48_000 };
    let mut k = header[0] & 0x7f;
    if k == 0 {
        k = 1;
    }
    if !matches!(k, 1 | 2 | 4) {
        return Err(CodecError::InvalidMultiplier(k));
    }
    let sample_rate = base * k as u32;
    let bit_depth = header[1];
    let channels = header[2];
    validate_bit_depth(bit_depth)?;
    validate_channels(channels)?;
    Ok(StreamFormat {
        sample_rate,
        bit_depth,
        channels,
        channel_layout_bits: [header[3], header[4]],
    })
}

/// Encodes a `StreamFormat` back into a 5-byte Scream header. The inverse of
/// [`decode_header`]; `encode_header(decode_header(h)) == h` for every valid
/// header (layout bytes preserved verbatim).
pub fn encode_header(format: &StreamFormat) -> Result<[u8; 5], CodecError> {
    validate_bit_depth(format.bit_depth)?;
    validate_channels(format.channels)?;
    let (base_bit, k) = if format.sample_rate % 44_100 == 0 {
        (0x80u8, format.sample_rate / 44_100)
    } else if format.sample_rate % 48_000 == 0 {
        (0x00u8, format.sample_rate / 48_000)
    } else {
        return Err(CodecError::InvalidMultiplier(0));
    };
    let k = k as u8;
    if !matches!(k, 1 | 2 | 4) {
        return Err(CodecError::InvalidMultiplier(k));
    }
    Ok([
        base_bit | k,
        format.bit_depth,
        format.channels,
        format.channel_layout_bits[0],
        format.channel_layout_bits[1],
    ])
}
