use crate::constants::{PACKET_DATA_SIZE, PACKET_HEADER_SIZE, PACKET_SIZE, PER_PROCESS_PACKET_SIZE, TAG_MAX_LENGTH};
use crate::error::CodecError;
use crate::format::{decode_header, encode_header, StreamFormat};

/// A decoded Scream (unicast/multicast) datagram: header plus the raw
/// 1152-byte PCM payload, not yet converted to float.
#[derive(Debug, Clone)]
pub struct ScreamPacket<'a> {
    pub format: StreamFormat,
    pub payload: &'a [u8],
}

/// Parses a raw Scream datagram. `bytes` must be exactly
/// [`crate::constants::PACKET_SIZE`] long.
pub fn parse_scream_packet(bytes: &[u8]) -> Result<ScreamPacket<'_>, CodecError> {
    if bytes.len() != PACKET_SIZE {
        return Err(CodecError::LengthMismatch {
            expected: PACKET_SIZE,
            actual: bytes.len(),
        });
    }
    let mut header = [0u8; PACKET_HEADER_SIZE];
    header.copy_from_slice(&bytes[..PACKET_HEADER_SIZE]);
    let format = decode_header(&header)?;
    Ok(ScreamPacket {
        format,
        payload: &bytes[PACKET_HEADER_SIZE..],
    })
}

/// Builds an egress Scream datagram from a format and a 1152-byte payload.
pub fn build_scream_packet(format: &StreamFormat, payload: &[u8]) -> Result<Vec<u8>, CodecError> {
    if payload.len() != PACKET_DATA_SIZE {
        return Err(CodecError::LengthMismatch {
            expected: PACKET_DATA_SIZE,
            actual: payload.len(),
        });
    }
    let header = encode_header(format)?;
    let mut out = Vec::with_capacity(PACKET_SIZE);
    out.extend_from_slice(&header);
    out.extend_from_slice(payload);
    Ok(out)
}

/// A decoded per-process Scream datagram: header, a 45-byte NUL-padded ASCII
/// process tag, and the PCM payload.
#[derive(Debug, Clone)]
pub struct PerProcessPacket<'a> {
    pub format: StreamFormat,
    pub tag: String,
    pub payload: &'a [u8],
}

/// Parses a raw per-process Scream datagram. `bytes` must be exactly
/// [`crate::constants::PER_PROCESS_PACKET_SIZE`] long.
pub fn parse_per_process_packet(bytes: &[u8]) -> Result<PerProcessPacket<'_>, CodecError> {
    if bytes.len() != PER_PROCESS_PACKET_SIZE {
        return Err(CodecError::LengthMismatch {
            expected: PER_PROCESS_PACKET_SIZE,
            actual: bytes.len(),
        });
    }
    let mut header = [0u8; PACKET_HEADER_SIZE];
    header.copy_from_slice(&bytes[..PACKET_HEADER_SIZE]);
    let format = decode_header(&header)?;
    let tag_bytes = &bytes[PACKET_HEADER_SIZE..PACKET_HEADER_SIZE + TAG_MAX_LENGTH];
    let tag_end = tag_bytes.iter().position(|&b| b == 0).unwrap_or(tag_bytes.len());
    let tag = String::from_utf8_lossy(&tag_bytes[..tag_end]).into_owned();
    let payload = &bytes[PACKET_HEADER_SIZE + TAG_MAX_LENGTH..];
    Ok(PerProcessPacket { format, tag, payload })
}

/// Builds an egress per-process datagram. The tag is NUL-padded/truncated to
/// [`crate::constants::TAG_MAX_LENGTH`] ASCII bytes.
pub fn build_per_process_packet(
    format: &StreamFormat,
    tag: &str,
    payload: &[u8],
) -> Result<Vec<u8>, CodecError> {
    if payload.len() != PACKET_DATA_SIZE {
        return Err(CodecError::LengthMismatch {
            expected: PACKET_DATA_SIZE,
            actual: payload.len(),
        });
    }
    let header = encode_header(format)?;
    let mut tag_field = [0u8; TAG_MAX_LENGTH];
    let tag_bytes = tag.as_bytes();
    let copy_len = tag_bytes.len().min(TAG_MAX_LENGTH);
    tag_field[..copy_len].copy_from_slice(&tag_bytes[..copy_len]);

    let mut out = Vec::with_capacity(PER_PROCESS_PACKET_SIZE);
    out.extend_from_slice(&header);
    out.extend_from_slice(&tag_field);
    out.extend_from_slice(payload);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_format() -> StreamFormat {
        StreamFormat::new(48_000, 16, 2).unwrap()
    }

    #[test]
    fn scream_packet_round_trips() {
        let format = sample_format();
        let payload = vec![0x42u8; PACKET_DATA_SIZE];
        let built = build_scream_packet(&format, &payload).unwrap();
        assert_eq!(built.len(), PACKET_SIZE);
        let parsed = parse_scream_packet(&built).unwrap();
        assert_eq!(parsed.format, format);
        assert_eq!(parsed.payload, &payload[..]);
    }

    #[test]
    fn scream_packet_rejects_wrong_length() {
        let bytes = vec![0u8; PACKET_SIZE - 1];
        assert!(matches!(
            parse_scream_packet(&bytes),
            Err(CodecError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn per_process_packet_round_trips_and_trims_tag() {
        let format = sample_format();
        let payload = vec![0x7Fu8; PACKET_DATA_SIZE];
        let built = build_per_process_packet(&format, "10.0.0.5:firefox.exe", &payload).unwrap();
        assert_eq!(built.len(), PER_PROCESS_PACKET_SIZE);
        let parsed = parse_per_process_packet(&built).unwrap();
        assert_eq!(parsed.tag, "10.0.0.5:firefox.exe");
        assert_eq!(parsed.payload, &payload[..]);
    }

    #[test]
    fn per_process_tag_truncates_past_max_length() {
        let format = sample_format();
        let payload = vec![0u8; PACKET_DATA_SIZE];
        let long_tag = "x".repeat(TAG_MAX_LENGTH + 10);
        let built = build_per_process_packet(&format, &long_tag, &payload).unwrap();
        let parsed = parse_per_process_packet(&built).unwrap();
        assert_eq!(parsed.tag.len(), TAG_MAX_LENGTH);
    }
}
