use screamrouter_codec::constants::PACKET_DATA_SIZE;
use screamrouter_codec::StreamFormat;

/// One ingested packet's worth of PCM history, tagged with the monotonic
/// time it was captured at. The payload is fixed-size and copied (never
/// borrowed) so a `TimeshiftPacket` can outlive the buffer slot it came
/// from without holding any lock.
#[derive(Debug, Clone)]
pub struct TimeshiftPacket {
    pub capture_monotonic_ns: u64,
    pub format: StreamFormat,
    pub payload: [u8; PACKET_DATA_SIZE],
}

impl TimeshiftPacket {
    pub fn new(capture_monotonic_ns: u64, format: StreamFormat, payload: [u8; PACKET_DATA_SIZE]) -> Self {
        Self {
            capture_monotonic_ns,
            format,
            payload,
        }
    }
}
