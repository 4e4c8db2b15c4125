use screamrouter_codec::constants::PACKET_DATA_SIZE;
use screamrouter_codec::StreamFormat;
use screamrouter_timeshift::{monotonic_now_ns, TimeshiftRegistry};

/// A contiguous slab of raw PCM history for one source-tag (spec §5
/// "timeshift export"), at the tag's native wire format, covering at most
/// the caller's requested lookback and capped by whatever the ring buffer
/// still holds.
#[derive(Debug, Clone)]
pub struct PcmExport {
    pub pcm_bytes: Vec<u8>,
    pub format: StreamFormat,
    pub earliest_age_s: f64,
    pub latest_age_s: f64,
}

pub(crate) fn export_pcm(
    timeshift: &TimeshiftRegistry,
    source_tag: &str,
    lookback_seconds: f64,
) -> Option<PcmExport> {
    let buffer = timeshift.get(source_tag)?;
    let now_ns = monotonic_now_ns();
    let lookback_ns = (lookback_seconds.max(0.0) * 1_000_000_000.0) as u64;
    let cutoff_ns = now_ns.saturating_sub(lookback_ns);

    let packets: Vec<_> = buffer
        .packets_since(None, usize::MAX)
        .into_iter()
        .filter(|packet| packet.capture_monotonic_ns >= cutoff_ns)
        .collect();
    let first = packets.first()?;
    let format = first.format;
    let earliest_ns = first.capture_monotonic_ns;
    let latest_ns = packets.last().map(|p| p.capture_monotonic_ns).unwrap_or(earliest_ns);

    let mut pcm_bytes = Vec::with_capacity(packets.len() * PACKET_DATA_SIZE);
    for packet in &packets {
        pcm_bytes.extend_from_slice(&packet.payload);
    }

    Some(PcmExport {
        pcm_bytes,
        format,
        earliest_age_s: now_ns.saturating_sub(earliest_ns) as f64 / 1_000_000_000.0,
        latest_age_s: now_ns.saturating_sub(latest_ns) as f64 / 1_000_000_000.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use screamrouter_timeshift::TimeshiftPacket;

    fn push(tag: &str, registry: &TimeshiftRegistry, when_ns: u64) {
        let buffer = registry.get_or_create(tag);
        let format = StreamFormat::new(48_000, 16, 2).unwrap();
        buffer.append(TimeshiftPacket::new(when_ns, format, [0u8; PACKET_DATA_SIZE]));
    }

    #[test]
    fn unknown_tag_returns_none() {
        let registry = TimeshiftRegistry::new(60.0);
        assert!(export_pcm(&registry, "ghost", 10.0).is_none());
    }

    #[test]
    fn concatenates_payloads_within_lookback() {
        let registry = TimeshiftRegistry::new(60.0);
        let now = monotonic_now_ns();
        push("A", &registry, now.saturating_sub(2_000_000_000));
        push("A", &registry, now.saturating_sub(1_000_000_000));
        push("A", &registry, now);
        let export = export_pcm(&registry, "A", 1.5).unwrap();
        // Only the last two packets (1s ago and now) fall within 1.5s lookback.
        assert_eq!(export.pcm_bytes.len(), PACKET_DATA_SIZE * 2);
        assert_eq!(export.format.sample_rate, 48_000);
    }
}
