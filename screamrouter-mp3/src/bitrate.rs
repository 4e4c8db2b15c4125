use mp3lame_encoder::Bitrate;

/// Maps a configured kbps value onto the nearest `mp3lame_encoder::Bitrate`
/// variant LAME actually exposes. Boot-time configuration (spec §6
/// "Environment/config at boot: ... MP3 bitrate") hands this a plain `u32`;
/// LAME's bindings only accept its fixed enum, so unrecognized values fall
/// back to the nearest supported rate rather than failing sink creation.
pub fn bitrate_for_kbps(kbps: u32) -> Bitrate {
    match kbps {
        0..=40 => Bitrate::Kbps32,
        41..=56 => Bitrate::Kbps48,
        57..=72 => Bitrate::Kbps64,
        73..=96 => Bitrate::Kbps80,
        97..=104 => Bitrate::Kbps96,
        105..=116 => Bitrate::Kbps112,
        117..=136 => Bitrate::Kbps128,
        137..=152 => Bitrate::Kbps144,
        153..=168 => Bitrate::Kbps160,
        169..=184 => Bitrate::Kbps176,
        185..=208 => Bitrate::Kbps192,
        209..=232 => Bitrate::Kbps224,
        233..=248 => Bitrate::Kbps240,
        _ => Bitrate::Kbps256,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_default_maps_to_128() {
        assert!(matches!(bitrate_for_kbps(128), Bitrate::Kbps128));
    }

    #[test]
    fn very_low_value_clamps_to_lowest_tier() {
        assert!(matches!(bitrate_for_kbps(8), Bitrate::Kbps32));
    }

    #[test]
    fn very_high_value_clamps_to_highest_tier() {
        assert!(matches!(bitrate_for_kbps(320), Bitrate::Kbps256));
    }
}
