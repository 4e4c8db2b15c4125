/// LAME only encodes mono or stereo; a sink's pre-quantization mix can carry
/// up to 8 channels (spec §3 `StreamFormat.channels`). This folds a planar
/// float mix down to the two channels LAME wants: channel 0 feeds the left
/// ear, channel 1 (or channel 0 again, for a mono sink) feeds the right.
/// Channels beyond the first two are dropped — documented in DESIGN.md as a
/// deliberate scope cut, since the MP3 side-channel exists for browser
/// playback, not for carrying a sink's full surround layout.
pub fn downmix_to_i16_stereo(planar: &[Vec<f32>]) -> (Vec<i16>, Vec<i16>) {
    let frame_len = planar.first().map(|c| c.len()).unwrap_or(0);
    let left_src = planar.first();
    let right_src = planar.get(1).or(left_src);

    let mut left = Vec::with_capacity(frame_len);
    let mut right = Vec::with_capacity(frame_len);
    for i in 0..frame_len {
        left.push(to_i16(left_src.and_then(|c| c.get(i)).copied().unwrap_or(0.0)));
        right.push(to_i16(right_src.and_then(|c| c.get(i)).copied().unwrap_or(0.0)));
    }
    (left, right)
}

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stereo_source_keeps_both_channels() {
        let planar = vec![vec![1.0, -1.0], vec![0.5, -0.5]];
        let (left, right) = downmix_to_i16_stereo(&planar);
        assert_eq!(left, vec![i16::MAX, -i16::MAX]);
        assert_eq!(right[0], (0.5 * i16::MAX as f32).round() as i16);
    }

    #[test]
    fn mono_source_duplicates_to_both_ears() {
        let planar = vec![vec![0.25, -0.25]];
        let (left, right) = downmix_to_i16_stereo(&planar);
        assert_eq!(left, right);
    }

    #[test]
    fn extra_channels_beyond_stereo_are_ignored() {
        let planar = vec![vec![1.0], vec![0.0], vec![1.0], vec![1.0]];
        let (left, right) = downmix_to_i16_stereo(&planar);
        assert_eq!(left, vec![i16::MAX]);
        assert_eq!(right, vec![0]);
    }

    #[test]
    fn empty_input_produces_empty_output() {
        let planar: Vec<Vec<f32>> = vec![];
        let (left, right) = downmix_to_i16_stereo(&planar);
        assert!(left.is_empty());
        assert!(right.is_empty());
    }
}
