//! Conversion between the wire's interleaved integer PCM and the planar
//! float32 the rest of the DSP chain operates on.
//!
//! Quantization models the mixer's accumulator as a 32-bit lane (spec
//! §4.5 step 6/7 and the added detail in `original_source`'s
//! `sink_output_mixer.py`): the float sample is rounded half-to-even into
//! a full-range `i32`, then the target bit depth keeps that lane's most
//! significant bytes and drops the rest — 24-bit drops the low byte,
//! 16-bit drops the low two.

/// Rounds to the nearest integer, ties to even, matching spec §4.5 step 6.
fn round_half_to_even(x: f64) -> i64 {
    let floor = x.floor();
    let diff = x - floor;
    let floor_i = floor as i64;
    if diff < 0.5 {
        floor_i
    } else if diff > 0.5 {
        floor_i + 1
    } else if floor_i % 2 == 0 {
        floor_i
    } else {
        floor_i + 1
    }
}

fn sign_extend(bytes: &[u8]) -> i32 {
    match bytes.len() {
        2 => i16::from_le_bytes([bytes[0], bytes[1]]) as i32,
        3 => {
            let unsigned = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0]);
            ((unsigned << 8) as i32) >> 8
        }
        4 => i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        _ => 0,
    }
}

fn max_magnitude(bit_depth: u8) -> f32 {
    match bit_depth {
        16 => 32_768.0,
        24 => 8_388_608.0,
        32 => 2_147_483_648.0,
        _ => 1.0,
    }
}

/// Decodes an interleaved PCM payload into planar float32 in `[-1, 1]`,
/// one `Vec<f32>` per channel. Trailing bytes that do not fill a whole
/// frame are dropped.
pub fn decode_planar(bit_depth: u8, channels: u8, payload: &[u8]) -> Vec<Vec<f32>> {
    let channel_count = channels as usize;
    let bytes_per_sample = (bit_depth / 8) as usize;
    let bytes_per_frame = bytes_per_sample * channel_count.max(1);
    let frame_count = if bytes_per_frame == 0 {
        0
    } else {
        payload.len() / bytes_per_frame
    };
    let mut planar = vec![Vec::with_capacity(frame_count); channel_count];
    let scale = max_magnitude(bit_depth);

    for frame in 0..frame_count {
        let frame_start = frame * bytes_per_frame;
        for (channel, block) in planar.iter_mut().enumerate() {
            let offset = frame_start + channel * bytes_per_sample;
            let raw = sign_extend(&payload[offset..offset + bytes_per_sample]);
            block.push(raw as f32 / scale);
        }
    }
    planar
}

/// Quantizes a planar float32 mix (assumed already clamped to `[-1, 1]`
/// by the caller per spec §4.5 step 5) into an interleaved PCM byte
/// buffer at `bit_depth`.
pub fn quantize_interleaved(bit_depth: u8, planar: &[Vec<f32>]) -> Vec<u8> {
    let channels = planar.len();
    let frame_len = planar.first().map(|b| b.len()).unwrap_or(0);
    let bytes_per_sample = (bit_depth / 8) as usize;
    let mut out = Vec::with_capacity(frame_len * channels * bytes_per_sample);

    for i in 0..frame_len {
        for block in planar {
            let sample = block.get(i).copied().unwrap_or(0.0).clamp(-1.0, 1.0) as f64;
            let scaled = sample * i32::MAX as f64;
            let lane = round_half_to_even(scaled).clamp(i32::MIN as i64, i32::MAX as i64) as i32;
            let bytes = lane.to_le_bytes();
            match bit_depth {
                32 => out.extend_from_slice(&bytes),
                24 => out.extend_from_slice(&bytes[1..4]),
                16 => out.extend_from_slice(&bytes[2..4]),
                _ => out.extend_from_slice(&bytes[4 - bytes_per_sample.min(4)..4]),
            }
        }
    }
    out
}
