use mp3lame_encoder::{Builder, DualPcm, Encoder, FlushNoGap, Quality};

use crate::bitrate::bitrate_for_kbps;
use crate::downmix::downmix_to_i16_stereo;
use crate::error::Mp3Error;

/// Wraps a LAME encoder instance for one sink's MP3 side-channel (spec
/// §4.6). Takes the pre-quantization float mix tee'd off the mixer
/// (spec §4.5 step 8) and produces complete MP3 frames.
pub struct Mp3Encoder {
    encoder: Encoder,
}

impl Mp3Encoder {
    /// `channels` is only used to decide mono vs. stereo encoding; LAME's
    /// PCM input is always folded to at most two channels by
    /// [`downmix_to_i16_stereo`] regardless of the sink's actual channel
    /// count.
    pub fn new(sample_rate: u32, bitrate_kbps: u32) -> Result<Self, Mp3Error> {
        let mut builder = Builder::new().ok_or_else(|| {
            Mp3Error::BuilderFailed("mp3lame_encoder::Builder::new returned None".to_string())
        })?;
        builder
            .set_num_channels(2)
            .map_err(|e| Mp3Error::ConfigFailed(format!("set_num_channels: {e:?}")))?;
        builder
            .set_sample_rate(sample_rate)
            .map_err(|e| Mp3Error::ConfigFailed(format!("set_sample_rate: {e:?}")))?;
        builder
            .set_brate(bitrate_for_kbps(bitrate_kbps))
            .map_err(|e| Mp3Error::ConfigFailed(format!("set_brate: {e:?}")))?;
        builder
            .set_quality(Quality::Good)
            .map_err(|e| Mp3Error::ConfigFailed(format!("set_quality: {e:?}")))?;
        let encoder = builder
            .build()
            .map_err(|e| Mp3Error::BuilderFailed(format!("{e:?}")))?;
        Ok(Self { encoder })
    }

    /// Encodes one planar float mix frame into zero or more complete MP3
    /// frames. LAME buffers internally across calls, so a single call here
    /// may return no bytes even though input was accepted.
    pub fn encode(&mut self, planar: &[Vec<f32>]) -> Result<Vec<u8>, Mp3Error> {
        let (left, right) = downmix_to_i16_stereo(planar);
        let input = DualPcm {
            left: &left,
            right: &right,
        };
        let mut out = Vec::new();
        out.reserve(mp3lame_encoder::max_required_buffer_size(left.len()));
        let encoded_size = self
            .encoder
            .encode(input, out.spare_capacity_mut())
            .map_err(|e| Mp3Error::EncodeFailed(format!("{e:?}")))?;
        unsafe {
            out.set_len(out.len().wrapping_add(encoded_size));
        }
        Ok(out)
    }

    /// Flushes any MP3 bytes still buffered inside LAME. Called once when a
    /// sink is torn down (spec §4.5 `RUNNING -> STOPPED`: "encoder flushed").
    pub fn flush(&mut self) -> Result<Vec<u8>, Mp3Error> {
        let mut out = Vec::new();
        out.reserve(mp3lame_encoder::max_required_buffer_size(0));
        let encoded_size = self
            .encoder
            .flush::<FlushNoGap>(out.spare_capacity_mut())
            .map_err(|e| Mp3Error::EncodeFailed(format!("{e:?}")))?;
        unsafe {
            out.set_len(out.len().wrapping_add(encoded_size));
        }
        Ok(out)
    }
}
