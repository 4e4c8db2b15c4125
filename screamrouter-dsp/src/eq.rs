use screamrouter_config::{Equalizer, EQ_BAND_CENTERS_HZ, EQ_BAND_COUNT};

use crate::biquad::{Biquad, BiquadCoeffs};

/// Fixed Q for every band; wide enough that adjacent bands overlap evenly
/// across the glossary's 65 Hz .. 20 kHz spread.
const BAND_Q: f32 = 1.4;
/// Minimum cross-fade length for an EQ change, per spec §4.4 ("Volume and
/// EQ changes cross-fade over >= 8 ms to avoid zipper noise").
const MIN_FADE_MS: f32 = 8.0;

type Bank = [Biquad; EQ_BAND_COUNT];

struct Fade {
    old_channels: Vec<Bank>,
    total_samples: usize,
    done_samples: usize,
}

/// An 18-band peaking chain applied independently to every channel of a
/// path. Coefficients are only recomputed when the `Equalizer` actually
/// changes (spec §4.4 step 4), since recomputing 18 `sin`/`cos` pairs per
/// frame would be wasted work when most frames carry unchanged settings.
pub struct EqChain {
    sample_rate: u32,
    channels: Vec<Bank>,
    last_applied: Equalizer,
    fade: Option<Fade>,
}

impl EqChain {
    pub fn new(channel_count: u8, sample_rate: u32) -> Self {
        let bank = std::array::from_fn(|_| Biquad::new(BiquadCoeffs::bypass()));
        Self {
            sample_rate,
            channels: (0..channel_count).map(|_| bank.clone()).collect(),
            last_applied: Equalizer::unity(),
            fade: None,
        }
    }

    /// Recomputes every band's coefficients if `equalizer` differs from the
    /// last one applied, and arms a cross-fade against the previous
    /// coefficients so [`EqChain::process_planar`] blends old into new
    /// across `MIN_FADE_MS` rather than switching instantly. Idempotent to
    /// call every frame.
    pub fn set_equalizer(&mut self, equalizer: Equalizer) {
        if equalizer == self.last_applied {
            return;
        }
        let old_channels = self.channels.clone();
        for channel in &mut self.channels {
            for (band_index, biquad) in channel.iter_mut().enumerate() {
                let coeffs = BiquadCoeffs::peaking(
                    EQ_BAND_CENTERS_HZ[band_index],
                    BAND_Q,
                    equalizer.bands[band_index],
                    self.sample_rate as f32,
                );
                biquad.set_coeffs(coeffs);
            }
        }
        let total_samples = ((self.sample_rate as f32) * MIN_FADE_MS / 1000.0)
            .max(1.0)
            .round() as usize;
        self.fade = Some(Fade {
            old_channels,
            total_samples,
            done_samples: 0,
        });
        self.last_applied = equalizer;
    }

    /// Runs the full 18-band chain over one channel's block in place, with
    /// no cross-fade. Used directly by callers that only care about the
    /// chain's steady-state response (e.g. tests); the pipeline driver
    /// uses [`EqChain::process_planar`] instead so parameter updates fade.
    pub fn process_channel(&mut self, channel: usize, block: &mut [f32]) {
        for biquad in &mut self.channels[channel] {
            biquad.process_block(block);
        }
    }

    /// Runs the chain over every channel of a planar frame in place,
    /// cross-fading from the previous coefficients if a `set_equalizer`
    /// call is still within its fade window.
    pub fn process_planar(&mut self, planar: &mut [Vec<f32>]) {
        if self.fade.is_none() {
            for (channel, block) in planar.iter_mut().enumerate() {
                if channel >= self.channels.len() {
                    break;
                }
                self.process_channel(channel, block);
            }
            return;
        }
        self.process_planar_with_fade(planar);
    }

    fn process_planar_with_fade(&mut self, planar: &mut [Vec<f32>]) {
        let frame_len = planar.first().map(|b| b.len()).unwrap_or(0);
        let fade = self.fade.as_mut().expect("fade is Some");
        for (channel, block) in planar.iter_mut().enumerate() {
            if channel >= self.channels.len() {
                break;
            }
            let mut old_block = block.clone();
            for biquad in &mut fade.old_channels[channel] {
                biquad.process_block(&mut old_block);
            }
            for biquad in &mut self.channels[channel] {
                biquad.process_block(block);
            }
            for (i, sample) in block.iter_mut().enumerate() {
                let step = fade.done_samples + i;
                let t = (step as f32 / fade.total_samples as f32).min(1.0);
                *sample = old_block[i] * (1.0 - t) + *sample * t;
            }
        }
        fade.done_samples += frame_len;
        if fade.done_samples >= fade.total_samples {
            self.fade = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unity_equalizer_is_near_transparent() {
        let mut chain = EqChain::new(2, 48_000);
        chain.set_equalizer(Equalizer::unity());
        let mut block = vec![1.0f32; 4096];
        chain.process_channel(0, &mut block);
        let last = *block.last().unwrap();
        assert!((last - 1.0).abs() < 0.05);
    }

    #[test]
    fn recompute_is_skipped_when_equalizer_unchanged() {
        let mut chain = EqChain::new(1, 48_000);
        chain.set_equalizer(Equalizer::unity());
        let before = chain.last_applied;
        chain.set_equalizer(Equalizer::unity());
        assert_eq!(before, chain.last_applied);
    }

    #[test]
    fn boosted_band_increases_energy_at_its_center() {
        let mut flat = EqChain::new(1, 48_000);
        flat.set_equalizer(Equalizer::unity());

        let mut boosted = EqChain::new(1, 48_000);
        let mut eq = Equalizer::unity();
        eq.bands[8] = 1.8; // ~1047 Hz band
        boosted.set_equalizer(eq);

        let sample_rate = 48_000.0;
        let freq = EQ_BAND_CENTERS_HZ[8];
        let tone: Vec<f32> = (0..4096)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate).sin())
            .collect();

        let mut flat_out = tone.clone();
        flat.process_channel(0, &mut flat_out);
        let mut boosted_out = tone;
        boosted.process_channel(0, &mut boosted_out);

        let flat_energy: f32 = flat_out.iter().map(|s| s * s).sum();
        let boosted_energy: f32 = boosted_out.iter().map(|s| s * s).sum();
        assert!(boosted_energy > flat_energy);
    }
}
