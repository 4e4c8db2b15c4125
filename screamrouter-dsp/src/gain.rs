/// Rolling window length for the RMS loudness estimate, in samples at the
/// path's target rate. One second is long enough to smooth over transients
/// without chasing individual notes.
const RMS_WINDOW_SECONDS: f32 = 1.0;
/// Loudness the normalizer converges towards, chosen so ordinary program
/// material sits comfortably under the `[-1, 1]` clamp downstream.
const TARGET_RMS: f32 = 0.2;
/// How quickly the normalization factor adapts, per processed block.
const ADAPT_RATE: f32 = 0.02;
/// Minimum cross-fade length for a `set_volume` change, per spec §4.4
/// parameter-update rules ("Volume and EQ changes cross-fade over >= 8 ms
/// to avoid zipper noise").
const MIN_RAMP_MS: f32 = 8.0;

struct Ramp {
    from: f32,
    to: f32,
    total_samples: usize,
    done_samples: usize,
}

/// Applies `volume` and, optionally, a slowly adapting RMS-based
/// normalization factor so long-term loudness is comparable across paths
/// with very different source material (spec §4.4 step 5). A volume
/// change made via [`GainStage::set_volume`] after construction ramps
/// linearly over `MIN_RAMP_MS` rather than stepping instantly.
pub struct GainStage {
    sample_rate: u32,
    volume: f32,
    ramp: Option<Ramp>,
    volume_normalization: bool,
    running_rms: f32,
    norm_factor: f32,
}

impl GainStage {
    pub fn new(sample_rate: u32, volume: f32, volume_normalization: bool) -> Self {
        Self {
            sample_rate,
            volume,
            ramp: None,
            volume_normalization,
            running_rms: TARGET_RMS,
            norm_factor: 1.0,
        }
    }

    /// Requests a new target volume. If it differs from the current
    /// value, the change is applied as a linear ramp across the next
    /// `MIN_RAMP_MS` of output rather than instantly, per spec §4.4.
    pub fn set_volume(&mut self, volume: f32) {
        if (volume - self.volume).abs() < f32::EPSILON {
            return;
        }
        let total_samples = ((self.sample_rate as f32) * MIN_RAMP_MS / 1000.0)
            .max(1.0)
            .round() as usize;
        self.ramp = Some(Ramp {
            from: self.volume,
            to: volume,
            total_samples,
            done_samples: 0,
        });
    }

    pub fn set_volume_normalization(&mut self, enabled: bool) {
        self.volume_normalization = enabled;
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn process_planar(&mut self, planar: &mut [Vec<f32>]) {
        if self.volume_normalization {
            self.update_norm_factor(planar);
        } else {
            self.norm_factor = 1.0;
        }
        let frame_len = planar.first().map(|b| b.len()).unwrap_or(0);
        for i in 0..frame_len {
            let gain = self.step_volume() * self.norm_factor;
            for block in planar.iter_mut() {
                if let Some(sample) = block.get_mut(i) {
                    *sample *= gain;
                }
            }
        }
    }

    /// Advances the ramp by one sample and returns the volume to apply at
    /// that position. With no ramp in flight this is just the current
    /// `volume`.
    fn step_volume(&mut self) -> f32 {
        let Some(ramp) = &mut self.ramp else {
            return self.volume;
        };
        ramp.done_samples += 1;
        let t = (ramp.done_samples as f32 / ramp.total_samples as f32).min(1.0);
        let value = ramp.from + (ramp.to - ramp.from) * t;
        if ramp.done_samples >= ramp.total_samples {
            self.volume = ramp.to;
            self.ramp = None;
        }
        value
    }

    fn update_norm_factor(&mut self, planar: &[Vec<f32>]) {
        let total: f32 = planar.iter().flat_map(|b| b.iter()).map(|s| s * s).sum();
        let count = planar.iter().map(|b| b.len()).sum::<usize>().max(1);
        let block_rms = (total / count as f32).sqrt();

        let window_samples = (self.sample_rate as f32 * RMS_WINDOW_SECONDS).max(1.0);
        let block_len = planar.first().map(|b| b.len()).unwrap_or(1).max(1) as f32;
        let alpha = (block_len / window_samples).clamp(0.0, 1.0);
        self.running_rms = alpha * block_rms + (1.0 - alpha) * self.running_rms;

        if self.running_rms > 1e-6 {
            let desired = TARGET_RMS / self.running_rms;
            self.norm_factor += ADAPT_RATE * (desired - self.norm_factor);
            self.norm_factor = self.norm_factor.clamp(0.1, 4.0);
        }
    }
}
