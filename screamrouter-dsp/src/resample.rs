use std::collections::VecDeque;
use std::f32::consts::PI;

/// Half-width of the windowed-sinc kernel, in input samples on either side
/// of the interpolation point. A fixed, modest support radius is
/// deliberate: the spec explicitly allows a fixed-quality kernel rather
/// than a dynamically designed filter.
const HALF_TAPS: usize = 8;
const TAPS: usize = HALF_TAPS * 2;
/// Number of sub-sample phase positions the kernel is precomputed at.
const PHASES: usize = 64;

fn sinc(x: f32) -> f32 {
    if x.abs() < 1e-7 {
        1.0
    } else {
        (PI * x).sin() / (PI * x)
    }
}

fn blackman(x: f32) -> f32 {
    // x in [0, 1]
    0.42 - 0.5 * (2.0 * PI * x).cos() + 0.08 * (4.0 * PI * x).cos()
}

/// Precomputed windowed-sinc kernel, one row per sub-sample phase, `TAPS`
/// columns each. `cutoff` is the normalized cutoff (`1.0` == input Nyquist)
/// used to anti-alias when downsampling.
struct Kernel {
    table: Vec<[f32; TAPS]>,
}

impl Kernel {
    fn build(cutoff: f32) -> Self {
        let mut table = Vec::with_capacity(PHASES);
        for phase in 0..PHASES {
            let frac = phase as f32 / PHASES as f32;
            let mut row = [0.0f32; TAPS];
            for (i, tap) in row.iter_mut().enumerate() {
                // Tap i corresponds to input offset (i - HALF_TAPS + 1) - frac
                // from the interpolation point, so taps bracket it on both sides.
                let t = (i as f32 - (HALF_TAPS as f32 - 1.0)) - frac;
                let window = blackman((t + HALF_TAPS as f32) / TAPS as f32);
                *tap = cutoff * sinc(cutoff * t) * window;
            }
            let sum: f32 = row.iter().sum();
            if sum.abs() > 1e-6 {
                for tap in row.iter_mut() {
                    *tap /= sum;
                }
            }
            table.push(row);
        }
        Self { table }
    }

    fn row(&self, phase_frac: f32) -> &[f32; TAPS] {
        let idx = ((phase_frac * PHASES as f32) as usize).min(PHASES - 1);
        &self.table[idx]
    }
}

/// Stateful per-path sample-rate converter. One instance is created per
/// path and persists across frames so kernel phase and channel history
/// carry over cleanly (spec §4.4 step 3).
pub struct Resampler {
    input_rate: u32,
    output_rate: u32,
    kernel: Kernel,
    /// Position of the next output sample, in input-sample units, relative
    /// to the oldest sample still held in `history`.
    pos: f64,
    step: f64,
    history: Vec<VecDeque<f32>>,
}

impl Resampler {
    pub fn new(input_rate: u32, output_rate: u32, channels: u8) -> Self {
        let cutoff = if output_rate < input_rate {
            output_rate as f32 / input_rate as f32
        } else {
            1.0
        };
        Self {
            input_rate,
            output_rate,
            kernel: Kernel::build(cutoff),
            pos: HALF_TAPS as f64,
            step: input_rate as f64 / output_rate as f64,
            history: (0..channels).map(|_| VecDeque::new()).collect(),
        }
    }

    pub fn is_passthrough(&self) -> bool {
        self.input_rate == self.output_rate
    }

    /// Whether this resampler was built for `input_rate`. Packet headers
    /// carry their own sample rate per spec §4.1; a path's resampler is
    /// rebuilt whenever an inbound packet's rate no longer matches, per
    /// the `ResamplerError` recovery rule in spec §4.4/§7.
    pub fn input_rate(&self) -> u32 {
        self.input_rate
    }

    /// Appends newly decoded input samples to the per-channel history.
    pub fn push_input(&mut self, input: &[Vec<f32>]) {
        for (channel, block) in input.iter().enumerate() {
            if channel >= self.history.len() {
                break;
            }
            self.history[channel].extend(block.iter().copied());
        }
    }

    /// Produces exactly `output_len` samples per channel if enough input
    /// history (current position plus lookahead) is available; otherwise
    /// returns `None` and leaves state untouched, signaling underrun to the
    /// caller per spec §4.4 failure semantics.
    pub fn pull_output(&mut self, output_len: usize) -> Option<Vec<Vec<f32>>> {
        if self.is_passthrough() {
            return self.pull_passthrough(output_len);
        }

        let required_input_end = self.pos + (output_len as f64 - 1.0) * self.step + HALF_TAPS as f64;
        let available = self.history.iter().map(|h| h.len()).min().unwrap_or(0);
        if (available as f64) < required_input_end {
            return None;
        }

        let channel_count = self.history.len();
        let mut output = vec![Vec::with_capacity(output_len); channel_count];

        for _ in 0..output_len {
            let base = self.pos.floor() as isize;
            let frac = (self.pos - self.pos.floor()) as f32;
            let taps = *self.kernel.row(frac);

            for (channel, out_block) in output.iter_mut().enumerate() {
                let hist = &self.history[channel];
                let mut acc = 0.0f32;
                for (tap_index, &coeff) in taps.iter().enumerate() {
                    let sample_index = base + tap_index as isize - (HALF_TAPS as isize - 1);
                    let sample = if sample_index >= 0 {
                        hist.get(sample_index as usize).copied().unwrap_or(0.0)
                    } else {
                        0.0
                    };
                    acc += coeff * sample;
                }
                out_block.push(acc);
            }
            self.pos += self.step;
        }

        self.trim_consumed_history();
        Some(output)
    }

    fn pull_passthrough(&mut self, output_len: usize) -> Option<Vec<Vec<f32>>> {
        let available = self.history.iter().map(|h| h.len()).min().unwrap_or(0);
        if available < output_len {
            return None;
        }
        let output: Vec<Vec<f32>> = self
            .history
            .iter_mut()
            .map(|h| h.drain(..output_len).collect())
            .collect();
        Some(output)
    }

    /// Drops fully-consumed leading history once `pos` has advanced past
    /// it, keeping memory bounded and `pos` numerically small.
    fn trim_consumed_history(&mut self) {
        let drop_count = (self.pos.floor() as isize - HALF_TAPS as isize).max(0) as usize;
        if drop_count == 0 {
            return;
        }
        for hist in &mut self.history {
            let n = drop_count.min(hist.len());
            hist.drain(..n);
        }
        self.pos -= drop_count as f64;
    }
}
