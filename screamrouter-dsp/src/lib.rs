//! Per-path DSP stages, applied in the fixed order spec §4.4 mandates:
//! channel remap, sample-rate conversion, 18-band EQ, gain, integer-sample
//! delay. Each stage is its own small stateful type so
//! `screamrouter-pipeline` can own one instance of each per `SourcePath`
//! and drive them frame by frame.

pub mod biquad;
pub mod delay;
pub mod eq;
pub mod gain;
pub mod pcm;
pub mod remap;
pub mod resample;

pub use biquad::{Biquad, BiquadCoeffs};
pub use delay::DelayLine;
pub use eq::EqChain;
pub use gain::GainStage;
pub use pcm::{decode_planar, quantize_interleaved};
pub use remap::apply_matrix;
pub use resample::Resampler;
