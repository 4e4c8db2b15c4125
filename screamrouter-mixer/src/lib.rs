//! Per-sink mixer (spec §4.5): accumulates every connected `SourcePath`'s
//! per-tick frame, applies sink-level EQ/gain/delay/time-sync, clamps,
//! quantizes, packetizes and sends over UDP, while teeing the pre-
//! quantization float mix to the sink's MP3 side-channel.

mod error;
mod registry;
mod sink;
mod timesync;

pub use error::MixerError;
pub use registry::SinkRegistry;
pub use sink::SinkHandle;
