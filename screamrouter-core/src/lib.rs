//! Wires the timeshift, per-path pipeline, per-sink mixer and statistics
//! registries into one `Engine`, and executes the configuration differ's
//! output against them (spec §5).

mod engine;
mod error;
mod pcm;
mod stats;

pub use engine::Engine;
pub use error::CoreError;
pub use pcm::PcmExport;
pub use stats::StatsSnapshot;
