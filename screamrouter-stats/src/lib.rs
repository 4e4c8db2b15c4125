//! Live counters for the statistics export in spec §6: per-process,
//! per-source-tag, per-source-path and per-sink gauges and rates, assembled
//! into a snapshot by `screamrouter-core` when a control plane asks for one.

mod counter;
mod path;
mod process;
mod registry;
mod sink;
mod tag;

pub use counter::{Counter, Gauge, RateCounter};
pub use path::{PathStats, PathStatsSnapshot};
pub use process::{ProcessStats, ProcessStatsSnapshot};
pub use registry::StatsRegistry;
pub use sink::{SinkStats, SinkStatsSnapshot};
pub use tag::{TagStats, TagStatsSnapshot};
