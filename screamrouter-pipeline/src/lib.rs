//! Per-`SourcePath` driver: a fixed-size thread pool advances each path's
//! DSP chain (remap, resample, EQ, gain, delay) one tick at a time, in
//! lockstep with the owning sink's pacing loop, publishing each result to
//! a non-blocking slot the mixer reads from.

mod error;
mod pool;
mod registry;
mod slot;
mod worker;

pub use error::PipelineError;
pub use pool::WorkerPool;
pub use registry::PathRegistry;
pub use slot::SourceSlot;
