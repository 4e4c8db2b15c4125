//! UDP ingress for the Scream/per-process/RTP wire protocols (spec §4.2).
//!
//! Each receiver owns one socket and one thread, extracts a `source_tag`,
//! and appends straight into that tag's [`screamrouter_timeshift::TimeshiftBuffer`]
//! if one exists; otherwise the packet is a `spec §7` `UnknownSourceTag` drop.
//! This crate has no notion of source-paths or sinks — it only demuxes and
//! buffers.

mod error;
mod per_process;
mod rtp;
mod scream;
mod socket;
mod supervisor;

pub use error::NetError;
pub use per_process::PerProcessReceiver;
pub use rtp::RtpReceiver;
pub use scream::ScreamReceiver;
pub use socket::ReceiverHandle;
pub use supervisor::{Receiver, Supervisor};
