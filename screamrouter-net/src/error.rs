use thiserror::Error;

/// Failure modes a receiver can hit. `Fatal` is the only variant that ends
/// the receiver's run loop (spec §7 `FatalReceiverError`); every other
/// error kind in spec §7 that a receiver can produce (`MalformedPacket`,
/// `UnknownSourceTag`) is handled locally (drop + count) and never surfaces
/// as a `NetError` at all.
#[derive(Debug, Error)]
pub enum NetError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("fatal receiver error: {0}")]
    Fatal(#[source] std::io::Error),
}
