use thiserror::Error;

/// Failure modes for the MP3 side-channel. These never reach the mixer's
/// hot path: spec §4.6 requires the encoder to never block a slow consumer,
/// and encoder setup failures are surfaced once at sink creation.
#[derive(Debug, Error)]
pub enum Mp3Error {
    #[error("failed to build LAME encoder: {0}")]
    BuilderFailed(String),

    #[error("failed to configure LAME encoder: {0}")]
    ConfigFailed(String),

    #[error("LAME encode call failed: {0}")]
    EncodeFailed(String),
}
