use thiserror::Error;

/// Failures a `SinkWorker` can hit while setting up or running.
#[derive(Debug, Error)]
pub enum MixerError {
    #[error("unknown sink id {0:?}")]
    UnknownSink(screamrouter_config::SinkId),

    #[error("failed to bind egress socket for {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("mp3 encoder setup failed: {0}")]
    Mp3(#[from] screamrouter_mp3::Mp3Error),
}
