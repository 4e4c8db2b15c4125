use thiserror::Error;

/// Failures a `SourcePathWorker` can hit while driving one path's DSP chain.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("unknown path id {0:?}")]
    UnknownPath(screamrouter_config::PathId),

    #[error("codec error while decoding timeshifted packet: {0}")]
    Codec(#[from] screamrouter_codec::CodecError),
}
