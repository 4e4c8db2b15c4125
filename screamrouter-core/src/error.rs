use thiserror::Error;

/// Aggregated error from a single `apply_state` call (spec §5: "control-plane
/// errors propagate a single aggregated error object"). Individual
/// registries already distinguish unknown-id from setup failures; this
/// just carries whichever one surfaced first, since `apply_state` stops at
/// the first failing op rather than rolling back partial progress.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Pipeline(#[from] screamrouter_pipeline::PipelineError),

    #[error(transparent)]
    Mixer(#[from] screamrouter_mixer::MixerError),
}
