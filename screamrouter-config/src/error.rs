use thiserror::Error;

/// Errors the solver can raise while resolving a user graph. These never
/// originate in the audio plane; they are control-plane input validation.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("route '{route}' references unknown {kind} '{name}'")]
    UnknownReference {
        route: String,
        kind: &'static str,
        name: String,
    },

    #[error("cycle detected while resolving {kind} group '{name}'")]
    CyclicGroup { kind: &'static str, name: String },

    #[error("{0}")]
    Rejected(String),
}
