//! Control-plane configuration: the user-facing graph, the pure solver that
//! flattens it into desired state, and the pure differ that turns a
//! live/desired pair into an ordered list of apply operations.

pub mod applier;
pub mod equalizer;
pub mod error;
pub mod ids;
pub mod model;
pub mod remap;
pub mod solver;

pub use applier::{diff, ApplyOp};
pub use equalizer::{Equalizer, EQ_BAND_CENTERS_HZ, EQ_BAND_COUNT};
pub use error::ConfigError;
pub use ids::{PathId, SinkId};
pub use model::{
    Composition, DesiredState, GraphNode, Protocol, RouteDescription, Sink, SinkEndpoint,
    SinkGroup, SinkNode, SourceEndpoint, SourceGroup, SourceNode, SourcePath, SpeakerMatrix,
    UserGraph,
};
pub use remap::auto_matrix;
pub use solver::solve;
