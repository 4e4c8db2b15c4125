use std::collections::HashMap;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::equalizer::Equalizer;
use crate::ids::{PathId, SinkId};
use screamrouter_codec::StreamFormat;

/// Wire protocol a sink speaks on egress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Protocol {
    Scream,
    Rtp,
}

/// Composable gain/EQ/delay/timeshift values, shared by every node kind the
/// solver walks. Composition is multiplicative for `volume`/`equalizer`,
/// additive for `delay_ms`/`timeshift_sec`, per spec invariant 5.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Composition {
    pub volume: f32,
    pub equalizer: Equalizer,
    pub delay_ms: u32,
    pub timeshift_sec: f32,
}

impl Default for Composition {
    fn default() -> Self {
        Self {
            volume: 1.0,
            equalizer: Equalizer::unity(),
            delay_ms: 0,
            timeshift_sec: 0.0,
        }
    }
}

impl Composition {
    /// Folds `child` underneath `self` (`self` is the parent/adjustment
    /// applied so far): volume and EQ multiply, delay and timeshift add.
    pub fn compose_with(&self, child: Composition) -> Composition {
        Composition {
            volume: self.volume * child.volume,
            equalizer: self.equalizer * child.equalizer,
            delay_ms: self.delay_ms + child.delay_ms,
            timeshift_sec: self.timeshift_sec + child.timeshift_sec,
        }
    }
}

/// Polymorphism over "can be composed into a flat path", implemented by
/// both sink and source graph nodes. A node is either a leaf `Endpoint`
/// (`resolve_children` returns `None`) or a `Group` that fans out to named
/// children whose own composition is folded under the group's.
pub trait GraphNode {
    fn name(&self) -> &str;
    fn enabled(&self) -> bool;
    fn own_composition(&self) -> Composition;
    fn children(&self) -> Option<&[String]>;
}

/// A concrete, addressable sink endpoint in the user graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkEndpoint {
    pub name: String,
    pub enabled: bool,
    pub output_ip: IpAddr,
    pub output_port: u16,
    pub protocol: Protocol,
    pub format: StreamFormat,
    pub volume: f32,
    pub equalizer: Equalizer,
    pub delay_ms: u32,
    pub timeshift_sec: f32,
    pub time_sync_offset_samples: Option<i64>,
}

/// A named grouping of sinks/sink-groups; group-level gain/EQ/delay fold
/// into every member, recursively.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkGroup {
    pub name: String,
    pub enabled: bool,
    pub volume: f32,
    pub equalizer: Equalizer,
    pub delay_ms: u32,
    pub timeshift_sec: f32,
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SinkNode {
    Endpoint(SinkEndpoint),
    Group(SinkGroup),
}

impl GraphNode for SinkNode {
    fn name(&self) -> &str {
        match self {
            SinkNode::Endpoint(e) => &e.name,
            SinkNode::Group(g) => &g.name,
        }
    }
    fn enabled(&self) -> bool {
        match self {
            SinkNode::Endpoint(e) => e.enabled,
            SinkNode::Group(g) => g.enabled,
        }
    }
    fn own_composition(&self) -> Composition {
        match self {
            SinkNode::Endpoint(e) => Composition {
                volume: e.volume,
                equalizer: e.equalizer,
                delay_ms: e.delay_ms,
                timeshift_sec: e.timeshift_sec,
            },
            SinkNode::Group(g) => Composition {
                volume: g.volume,
                equalizer: g.equalizer,
                delay_ms: g.delay_ms,
                timeshift_sec: g.timeshift_sec,
            },
        }
    }
    fn children(&self) -> Option<&[String]> {
        match self {
            SinkNode::Endpoint(_) => None,
            SinkNode::Group(g) => Some(&g.members),
        }
    }
}

/// A concrete, addressable source endpoint in the user graph. `tag` is the
/// opaque receiver-extracted key (IP, IP+process, or RTP handle) that ties
/// this endpoint to a timeshift buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceEndpoint {
    pub name: String,
    pub tag: String,
    pub enabled: bool,
    pub volume: f32,
    pub equalizer: Equalizer,
    pub delay_ms: u32,
    pub timeshift_sec: f32,
    /// When false, `custom_speaker_layouts` supplies the remap matrices;
    /// when true the pipeline derives them with the fixed auto rule.
    #[serde(default = "default_true")]
    pub auto_mode: bool,
    #[serde(default)]
    pub eq_normalization: bool,
    #[serde(default)]
    pub volume_normalization: bool,
    #[serde(default)]
    pub custom_speaker_layouts: HashMap<u8, SpeakerMatrix>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceGroup {
    pub name: String,
    pub enabled: bool,
    pub volume: f32,
    pub equalizer: Equalizer,
    pub delay_ms: u32,
    pub timeshift_sec: f32,
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SourceNode {
    Endpoint(SourceEndpoint),
    Group(SourceGroup),
}

impl GraphNode for SourceNode {
    fn name(&self) -> &str {
        match self {
            SourceNode::Endpoint(e) => &e.name,
            SourceNode::Group(g) => &g.name,
        }
    }
    fn enabled(&self) -> bool {
        match self {
            SourceNode::Endpoint(e) => e.enabled,
            SourceNode::Group(g) => g.enabled,
        }
    }
    fn own_composition(&self) -> Composition {
        match self {
            SourceNode::Endpoint(e) => Composition {
                volume: e.volume,
                equalizer: e.equalizer,
                delay_ms: e.delay_ms,
                timeshift_sec: e.timeshift_sec,
            },
            SourceNode::Group(g) => Composition {
                volume: g.volume,
                equalizer: g.equalizer,
                delay_ms: g.delay_ms,
                timeshift_sec: g.timeshift_sec,
            },
        }
    }
    fn children(&self) -> Option<&[String]> {
        match self {
            SourceNode::Endpoint(_) => None,
            SourceNode::Group(g) => Some(&g.members),
        }
    }
}

/// A user-authored route between a (possibly grouped) source and a
/// (possibly grouped) sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteDescription {
    pub name: String,
    pub source: String,
    pub sink: String,
    pub enabled: bool,
    pub volume: f32,
    pub equalizer: Equalizer,
    pub delay_ms: u32,
    pub timeshift_sec: f32,
}

/// The full user-facing graph: every source, sink and route, groups
/// included. This is `solve`'s input.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserGraph {
    pub sources: Vec<SourceNode>,
    pub sinks: Vec<SinkNode>,
    pub routes: Vec<RouteDescription>,
}

/// A flat output endpoint, after groups have been resolved away. This is
/// one half of `solve`'s output (desired state).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sink {
    pub id: SinkId,
    pub output_ip: IpAddr,
    pub output_port: u16,
    pub protocol: Protocol,
    pub format: StreamFormat,
    pub volume: f32,
    pub equalizer: Equalizer,
    pub delay_ms: u32,
    pub timeshift_sec: f32,
    pub time_sync_offset_samples: Option<i64>,
}

impl Sink {
    /// Structural fields: differing on these means destroy+create, never
    /// an in-place update, per spec §4.8.
    pub fn structural_eq(&self, other: &Sink) -> bool {
        self.output_ip == other.output_ip
            && self.output_port == other.output_port
            && self.protocol == other.protocol
            && self.format == other.format
    }
}

/// Per-output-channel-count speaker remap matrix (row = output channel,
/// column = input channel).
pub type SpeakerMatrix = [[f32; 8]; 8];

/// A flat source -> sink edge, the audio plane's unit of DSP work. This is
/// the other half of `solve`'s output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcePath {
    pub path_id: PathId,
    pub source_tag: String,
    pub target_sink_id: SinkId,
    pub volume: f32,
    pub equalizer: Equalizer,
    pub delay_ms: u32,
    pub timeshift_sec: f32,
    pub target_channels: u8,
    pub target_sample_rate: u32,
    pub speaker_layouts: HashMap<u8, SpeakerMatrix>,
    pub auto_mode: bool,
    pub eq_normalization: bool,
    pub volume_normalization: bool,
}

impl SourcePath {
    /// Structural fields: differing on these means destroy+create, per
    /// spec §4.8.
    pub fn structural_eq(&self, other: &SourcePath) -> bool {
        self.source_tag == other.source_tag
            && self.target_sink_id == other.target_sink_id
            && self.target_channels == other.target_channels
            && self.target_sample_rate == other.target_sample_rate
    }
}

/// The solver's output: everything the audio plane needs to run, with
/// groups already flattened away. This is what a control plane hands to
/// `apply_state`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DesiredState {
    pub sinks: Vec<Sink>,
    pub source_paths: Vec<SourcePath>,
}
