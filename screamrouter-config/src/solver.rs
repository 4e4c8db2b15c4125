use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};

use crate::error::ConfigError;
use crate::ids::{PathId, SinkId};
use crate::model::{
    Composition, DesiredState, RouteDescription, Sink, SinkEndpoint, SinkNode, SourceEndpoint,
    SourceNode, SourcePath, UserGraph,
};

/// Resolves a named sink (endpoint or group) into its flattened list of
/// endpoints. Each endpoint is paired with two compositions: the chain
/// accumulated through its ancestor groups only (`group_chain`, excluding
/// the endpoint's own volume/EQ/delay/timeshift), and the full composition
/// including the endpoint's own values (`full`). `parent` is the
/// group-chain composition already accumulated by the caller (route-level
/// adjustment, or the parent group's own values when recursing).
///
/// The split exists because the sink endpoint's own gain/EQ is applied by
/// the mixer directly off the `Sink` record (spec §4.5 step 3); only the
/// group chain above it gets folded into each `SourcePath`, or the mixer
/// and the path would both apply the endpoint's gain/EQ. Delay and
/// timeshift have no such second application site, so both fold the full
/// chain into the path as before.
fn resolve_sink_endpoints<'g>(
    graph: &'g UserGraph,
    name: &str,
    parent: Composition,
    visited: &mut HashSet<String>,
) -> Result<Vec<(&'g SinkEndpoint, Composition, Composition)>, ConfigError> {
    let node = graph
        .sinks
        .iter()
        .find(|s| s.name() == name)
        .ok_or_else(|| ConfigError::UnknownReference {
            route: String::new(),
            kind: "sink",
            name: name.to_string(),
        })?;

    if !node.enabled() {
        return Ok(Vec::new());
    }
    if !visited.insert(name.to_string()) {
        return Err(ConfigError::CyclicGroup {
            kind: "sink",
            name: name.to_string(),
        });
    }

    let result = match node {
        SinkNode::Endpoint(endpoint) => {
            let full = parent.compose_with(node.own_composition());
            vec![(endpoint, parent, full)]
        }
        SinkNode::Group(group) => {
            let composed = parent.compose_with(node.own_composition());
            let mut out = Vec::new();
            for member in &group.members {
                out.extend(resolve_sink_endpoints(graph, member, composed, visited)?);
            }
            out
        }
    };
    visited.remove(name);
    Ok(result)
}

fn resolve_source_endpoints<'g>(
    graph: &'g UserGraph,
    name: &str,
    parent: Composition,
    visited: &mut HashSet<String>,
) -> Result<Vec<(&'g SourceEndpoint, Composition)>, ConfigError> {
    let node = graph
        .sources
        .iter()
        .find(|s| s.name() == name)
        .ok_or_else(|| ConfigError::UnknownReference {
            route: String::new(),
            kind: "source",
            name: name.to_string(),
        })?;

    if !node.enabled() {
        return Ok(Vec::new());
    }
    if !visited.insert(name.to_string()) {
        return Err(ConfigError::CyclicGroup {
            kind: "source",
            name: name.to_string(),
        });
    }

    let composed = parent.compose_with(node.own_composition());
    let result = match node {
        SourceNode::Endpoint(endpoint) => vec![(endpoint, composed)],
        SourceNode::Group(group) => {
            let mut out = Vec::new();
            for member in &group.members {
                out.extend(resolve_source_endpoints(graph, member, composed, visited)?);
            }
            out
        }
    };
    visited.remove(name);
    Ok(result)
}

fn route_composition(route: &RouteDescription) -> Composition {
    Composition {
        volume: route.volume,
        equalizer: route.equalizer,
        delay_ms: route.delay_ms,
        timeshift_sec: route.timeshift_sec,
    }
}

fn sink_id_for(name: &str) -> SinkId {
    SinkId(name.to_string())
}

/// Derives a stable `path_id` from the edge's identity. The same
/// `(source_tag, target_sink_id)` pair always hashes to the same id, which
/// is what lets the applier recognize "this is the same path, update in
/// place" across configuration reloads (spec invariant 3).
fn path_id_for(source_tag: &str, sink_id: &SinkId) -> PathId {
    let mut hasher = DefaultHasher::new();
    source_tag.hash(&mut hasher);
    sink_id.0.hash(&mut hasher);
    PathId(hasher.finish())
}

/// Pure function mapping a user graph to the flat desired state the audio
/// plane executes: a list of `Sink`s and a list of `SourcePath`s. Calling
/// `solve` twice with the same `graph` yields byte-identical output
/// (ordering included), per spec §4.7's purity invariant.
pub fn solve(graph: &UserGraph) -> Result<DesiredState, ConfigError> {
    let mut sinks: Vec<Sink> = Vec::new();
    let mut sink_seen: HashSet<SinkId> = HashSet::new();

    // Paths are accumulated in a map keyed by (source_tag, sink_id) so that
    // overlapping routes merge per spec invariant 4 / scenario C.
    let mut paths: HashMap<(String, SinkId), SourcePath> = HashMap::new();
    let mut path_order: Vec<(String, SinkId)> = Vec::new();

    for route in &graph.routes {
        if !route.enabled {
            continue;
        }

        let mut sink_visited = HashSet::new();
        let resolved_sinks =
            resolve_sink_endpoints(graph, &route.sink, Composition::default(), &mut sink_visited)
                .map_err(|e| annotate_route(e, &route.name))?;

        let mut source_visited = HashSet::new();
        let resolved_sources = resolve_source_endpoints(
            graph,
            &route.source,
            route_composition(route),
            &mut source_visited,
        )
        .map_err(|e| annotate_route(e, &route.name))?;

        for (sink_endpoint, sink_group_chain, sink_full) in &resolved_sinks {
            let sink_id = sink_id_for(&sink_endpoint.name);
            if sink_seen.insert(sink_id.clone()) {
                sinks.push(Sink {
                    id: sink_id.clone(),
                    output_ip: sink_endpoint.output_ip,
                    output_port: sink_endpoint.output_port,
                    protocol: sink_endpoint.protocol,
                    format: sink_endpoint.format,
                    // The endpoint's own gain/EQ only, not the group chain:
                    // the mixer applies this directly, and the group chain
                    // is already folded into every connected path below.
                    volume: sink_endpoint.volume.clamp(0.0, 1.0),
                    equalizer: sink_endpoint.equalizer.clamped(),
                    delay_ms: sink_full.delay_ms,
                    timeshift_sec: sink_full.timeshift_sec,
                    time_sync_offset_samples: sink_endpoint.time_sync_offset_samples,
                });
            }

            for (source_endpoint, source_composed) in &resolved_sources {
                // Only the sink-group chain folds into the path; the sink
                // endpoint's own volume/equalizer is applied once, by the
                // mixer, off the `Sink` record above.
                let volume =
                    (source_composed.volume * sink_group_chain.volume).clamp(0.0, 1.0);
                let equalizer =
                    (source_composed.equalizer * sink_group_chain.equalizer).clamped();
                let delay_ms = source_composed.delay_ms + sink_full.delay_ms;
                // timeshift_sec must never go positive (spec invariant 7).
                let timeshift_sec =
                    (source_composed.timeshift_sec + sink_full.timeshift_sec).min(0.0);

                let key = (source_endpoint.tag.clone(), sink_id.clone());
                match paths.get_mut(&key) {
                    Some(existing) => {
                        existing.volume = (existing.volume + volume).min(1.0);
                    }
                    None => {
                        let path_id = path_id_for(&source_endpoint.tag, &sink_id);
                        let mut speaker_layouts = source_endpoint.custom_speaker_layouts.clone();
                        if source_endpoint.auto_mode {
                            speaker_layouts
                                .entry(sink_endpoint.format.channels)
                                .or_insert_with(|| {
                                    crate::remap::auto_matrix(8, sink_endpoint.format.channels)
                                });
                        }
                        paths.insert(
                            key.clone(),
                            SourcePath {
                                path_id,
                                source_tag: source_endpoint.tag.clone(),
                                target_sink_id: sink_id.clone(),
                                volume,
                                equalizer,
                                delay_ms,
                                timeshift_sec,
                                target_channels: sink_endpoint.format.channels,
                                target_sample_rate: sink_endpoint.format.sample_rate,
                                speaker_layouts,
                                auto_mode: source_endpoint.auto_mode,
                                eq_normalization: source_endpoint.eq_normalization,
                                volume_normalization: source_endpoint.volume_normalization,
                            },
                        );
                        path_order.push(key);
                    }
                }
            }
        }
    }

    let source_paths = path_order
        .into_iter()
        .map(|key| paths.remove(&key).expect("key was just inserted"))
        .collect();

    Ok(DesiredState {
        sinks,
        source_paths,
    })
}

fn annotate_route(err: ConfigError, route_name: &str) -> ConfigError {
    match err {
        ConfigError::UnknownReference { kind, name, .. } => ConfigError::UnknownReference {
            route: route_name.to_string(),
            kind,
            name,
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equalizer::Equalizer;
    use crate::model::{Protocol, SinkGroup};
    use screamrouter_codec::StreamFormat;
    use std::net::{IpAddr, Ipv4Addr};

    fn endpoint_sink(name: &str, port: u16) -> SinkNode {
        SinkNode::Endpoint(SinkEndpoint {
            name: name.to_string(),
            enabled: true,
            output_ip: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            output_port: port,
            protocol: Protocol::Scream,
            format: StreamFormat::new(48_000, 16, 2).unwrap(),
            volume: 1.0,
            equalizer: Equalizer::unity(),
            delay_ms: 0,
            timeshift_sec: 0.0,
            time_sync_offset_samples: None,
        })
    }

    fn endpoint_source(name: &str, tag: &str, volume: f32) -> SourceNode {
        SourceNode::Endpoint(SourceEndpoint {
            name: name.to_string(),
            tag: tag.to_string(),
            enabled: true,
            volume,
            equalizer: Equalizer::unity(),
            delay_ms: 0,
            timeshift_sec: 0.0,
            auto_mode: true,
            eq_normalization: false,
            volume_normalization: false,
            custom_speaker_layouts: HashMap::new(),
        })
    }

    fn route(name: &str, source: &str, sink: &str, volume: f32) -> RouteDescription {
        RouteDescription {
            name: name.to_string(),
            source: source.to_string(),
            sink: sink.to_string(),
            enabled: true,
            volume,
            equalizer: Equalizer::unity(),
            delay_ms: 0,
            timeshift_sec: 0.0,
        }
    }

    #[test]
    fn scenario_a_single_source_single_sink() {
        let graph = UserGraph {
            sources: vec![endpoint_source("Src", "10.0.0.2", 1.0)],
            sinks: vec![endpoint_sink("Sink1", 5000)],
            routes: vec![route("R1", "Src", "Sink1", 1.0)],
        };
        let desired = solve(&graph).unwrap();
        assert_eq!(desired.sinks.len(), 1);
        assert_eq!(desired.source_paths.len(), 1);
        assert_eq!(desired.source_paths[0].volume, 1.0);
        assert_eq!(desired.source_paths[0].target_sink_id, desired.sinks[0].id);
    }

    #[test]
    fn scenario_b_gain_composition() {
        // route 0.5 * source 0.5 * sink 0.5 must net to 0.125 at the wire.
        // The sink endpoint's own gain is applied once, by the mixer off
        // `Sink.volume`, not folded into the path as well — so the path
        // itself only carries route*source (0.25), and the sink endpoint's
        // own 0.5 is the other factor the mixer multiplies in.
        let graph = UserGraph {
            sources: vec![endpoint_source("Src", "10.0.0.2", 0.5)],
            sinks: vec![{
                let mut s = endpoint_sink("Sink1", 5000);
                if let SinkNode::Endpoint(ref mut e) = s {
                    e.volume = 0.5;
                }
                s
            }],
            routes: vec![route("R1", "Src", "Sink1", 0.5)],
        };
        let desired = solve(&graph).unwrap();
        assert!((desired.source_paths[0].volume - 0.25).abs() < 1e-6);
        assert!((desired.sinks[0].volume - 0.5).abs() < 1e-6);
        let wire = desired.source_paths[0].volume * desired.sinks[0].volume;
        assert!((wire - 0.125).abs() < 1e-6);
    }

    #[test]
    fn scenario_c_overlapping_routes_merge_gain() {
        let graph = UserGraph {
            sources: vec![endpoint_source("Src", "A", 1.0)],
            sinks: vec![endpoint_sink("Sink1", 5000)],
            routes: vec![
                route("R1", "Src", "Sink1", 0.6),
                route("R2", "Src", "Sink1", 0.5),
            ],
        };
        let desired = solve(&graph).unwrap();
        assert_eq!(desired.source_paths.len(), 1);
        assert_eq!(desired.source_paths[0].volume, 1.0);
    }

    #[test]
    fn invariant_every_path_sink_id_resolves() {
        let graph = UserGraph {
            sources: vec![
                endpoint_source("S1", "A", 1.0),
                endpoint_source("S2", "B", 1.0),
            ],
            sinks: vec![endpoint_sink("Sink1", 5000), endpoint_sink("Sink2", 5001)],
            routes: vec![
                route("R1", "S1", "Sink1", 1.0),
                route("R2", "S2", "Sink2", 1.0),
            ],
        };
        let desired = solve(&graph).unwrap();
        let sink_ids: HashSet<_> = desired.sinks.iter().map(|s| s.id.clone()).collect();
        for path in &desired.source_paths {
            assert!(sink_ids.contains(&path.target_sink_id));
        }
    }

    #[test]
    fn solve_is_idempotent_and_deterministic() {
        let graph = UserGraph {
            sources: vec![endpoint_source("Src", "A", 1.0)],
            sinks: vec![endpoint_sink("Sink1", 5000)],
            routes: vec![route("R1", "Src", "Sink1", 1.0)],
        };
        let first = solve(&graph).unwrap();
        let second = solve(&graph).unwrap();
        assert_eq!(
            first.source_paths[0].path_id,
            second.source_paths[0].path_id
        );
        assert_eq!(first.sinks[0].id, second.sinks[0].id);
    }

    #[test]
    fn disabled_route_is_pruned() {
        let mut graph = UserGraph {
            sources: vec![endpoint_source("Src", "A", 1.0)],
            sinks: vec![endpoint_sink("Sink1", 5000)],
            routes: vec![route("R1", "Src", "Sink1", 1.0)],
        };
        graph.routes[0].enabled = false;
        let desired = solve(&graph).unwrap();
        assert!(desired.source_paths.is_empty());
        assert!(desired.sinks.is_empty());
    }

    #[test]
    fn cyclic_sink_group_is_rejected() {
        let graph = UserGraph {
            sources: vec![endpoint_source("Src", "A", 1.0)],
            sinks: vec![
                SinkNode::Group(SinkGroup {
                    name: "GroupA".to_string(),
                    enabled: true,
                    volume: 1.0,
                    equalizer: Equalizer::unity(),
                    delay_ms: 0,
                    timeshift_sec: 0.0,
                    members: vec!["GroupB".to_string()],
                }),
                SinkNode::Group(SinkGroup {
                    name: "GroupB".to_string(),
                    enabled: true,
                    volume: 1.0,
                    equalizer: Equalizer::unity(),
                    delay_ms: 0,
                    timeshift_sec: 0.0,
                    members: vec!["GroupA".to_string()],
                }),
            ],
            routes: vec![route("R1", "Src", "GroupA", 1.0)],
        };
        assert!(matches!(solve(&graph), Err(ConfigError::CyclicGroup { .. })));
    }

    #[test]
    fn group_gain_folds_into_members() {
        // Group1's gain folds into the path (not into the Sink record,
        // which stays the endpoint's own volume) since the mixer applies
        // the endpoint's own gain separately. Delay has no second
        // application site, so it folds fully into the Sink record as
        // before.
        let graph = UserGraph {
            sources: vec![endpoint_source("Src", "A", 1.0)],
            sinks: vec![
                SinkNode::Group(SinkGroup {
                    name: "Group1".to_string(),
                    enabled: true,
                    volume: 0.5,
                    equalizer: Equalizer::unity(),
                    delay_ms: 10,
                    timeshift_sec: 0.0,
                    members: vec!["Sink1".to_string()],
                }),
                endpoint_sink("Sink1", 5000),
            ],
            routes: vec![route("R1", "Src", "Group1", 1.0)],
        };
        let desired = solve(&graph).unwrap();
        assert_eq!(desired.sinks.len(), 1);
        assert!((desired.sinks[0].volume - 1.0).abs() < 1e-6);
        assert_eq!(desired.sinks[0].delay_ms, 10);
        assert!((desired.source_paths[0].volume - 0.5).abs() < 1e-6);
    }
}
