use std::collections::BTreeMap;

use crate::ids::{PathId, SinkId};
use crate::model::{DesiredState, Sink, SourcePath};

/// One step the engine must take to move live state to desired state.
/// Ordered so a whole `Vec<ApplyOp>` can be executed front-to-back safely:
/// paths are always destroyed before the sinks they read from, and sinks
/// are always created before the paths that target them (spec §4.8).
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOp {
    DestroyPath(PathId),
    DestroySink(SinkId),
    CreateSink(Sink),
    CreatePath(SourcePath),
    UpdateSink(Sink),
    UpdatePath(SourcePath),
}

/// Pure diff between the currently-running state and a freshly solved
/// desired state. Returns the ordered list of operations the engine applies
/// to converge; takes no lock and performs no I/O itself.
pub fn diff(live: &DesiredState, desired: &DesiredState) -> Vec<ApplyOp> {
    let live_sinks: BTreeMap<&SinkId, &Sink> = live.sinks.iter().map(|s| (&s.id, s)).collect();
    let desired_sinks: BTreeMap<&SinkId, &Sink> =
        desired.sinks.iter().map(|s| (&s.id, s)).collect();
    let live_paths: BTreeMap<&PathId, &SourcePath> =
        live.source_paths.iter().map(|p| (&p.path_id, p)).collect();
    let desired_paths: BTreeMap<&PathId, &SourcePath> = desired
        .source_paths
        .iter()
        .map(|p| (&p.path_id, p))
        .collect();

    let mut destroy_paths = Vec::new();
    let mut destroy_sinks = Vec::new();
    let mut create_sinks = Vec::new();
    let mut create_paths = Vec::new();
    let mut update_sinks = Vec::new();
    let mut update_paths = Vec::new();

    for (id, live_path) in &live_paths {
        match desired_paths.get(id) {
            None => destroy_paths.push(ApplyOp::DestroyPath((**id).clone())),
            Some(desired_path) => {
                if !live_path.structural_eq(desired_path) {
                    destroy_paths.push(ApplyOp::DestroyPath((**id).clone()));
                    create_paths.push(ApplyOp::CreatePath((*desired_path).clone()));
                } else if *live_path != **desired_path {
                    update_paths.push(ApplyOp::UpdatePath((*desired_path).clone()));
                }
            }
        }
    }

    for (id, live_sink) in &live_sinks {
        match desired_sinks.get(id) {
            None => destroy_sinks.push(ApplyOp::DestroySink((**id).clone())),
            Some(desired_sink) => {
                if !live_sink.structural_eq(desired_sink) {
                    destroy_sinks.push(ApplyOp::DestroySink((**id).clone()));
                    create_sinks.push(ApplyOp::CreateSink((*desired_sink).clone()));
                } else if *live_sink != **desired_sink {
                    update_sinks.push(ApplyOp::UpdateSink((*desired_sink).clone()));
                }
            }
        }
    }

    for (id, desired_sink) in &desired_sinks {
        if !live_sinks.contains_key(id) {
            create_sinks.push(ApplyOp::CreateSink((*desired_sink).clone()));
        }
    }
    for (id, desired_path) in &desired_paths {
        if !live_paths.contains_key(id) {
            create_paths.push(ApplyOp::CreatePath((*desired_path).clone()));
        }
    }

    let mut ops = Vec::with_capacity(
        destroy_paths.len()
            + destroy_sinks.len()
            + create_sinks.len()
            + create_paths.len()
            + update_sinks.len()
            + update_paths.len(),
    );
    ops.extend(destroy_paths);
    ops.extend(destroy_sinks);
    ops.extend(create_sinks);
    ops.extend(create_paths);
    ops.extend(update_sinks);
    ops.extend(update_paths);
    ops
}
