use std::collections::HashSet;

use renderdoc_bridge_core::types::{
    ActionFlags, ActionRecord, ActionTiming, ActionTimings, DrawCallDetails, DrawCallList,
    GetActionTimingsArgs, GetDrawCallsArgs,
};

use super::CaptureFacade;
use crate::error::{FacadeError, ReplayError};
use crate::replay::ActionNode;

/// Node-level filters composed by logical AND.
///
/// A node that fails `keeps` is dropped but its kept descendants take its
/// place. A node matching `exclude` is dropped with its whole subtree.
#[derive(Debug, Default)]
pub(crate) struct ActionFilter<'a> {
    pub event_id_min: Option<u32>,
    pub event_id_max: Option<u32>,
    pub exclude: &'a [String],
    pub only_actions: bool,
    pub flags: Option<ActionFlags>,
}

impl ActionFilter<'_> {
    fn prunes(&self, node: &ActionNode) -> bool {
        node.is_region() && self.exclude.iter().any(|name| *name == node.name)
    }

    fn keeps(&self, node: &ActionNode) -> bool {
        let in_range = self.event_id_min.map_or(true, |min| node.event_id >= min)
            && self.event_id_max.map_or(true, |max| node.event_id <= max);
        in_range
            && !(self.only_actions && node.is_marker())
            && self.flags.map_or(true, |flags| node.flags.intersects(flags))
    }

    fn apply<'n>(
        &self,
        nodes: impl IntoIterator<Item = &'n ActionNode>,
        parent: Option<u32>,
        out: &mut Vec<ActionRecord>,
    ) {
        for node in nodes {
            if self.prunes(node) {
                continue;
            }
            if self.keeps(node) {
                let mut children = Vec::new();
                self.apply(&node.children, Some(node.event_id), &mut children);
                out.push(ActionRecord {
                    event_id: node.event_id,
                    name: node.name.clone(),
                    flags: node.flags,
                    parent_event_id: parent,
                    children,
                });
            } else {
                self.apply(&node.children, Some(node.event_id), out);
            }
        }
    }

    /// Filters the whole tree, or only the body of the first marker named
    /// `marker` when one is given. No such marker yields nothing.
    pub fn select(&self, roots: &[ActionNode], marker: Option<&str>) -> Vec<ActionRecord> {
        let mut out = Vec::new();
        match marker {
            Some(name) => {
                if let Some(region) = find_marker(roots, name, self.exclude) {
                    let body = region
                        .children
                        .iter()
                        .filter(|child| !child.flags.contains(ActionFlags::POP_MARKER));
                    self.apply(body, Some(region.event_id), &mut out);
                }
            }
            None => self.apply(roots, None, &mut out),
        }
        out
    }
}

/// First marker in pre-order whose name is exactly `name`, skipping pruned
/// subtrees.
fn find_marker<'n>(nodes: &'n [ActionNode], name: &str, exclude: &[String]) -> Option<&'n ActionNode> {
    for node in nodes {
        let is_marker = node.is_region() || node.flags.contains(ActionFlags::SET_MARKER);
        if is_marker && exclude.iter().any(|excluded| *excluded == node.name) {
            continue;
        }
        if is_marker && node.name == name {
            return Some(node);
        }
        if let Some(found) = find_marker(&node.children, name, exclude) {
            return Some(found);
        }
    }
    None
}

fn count_records(records: &[ActionRecord]) -> usize {
    records
        .iter()
        .map(|record| 1 + count_records(&record.children))
        .sum()
}

impl CaptureFacade {
    pub fn get_draw_calls(&self, args: &GetDrawCallsArgs) -> Result<DrawCallList, FacadeError> {
        let session = self.session()?;
        let flags = args.parsed_flags().map_err(FacadeError::InvalidArgument)?;

        let filter = ActionFilter {
            event_id_min: args.event_id_min,
            event_id_max: args.event_id_max,
            exclude: &args.exclude_markers,
            only_actions: args.only_actions,
            flags,
        };
        let mut actions = filter.select(session.roots(), args.marker_filter.as_deref());

        if !args.include_children {
            for action in &mut actions {
                action.children.clear();
            }
        }

        Ok(DrawCallList {
            total: count_records(&actions),
            actions,
        })
    }

    pub fn get_draw_call_details(&self, event_id: u32) -> Result<DrawCallDetails, FacadeError> {
        let session = self.session()?;
        let node = session
            .action(event_id)
            .ok_or_else(|| FacadeError::NotFound(format!("Event {event_id} not found")))?;

        let marker_path = session
            .ancestors(event_id)
            .into_iter()
            .filter(|ancestor| ancestor.is_region())
            .map(|ancestor| ancestor.name.clone())
            .collect();

        Ok(DrawCallDetails {
            event_id,
            name: node.name.clone(),
            flags: node.flags,
            parent_event_id: session.parent_of(event_id),
            marker_path,
            child_count: node.children.len(),
            num_indices: node.num_indices,
            num_instances: node.num_instances,
            index_offset: node.index_offset,
            base_vertex: node.base_vertex,
            vertex_offset: node.vertex_offset,
            instance_offset: node.instance_offset,
            dispatch_dimension: node.dispatch_dimension,
            outputs: node
                .outputs
                .iter()
                .filter(|id| !id.is_null())
                .map(|id| session.resource_ref(*id))
                .collect(),
            depth_output: node
                .depth_output
                .filter(|id| !id.is_null())
                .map(|id| session.resource_ref(id)),
        })
    }

    pub fn get_action_timings(
        &mut self,
        args: &GetActionTimingsArgs,
    ) -> Result<ActionTimings, FacadeError> {
        let session = self.session_mut()?;

        let durations = match session.controller_mut().gpu_durations() {
            Ok(Some(durations)) => durations,
            Ok(None) => {
                return Ok(ActionTimings::unavailable(
                    "GPU duration counter is not supported for this capture",
                ))
            }
            Err(ReplayError::Unsupported(reason)) => return Ok(ActionTimings::unavailable(reason)),
            Err(e) => return Err(e.into()),
        };

        let filter = ActionFilter {
            exclude: &args.exclude_markers,
            only_actions: true,
            ..Default::default()
        };
        let selected = filter.select(session.roots(), args.marker_filter.as_deref());
        let mut ids = Vec::new();
        for record in &selected {
            record.flatten_ids(&mut ids);
        }
        if let Some(wanted) = &args.event_ids {
            let wanted: HashSet<u32> = wanted.iter().copied().collect();
            ids.retain(|id| wanted.contains(id));
        }

        let timings: Vec<ActionTiming> = ids
            .into_iter()
            .filter_map(|id| {
                let seconds = *durations.get(&id)?;
                let name = session.action(id)?.name.clone();
                Some(ActionTiming {
                    event_id: id,
                    name,
                    duration_seconds: seconds,
                    duration_ms: seconds * 1000.0,
                })
            })
            .collect();

        Ok(ActionTimings {
            available: true,
            reason: None,
            unit: Some("seconds".to_string()),
            total_duration_ms: timings.iter().map(|t| t.duration_ms).sum(),
            count: timings.len(),
            timings,
        })
    }
}
