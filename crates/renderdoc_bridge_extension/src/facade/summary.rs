use std::collections::{BTreeMap, BTreeSet, HashSet};

use renderdoc_bridge_core::types::{
    ActionFlags, ActionStatistics, FrameSummary, MarkerSummary, ResourceCounts, ResourceId,
};

use super::CaptureFacade;
use crate::error::FacadeError;

impl CaptureFacade {
    /// One pass over the action tree. Shader counts cover the shaders bound
    /// at the draws and dispatches visited, not every shader in the capture.
    pub fn get_frame_summary(&mut self) -> Result<FrameSummary, FacadeError> {
        let session = self.session_mut()?;

        let mut statistics = ActionStatistics::default();
        let mut seen_targets = HashSet::new();
        let mut render_targets = Vec::new();
        let mut work_events = Vec::new();

        for node in session.preorder() {
            let flags = node.flags;
            if node.is_draw_like() {
                work_events.push(node.event_id);
            }
            if flags.intersects(ActionFlags::DRAWCALL | ActionFlags::MESH_DISPATCH) {
                statistics.draw_calls += 1;
            }
            if flags.contains(ActionFlags::DISPATCH) {
                statistics.dispatches += 1;
            }
            if flags.contains(ActionFlags::CLEAR) {
                statistics.clears += 1;
            }
            if flags.intersects(ActionFlags::COPY | ActionFlags::RESOLVE) {
                statistics.copies += 1;
            }
            if flags.contains(ActionFlags::PRESENT) {
                statistics.presents += 1;
            }
            if flags.intersects(ActionFlags::PUSH_MARKER | ActionFlags::SET_MARKER) {
                statistics.markers += 1;
            }

            let outputs = node.outputs.iter().copied().chain(node.depth_output);
            for id in outputs.filter(|id| !id.is_null()) {
                if seen_targets.insert(id) {
                    render_targets.push(session.resource_ref(id));
                }
            }
        }

        let top_level_markers = session
            .roots()
            .iter()
            .filter(|node| node.is_region())
            .map(|node| MarkerSummary {
                name: node.name.clone(),
                event_id: node.event_id,
                child_count: node.children.len(),
            })
            .collect();

        let mut shaders_by_stage: BTreeMap<_, BTreeSet<ResourceId>> = BTreeMap::new();
        let controller = session.controller_mut();
        for event_id in work_events {
            controller.set_frame_event(event_id);
            for bound in controller.pipeline_state()?.shaders {
                if !bound.shader.is_null() {
                    shaders_by_stage
                        .entry(bound.stage)
                        .or_default()
                        .insert(bound.shader);
                }
            }
        }
        let shader_counts = shaders_by_stage
            .into_iter()
            .map(|(stage, ids)| (stage, ids.len()))
            .collect();

        Ok(FrameSummary {
            api: session.api().to_string(),
            total_events: session.total_events(),
            statistics,
            top_level_markers,
            render_targets,
            shader_counts,
            resource_counts: ResourceCounts {
                textures: session.texture_count(),
                buffers: session.buffer_count(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use renderdoc_bridge_core::types::ShaderStage;
    use serde_json::json;

    #[test]
    fn test_frame_summary_counts() {
        let summary = loaded_facade().get_frame_summary().unwrap();
        assert_eq!(summary.api, "Vulkan");
        assert_eq!(summary.total_events, 13);
        assert_eq!(summary.statistics.draw_calls, 3);
        assert_eq!(summary.statistics.dispatches, 1);
        assert_eq!(summary.statistics.clears, 1);
        assert_eq!(summary.statistics.copies, 1);
        assert_eq!(summary.statistics.presents, 1);
        assert_eq!(summary.statistics.markers, 3);

        let markers: Vec<(&str, usize)> = summary
            .top_level_markers
            .iter()
            .map(|m| (m.name.as_str(), m.child_count))
            .collect();
        assert_eq!(markers, vec![("Shadow", 2), ("Main", 3)]);

        let targets: Vec<_> = summary
            .render_targets
            .iter()
            .map(|r| r.name.as_deref().unwrap_or_default())
            .collect();
        assert_eq!(targets, vec!["SceneColor", "SceneDepth"]);

        assert_eq!(summary.shader_counts[&ShaderStage::Vertex], 2);
        assert_eq!(summary.shader_counts[&ShaderStage::Pixel], 1);
        assert_eq!(summary.shader_counts[&ShaderStage::Compute], 1);
        assert_eq!(summary.resource_counts.textures, 6);
        assert_eq!(summary.resource_counts.buffers, 3);
    }

    #[test]
    fn test_shader_counts_ignore_unbound_shaders() {
        let mut document = sample_document();
        let shaders = document["shaders"].as_array_mut().unwrap();
        shaders.push(json!({"resource_id": 304, "name": "DebugPS", "stage": "pixel"}));
        shaders.push(json!({"resource_id": 305, "name": "UnusedCS", "stage": "compute"}));
        // Pipeline state bound after the last draw is never visited.
        document["pipelines"][3]["shaders"] =
            json!([{"stage": "pixel", "shader": 304, "entry_point": "main"}]);

        let summary = loaded_facade_with(&document).get_frame_summary().unwrap();
        assert_eq!(summary.shader_counts[&ShaderStage::Pixel], 1);
        assert_eq!(summary.shader_counts[&ShaderStage::Compute], 1);
        assert_eq!(summary.shader_counts[&ShaderStage::Vertex], 2);
    }
}
