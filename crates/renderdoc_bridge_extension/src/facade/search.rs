use renderdoc_bridge_core::types::{ResourceId, SearchMatch, SearchResult, ShaderStage};

use super::CaptureFacade;
use crate::error::FacadeError;
use crate::replay::PipelineSnapshot;
use crate::session::CaptureSession;

impl CaptureFacade {
    pub fn find_draws_by_shader(
        &mut self,
        shader_name: &str,
        stage: Option<ShaderStage>,
    ) -> Result<SearchResult, FacadeError> {
        let needle = shader_name.to_lowercase();
        let stages: Vec<ShaderStage> = match stage {
            Some(stage) => vec![stage],
            None => ShaderStage::ALL.to_vec(),
        };

        self.scan_draws(shader_name, |session, snapshot| {
            stages
                .iter()
                .filter_map(|stage| {
                    let bound = snapshot.shader(*stage)?;
                    let name = session.resource_name(bound.shader).unwrap_or_default();
                    let hit = name.to_lowercase().contains(&needle)
                        || bound.entry_point.to_lowercase().contains(&needle);
                    hit.then(|| {
                        let label = if name.is_empty() {
                            bound.shader.to_string()
                        } else {
                            name
                        };
                        format!("{stage} shader '{label}' (entry: {})", bound.entry_point)
                    })
                })
                .collect()
        })
    }

    pub fn find_draws_by_texture(&mut self, texture_name: &str) -> Result<SearchResult, FacadeError> {
        let needle = texture_name.to_lowercase();

        self.scan_draws(texture_name, |session, snapshot| {
            let named = |id: ResourceId| {
                session
                    .resource_name(id)
                    .filter(|name| name.to_lowercase().contains(&needle))
            };

            let mut reasons = Vec::new();
            for bound in &snapshot.shaders {
                for binding in &bound.read_only {
                    if let Some(name) = named(binding.resource) {
                        reasons.push(format!(
                            "{} read-only slot {} '{name}'",
                            bound.stage, binding.slot
                        ));
                    }
                }
                for binding in &bound.read_write {
                    if let Some(name) = named(binding.resource) {
                        reasons.push(format!(
                            "{} read-write slot {} '{name}'",
                            bound.stage, binding.slot
                        ));
                    }
                }
            }
            for (i, target) in snapshot.render_targets.iter().enumerate() {
                if let Some(name) = named(*target) {
                    reasons.push(format!("render target {i} '{name}'"));
                }
            }
            if let Some(name) = snapshot.depth_target.and_then(named) {
                reasons.push(format!("depth target '{name}'"));
            }
            reasons
        })
    }

    pub fn find_draws_by_resource(&mut self, resource_id: ResourceId) -> Result<SearchResult, FacadeError> {
        let query = resource_id.to_string();

        self.scan_draws(&query, |_, snapshot| {
            let mut reasons = Vec::new();
            for bound in &snapshot.shaders {
                if bound.shader == resource_id {
                    reasons.push(format!("bound as {} shader", bound.stage));
                }
                for binding in &bound.read_only {
                    if binding.resource == resource_id {
                        reasons.push(format!("{} read-only slot {}", bound.stage, binding.slot));
                    }
                }
                for binding in &bound.read_write {
                    if binding.resource == resource_id {
                        reasons.push(format!("{} read-write slot {}", bound.stage, binding.slot));
                    }
                }
                for cb in &bound.constant_buffers {
                    if cb.resource == resource_id {
                        reasons.push(format!("{} constant buffer slot {}", bound.stage, cb.slot));
                    }
                }
            }
            if snapshot.vertex_buffers.contains(&resource_id) {
                reasons.push("vertex buffer".to_string());
            }
            if snapshot.index_buffer == Some(resource_id) {
                reasons.push("index buffer".to_string());
            }
            if snapshot.render_targets.contains(&resource_id) {
                reasons.push("render target".to_string());
            }
            if snapshot.depth_target == Some(resource_id) {
                reasons.push("depth target".to_string());
            }
            reasons
        })
    }

    /// Replays every draw and dispatch in event order and records the events
    /// for which `reasons` finds something.
    fn scan_draws<F>(&mut self, query: &str, mut reasons: F) -> Result<SearchResult, FacadeError>
    where
        F: FnMut(&CaptureSession, &PipelineSnapshot) -> Vec<String>,
    {
        let session = self.session_mut()?;
        let draws: Vec<(u32, String)> = session
            .preorder()
            .into_iter()
            .filter(|node| node.is_draw_like())
            .map(|node| (node.event_id, node.name.clone()))
            .collect();

        let mut matches = Vec::new();
        for (event_id, name) in draws {
            let controller = session.controller_mut();
            controller.set_frame_event(event_id);
            let snapshot = controller.pipeline_state()?;

            let found = reasons(session, &snapshot);
            if !found.is_empty() {
                matches.push(SearchMatch {
                    event_id,
                    name,
                    match_reason: found.join("; "),
                });
            }
        }
        tracing::debug!("Search '{}' matched {} events", query, matches.len());

        Ok(SearchResult {
            query: query.to_string(),
            count: matches.len(),
            matches,
        })
    }
}
