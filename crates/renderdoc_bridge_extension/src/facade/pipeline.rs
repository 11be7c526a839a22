use std::collections::BTreeMap;

use renderdoc_bridge_core::types::{
    BoundResource, ConstantBufferBinding, DebugSourceFile, PipelineState, PipelineStates,
    ResourceId, ShaderInfo, ShaderSource, ShaderStage, StageState, EMBEDDED_SOURCE_TARGET,
};

use super::CaptureFacade;
use crate::error::FacadeError;
use crate::replay::{Binding, BoundShader, PipelineSnapshot, ResourceKind, ShaderReflection};
use crate::session::CaptureSession;

/// Lower is more readable: cross-compiled GLSL, GLSL, cross-compiled HLSL,
/// HLSL, anything that is not an IL or bytecode dump, the rest.
fn readability(target: &str) -> u8 {
    let t = target.to_lowercase();
    let translated = t.contains("cross") || t.contains("compil");
    if t.contains("glsl") && translated {
        0
    } else if t.contains("glsl") {
        1
    } else if t.contains("hlsl") && translated {
        2
    } else if t.contains("hlsl") {
        3
    } else if !(t.contains("il") || t.contains("bytecode") || t.contains("binary")) {
        4
    } else {
        5
    }
}

/// Targets from most to least readable; ties keep their listed order.
pub fn targets_by_preference(targets: &[String]) -> Vec<&str> {
    let mut ordered: Vec<&str> = targets.iter().map(String::as_str).collect();
    ordered.sort_by_key(|t| readability(t));
    ordered
}

pub fn preferred_target(targets: &[String]) -> Option<&str> {
    targets_by_preference(targets).first().copied()
}

/// Source recorded in the capture itself.
#[derive(Debug, Clone, PartialEq)]
struct EmbeddedSource {
    source_code: String,
    encoding: String,
    method: String,
    debug_files: Vec<DebugSourceFile>,
}

/// Text raw bytes win over debug info files. Bytecode encodings carry no
/// readable source in their raw bytes.
fn embedded_source(reflection: &ShaderReflection) -> Option<EmbeddedSource> {
    let debug_files: Vec<DebugSourceFile> = reflection
        .debug_files
        .iter()
        .filter(|f| !f.contents.is_empty())
        .cloned()
        .collect();

    let encoding = reflection.encoding.to_lowercase();
    if encoding.contains("glsl") || encoding.contains("hlsl") {
        let text = String::from_utf8_lossy(&reflection.raw_bytes);
        let text = text.trim_end_matches('\0');
        if !text.trim().is_empty() {
            return Some(EmbeddedSource {
                source_code: text.to_string(),
                encoding: reflection.encoding.clone(),
                method: "raw_bytes".to_string(),
                debug_files,
            });
        }
    }

    let (source_code, method) = debug_files
        .first()
        .map(|f| (f.contents.clone(), format!("debug_files[{}]", f.filename)))?;
    Some(EmbeddedSource {
        source_code,
        encoding: "debug_info".to_string(),
        method,
        debug_files,
    })
}

fn usable(code: &str) -> bool {
    !code.trim().is_empty() && !code.starts_with("[Error")
}

impl CaptureFacade {
    pub fn get_pipeline_state(&mut self, event_id: u32) -> Result<PipelineState, FacadeError> {
        let session = self.session_mut()?;
        if !session.contains(event_id) {
            return Err(FacadeError::NotFound(format!("Event {event_id} not found")));
        }
        let snapshot = snapshot_at(session, event_id)?;
        Ok(resolve(session, event_id, snapshot))
    }

    /// Every id is checked before anything is replayed, so an unknown id
    /// fails the whole call.
    pub fn get_multiple_pipeline_states(
        &mut self,
        event_ids: &[u32],
    ) -> Result<PipelineStates, FacadeError> {
        let session = self.session_mut()?;
        if let Some(missing) = event_ids.iter().find(|id| !session.contains(**id)) {
            return Err(FacadeError::NotFound(format!("Event {missing} not found")));
        }

        let mut pipelines = Vec::with_capacity(event_ids.len());
        for &event_id in event_ids {
            let snapshot = snapshot_at(session, event_id)?;
            pipelines.push(resolve(session, event_id, snapshot));
        }

        Ok(PipelineStates {
            count: pipelines.len(),
            pipelines,
        })
    }

    pub fn get_shader_info(
        &mut self,
        event_id: u32,
        stage: ShaderStage,
    ) -> Result<ShaderInfo, FacadeError> {
        let session = self.session_mut()?;
        let bound = bound_shader(session, event_id, stage)?;
        let controller = session.controller();
        let reflection = controller.shader_reflection(bound.shader);
        let targets = controller.disassembly_targets();

        let mut disassembly = None;
        let mut disassembly_error = None;
        let target_used = preferred_target(&targets).map(str::to_string);
        if let Some(target) = &target_used {
            match controller.disassemble_shader(bound.shader, target) {
                Ok(text) => disassembly = Some(text),
                Err(e) => disassembly_error = Some(e.to_string()),
            }
        }

        let embedded = reflection.as_ref().and_then(embedded_source);
        let (entry_point, encoding, constant_blocks, resources) = match reflection {
            Some(r) => (r.entry_point, r.encoding, r.constant_blocks, r.resources),
            None => (bound.entry_point.clone(), String::new(), Vec::new(), Vec::new()),
        };

        Ok(ShaderInfo {
            resource_id: bound.shader,
            name: session.resource_name(bound.shader),
            entry_point,
            stage,
            encoding,
            available_targets: targets,
            disassembly_target_used: target_used,
            disassembly,
            disassembly_error,
            source_code: embedded.as_ref().map(|e| e.source_code.clone()),
            source_encoding: embedded.map(|e| e.encoding),
            constant_blocks,
            resources,
        })
    }

    /// Embedded source wins when the capture carries it. A requested target
    /// is matched by substring; without one every target is disassembled and
    /// the most readable one that succeeds is returned.
    pub fn get_shader_source(
        &mut self,
        event_id: u32,
        stage: ShaderStage,
        target: Option<&str>,
    ) -> Result<ShaderSource, FacadeError> {
        let session = self.session_mut()?;
        let bound = bound_shader(session, event_id, stage)?;
        let controller = session.controller();
        let targets = controller.disassembly_targets();
        let embedded = controller
            .shader_reflection(bound.shader)
            .as_ref()
            .and_then(embedded_source);

        let mut source = ShaderSource {
            resource_id: bound.shader,
            entry_point: bound.entry_point.clone(),
            stage,
            target: String::new(),
            source_code: String::new(),
            available_targets: targets.clone(),
            source_encoding: None,
            source_method: None,
            debug_source_files: Vec::new(),
            all_sources: BTreeMap::new(),
        };
        if let Some(found) = &embedded {
            source.target = EMBEDDED_SOURCE_TARGET.to_string();
            source.source_code = found.source_code.clone();
            source.source_encoding = Some(found.encoding.clone());
            source.source_method = Some(found.method.clone());
            source.debug_source_files = found.debug_files.clone();
        }

        if let Some(wanted) = target {
            let needle = wanted.to_lowercase();
            let Some(chosen) = targets.iter().find(|t| t.to_lowercase().contains(&needle)) else {
                if embedded.is_some() {
                    return Ok(source);
                }
                return Err(FacadeError::NotFound(format!(
                    "Disassembly target '{wanted}' not available. Available: {}",
                    targets.join(", ")
                )));
            };
            match controller.disassemble_shader(bound.shader, chosen) {
                Ok(code) if usable(&code) => {
                    source.target = chosen.clone();
                    source.source_code = code;
                }
                _ if embedded.is_some() => {}
                Ok(_) => {
                    return Err(FacadeError::Unavailable(format!(
                        "Disassembly for '{chosen}' produced no source"
                    )))
                }
                Err(e) => return Err(e.into()),
            }
            return Ok(source);
        }

        if targets.is_empty() && embedded.is_none() {
            return Err(FacadeError::Unavailable(
                "No disassembly targets available".to_string(),
            ));
        }
        for t in &targets {
            let code = controller
                .disassemble_shader(bound.shader, t)
                .unwrap_or_else(|e| format!("[Error: {e}]"));
            source.all_sources.insert(t.clone(), code);
        }
        if embedded.is_none() {
            let best = targets_by_preference(&targets)
                .into_iter()
                .find(|t| source.all_sources.get(*t).is_some_and(|code| usable(code)));
            let Some(best) = best else {
                return Err(FacadeError::Unavailable(format!(
                    "No disassembly target produced source for shader {}",
                    bound.shader
                )));
            };
            source.target = best.to_string();
            source.source_code = source.all_sources[best].clone();
        }
        Ok(source)
    }
}

fn snapshot_at(session: &mut CaptureSession, event_id: u32) -> Result<PipelineSnapshot, FacadeError> {
    let controller = session.controller_mut();
    controller.set_frame_event(event_id);
    Ok(controller.pipeline_state()?)
}

fn bound_shader(
    session: &mut CaptureSession,
    event_id: u32,
    stage: ShaderStage,
) -> Result<BoundShader, FacadeError> {
    if !session.contains(event_id) {
        return Err(FacadeError::NotFound(format!("Event {event_id} not found")));
    }
    let snapshot = snapshot_at(session, event_id)?;
    snapshot.shader(stage).cloned().ok_or_else(|| {
        FacadeError::NotFound(format!("No {stage} shader bound at event {event_id}"))
    })
}

fn bound_resource(session: &CaptureSession, binding: &Binding) -> BoundResource {
    let (kind, texture) = match session.resource_kind(binding.resource) {
        ResourceKind::Texture => ("texture", session.texture(binding.resource)),
        ResourceKind::Buffer => ("buffer", None),
        _ => ("unknown", None),
    };
    BoundResource {
        slot: binding.slot,
        resource: session.resource_ref(binding.resource),
        kind: kind.to_string(),
        width: texture.map(|t| t.width),
        height: texture.map(|t| t.height),
        format: texture.map(|t| t.format.clone()),
    }
}

fn resolve_stage(session: &CaptureSession, bound: &BoundShader) -> StageState {
    let bindings = |list: &[Binding]| {
        list.iter()
            .filter(|b| !b.resource.is_null())
            .map(|b| bound_resource(session, b))
            .collect::<Vec<_>>()
    };
    let block_names: BTreeMap<u32, String> = session
        .controller()
        .shader_reflection(bound.shader)
        .map(|r| r.constant_blocks.into_iter().map(|b| (b.slot, b.name)).collect())
        .unwrap_or_default();

    StageState {
        shader: session.resource_ref(bound.shader),
        entry_point: bound.entry_point.clone(),
        read_only: bindings(&bound.read_only),
        read_write: bindings(&bound.read_write),
        samplers: bound.samplers.clone(),
        constant_buffers: bound
            .constant_buffers
            .iter()
            .map(|cb| ConstantBufferBinding {
                slot: cb.slot,
                resource: session.resource_ref(cb.resource),
                byte_offset: cb.byte_offset,
                byte_size: cb.byte_size,
                block_name: block_names.get(&cb.slot).cloned(),
            })
            .collect(),
    }
}

fn resolve(session: &CaptureSession, event_id: u32, snapshot: PipelineSnapshot) -> PipelineState {
    let refs = |ids: &[ResourceId]| {
        ids.iter()
            .filter(|id| !id.is_null())
            .map(|id| session.resource_ref(*id))
            .collect::<Vec<_>>()
    };

    let shaders = ShaderStage::ALL
        .iter()
        .filter_map(|stage| {
            snapshot
                .shader(*stage)
                .map(|bound| (*stage, resolve_stage(session, bound)))
        })
        .collect();

    PipelineState {
        event_id,
        api: session.api().to_string(),
        shaders,
        vertex_buffers: refs(&snapshot.vertex_buffers),
        index_buffer: snapshot
            .index_buffer
            .filter(|id| !id.is_null())
            .map(|id| session.resource_ref(id)),
        topology: snapshot.topology,
        viewports: snapshot.viewports,
        rasterizer: snapshot.rasterizer,
        blend: snapshot.blend,
        depth_stencil: snapshot.depth_stencil,
        render_targets: refs(&snapshot.render_targets),
        depth_target: snapshot
            .depth_target
            .filter(|id| !id.is_null())
            .map(|id| session.resource_ref(id)),
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use renderdoc_bridge_core::ErrorKind;

    fn targets(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_preferred_target_order() {
        assert_eq!(
            preferred_target(&targets(&["SPIR-V", "GLSL", "GLSL (cross-compiled)"])),
            Some("GLSL (cross-compiled)")
        );
        assert_eq!(
            preferred_target(&targets(&["DXBC", "HLSL", "HLSL (cross-compiled)"])),
            Some("HLSL (cross-compiled)")
        );
        assert_eq!(
            preferred_target(&targets(&["DXIL", "AMD GCN ISA"])),
            Some("AMD GCN ISA")
        );
        assert_eq!(preferred_target(&targets(&["DXIL"])), Some("DXIL"));
        assert_eq!(preferred_target(&[]), None);
    }

    #[test]
    fn test_pipeline_state_resolves_names() {
        let mut facade = loaded_facade();
        let state = facade.get_pipeline_state(8).unwrap();
        assert_eq!(state.event_id, 8);
        assert_eq!(state.topology, "TriangleList");

        let pixel = &state.shaders[&ShaderStage::Pixel];
        assert_eq!(pixel.shader.name.as_deref(), Some("GBufferPS"));
        assert_eq!(pixel.read_only[0].kind, "texture");
        assert_eq!(pixel.read_only[0].format.as_deref(), Some("BC1_UNORM"));
        assert_eq!(pixel.samplers[0].filter, "Linear");

        let vertex = &state.shaders[&ShaderStage::Vertex];
        assert_eq!(
            vertex.constant_buffers[0].resource.name.as_deref(),
            Some("FrameConstants")
        );
        assert_eq!(state.render_targets[0].name.as_deref(), Some("SceneColor"));
        assert_eq!(
            state.index_buffer.as_ref().and_then(|b| b.name.as_deref()),
            Some("MeshIndices")
        );
    }

    #[test]
    fn test_pipeline_state_unknown_event() {
        let mut facade = loaded_facade();
        assert_eq!(
            facade.get_pipeline_state(77).unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn test_multiple_pipeline_states_keep_request_order() {
        let mut facade = loaded_facade();
        let states = facade.get_multiple_pipeline_states(&[10, 3, 7]).unwrap();
        let ids: Vec<u32> = states.pipelines.iter().map(|p| p.event_id).collect();
        assert_eq!(ids, vec![10, 3, 7]);
        assert!(states.pipelines[0].shaders.contains_key(&ShaderStage::Compute));
        assert_eq!(states.count, 3);

        let err = facade.get_multiple_pipeline_states(&[3, 500]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn test_shader_info_prefers_readable_disassembly() {
        let mut facade = loaded_facade();
        let info = facade.get_shader_info(7, ShaderStage::Pixel).unwrap();
        assert_eq!(info.name.as_deref(), Some("GBufferPS"));
        assert_eq!(info.entry_point, "PSMain");
        assert_eq!(info.encoding, "SPIRV");
        assert_eq!(info.disassembly_target_used.as_deref(), Some("GLSL (cross-compiled)"));
        assert_eq!(info.disassembly.as_deref(), Some("void main() { }"));
        assert_eq!(info.constant_blocks[0].name, "Material");

        let vertex = facade.get_shader_info(3, ShaderStage::Vertex).unwrap();
        assert!(vertex.disassembly.is_none());
        assert!(vertex.disassembly_error.is_some());

        let err = facade.get_shader_info(3, ShaderStage::Pixel).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_shader_source_target_selection() {
        let mut facade = loaded_facade();
        let source = facade
            .get_shader_source(8, ShaderStage::Pixel, Some("spir"))
            .unwrap();
        assert_eq!(source.target, "SPIR-V");
        assert_eq!(source.source_code, "OpCapability Shader");

        let source = facade.get_shader_source(8, ShaderStage::Pixel, None).unwrap();
        assert_eq!(source.target, "GLSL (cross-compiled)");

        let err = facade
            .get_shader_source(8, ShaderStage::Pixel, Some("metal"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_preferred_target_accepts_compiled_variants() {
        assert_eq!(
            preferred_target(&targets(&["SPIR-V", "GLSL (decompiled)", "GLSL"])),
            Some("GLSL (decompiled)")
        );
        assert_eq!(
            targets_by_preference(&targets(&["DXIL", "SPIR-V", "GLSL"])),
            vec!["GLSL", "SPIR-V", "DXIL"]
        );
    }

    #[test]
    fn test_shader_source_falls_back_when_best_target_fails() {
        let mut document = sample_document();
        document["shaders"][2]["disassembly"]
            .as_object_mut()
            .unwrap()
            .remove("GLSL (cross-compiled)");
        let mut facade = loaded_facade_with(&document);

        let source = facade.get_shader_source(7, ShaderStage::Pixel, None).unwrap();
        assert_eq!(source.target, "SPIR-V");
        assert_eq!(source.source_code, "OpCapability Shader");
        assert_eq!(source.all_sources.len(), 2);
        assert!(source.all_sources["GLSL (cross-compiled)"].starts_with("[Error"));
        assert!(source.source_method.is_none());

        let err = facade
            .get_shader_source(7, ShaderStage::Pixel, Some("glsl"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unavailable);

        let err = facade.get_shader_source(3, ShaderStage::Vertex, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
    }

    #[test]
    fn test_embedded_source_is_preferred() {
        let mut document = sample_document();
        document["shaders"][2]["encoding"] = serde_json::json!("GLSL");
        document["shaders"][2]["raw_bytes_base64"] = serde_json::json!("I3ZlcnNpb24gNDUwCgA=");
        document["shaders"][1]["debug_files"] = serde_json::json!([
            {"filename": "empty.hlsl", "contents": ""},
            {"filename": "mesh.hlsl", "contents": "float4 VSMain() : SV_Position { return 0; }"},
        ]);
        let mut facade = loaded_facade_with(&document);

        let source = facade.get_shader_source(7, ShaderStage::Pixel, None).unwrap();
        assert_eq!(source.target, EMBEDDED_SOURCE_TARGET);
        assert_eq!(source.source_code, "#version 450\n");
        assert_eq!(source.source_encoding.as_deref(), Some("GLSL"));
        assert_eq!(source.source_method.as_deref(), Some("raw_bytes"));
        assert_eq!(source.all_sources["SPIR-V"], "OpCapability Shader");

        let requested = facade
            .get_shader_source(7, ShaderStage::Pixel, Some("spir"))
            .unwrap();
        assert_eq!(requested.target, "SPIR-V");

        let vertex = facade.get_shader_source(7, ShaderStage::Vertex, None).unwrap();
        assert_eq!(vertex.target, EMBEDDED_SOURCE_TARGET);
        assert_eq!(vertex.source_method.as_deref(), Some("debug_files[mesh.hlsl]"));
        assert_eq!(vertex.debug_source_files.len(), 1);
        let missing = facade
            .get_shader_source(7, ShaderStage::Vertex, Some("metal"))
            .unwrap();
        assert_eq!(missing.target, EMBEDDED_SOURCE_TARGET);

        let info = facade.get_shader_info(7, ShaderStage::Pixel).unwrap();
        assert_eq!(info.source_code.as_deref(), Some("#version 450\n"));
    }
}
