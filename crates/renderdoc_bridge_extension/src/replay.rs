//! The replay capability consumed by the facade.
//!
//! A [`ReplayEngine`] opens capture files and hands back a
//! [`ReplayController`] for the loaded frame. The facade never replays
//! anything itself; it only asks the controller for the action tree,
//! resource descriptions, per-event pipeline state and raw data.

use std::collections::BTreeMap;
use std::path::Path;

use renderdoc_bridge_core::types::{
    ActionFlags, BlendTarget, ConstantBlockInfo, DebugSourceFile, DepthStencilState,
    RasterizerState, ResourceId, SamplerState, ShaderResourceInfo, ShaderStage, TextureDimension,
    Viewport,
};
use serde::{Deserialize, Serialize};

use crate::error::ReplayError;

pub trait ReplayEngine: Send {
    /// Loads and replays `path`. Called only after any previous controller
    /// has been shut down.
    fn open_capture(&mut self, path: &Path) -> Result<Box<dyn ReplayController>, ReplayError>;
}

pub trait ReplayController {
    fn api_name(&self) -> String;

    fn root_actions(&self) -> Vec<ActionNode>;

    fn resources(&self) -> Vec<ResourceDescription>;

    fn textures(&self) -> Vec<TextureDescription>;

    fn buffers(&self) -> Vec<BufferDescription>;

    fn shaders(&self) -> Vec<ShaderDescription>;

    /// Moves the replay to just after `event_id`.
    fn set_frame_event(&mut self, event_id: u32);

    /// Pipeline state at the current frame event.
    fn pipeline_state(&self) -> Result<PipelineSnapshot, ReplayError>;

    fn shader_reflection(&self, shader: ResourceId) -> Option<ShaderReflection>;

    fn disassembly_targets(&self) -> Vec<String>;

    fn disassemble_shader(&self, shader: ResourceId, target: &str) -> Result<String, ReplayError>;

    fn buffer_data(&self, buffer: ResourceId, offset: u64, length: u64)
        -> Result<Vec<u8>, ReplayError>;

    /// Bytes one image of `texture` at `mip` occupies, known without reading it.
    fn subresource_size(&self, texture: ResourceId, mip: u32) -> Result<u64, ReplayError>;

    fn texture_data(&self, texture: ResourceId, sub: Subresource) -> Result<Vec<u8>, ReplayError>;

    /// GPU duration in seconds per event id, or `None` when the GPU duration
    /// counter is not available for this capture.
    fn gpu_durations(&mut self) -> Result<Option<BTreeMap<u32, f64>>, ReplayError>;

    fn shutdown(self: Box<Self>);
}

/// One node of the capture's action tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionNode {
    pub event_id: u32,
    pub name: String,
    pub flags: ActionFlags,
    pub num_indices: u32,
    pub num_instances: u32,
    pub index_offset: u32,
    pub base_vertex: i32,
    pub vertex_offset: u32,
    pub instance_offset: u32,
    pub dispatch_dimension: Option<[u32; 3]>,
    pub outputs: Vec<ResourceId>,
    pub depth_output: Option<ResourceId>,
    pub children: Vec<ActionNode>,
}

impl ActionNode {
    /// Push markers and any node with children open a region.
    pub fn is_region(&self) -> bool {
        self.flags.contains(ActionFlags::PUSH_MARKER) || !self.children.is_empty()
    }

    pub fn is_marker(&self) -> bool {
        self.flags.is_marker()
    }

    pub fn is_draw_like(&self) -> bool {
        self.flags.is_draw_like()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Texture,
    Buffer,
    Shader,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDescription {
    pub resource_id: ResourceId,
    #[serde(default)]
    pub name: Option<String>,
    pub kind: ResourceKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextureDescription {
    pub resource_id: ResourceId,
    pub dimension: TextureDimension,
    pub width: u32,
    #[serde(default = "one")]
    pub height: u32,
    #[serde(default = "one")]
    pub depth: u32,
    /// Array layers; for cube maps this counts faces (6 per cube).
    #[serde(default = "one")]
    pub array_size: u32,
    #[serde(default = "one")]
    pub mips: u32,
    pub format: String,
    #[serde(default = "one")]
    pub sample_count: u32,
    #[serde(default)]
    pub byte_size: u64,
}

impl TextureDescription {
    pub fn mip_width(&self, mip: u32) -> u32 {
        mip_extent(self.width, mip)
    }

    pub fn mip_height(&self, mip: u32) -> u32 {
        mip_extent(self.height, mip)
    }

    pub fn mip_depth(&self, mip: u32) -> u32 {
        mip_extent(self.depth, mip)
    }
}

pub(crate) fn mip_extent(extent: u32, mip: u32) -> u32 {
    extent.checked_shr(mip).unwrap_or(0).max(1)
}

fn one() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferDescription {
    pub resource_id: ResourceId,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShaderDescription {
    pub resource_id: ResourceId,
    pub stage: ShaderStage,
    #[serde(default = "default_entry_point")]
    pub entry_point: String,
}

fn default_entry_point() -> String {
    "main".to_string()
}

/// Which image of a texture to read. `slice` is the array layer or cube face,
/// or the depth slice for volume textures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Subresource {
    pub mip: u32,
    pub slice: u32,
    pub sample: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShaderReflection {
    #[serde(default = "default_entry_point")]
    pub entry_point: String,
    #[serde(default)]
    pub encoding: String,
    #[serde(default)]
    pub constant_blocks: Vec<ConstantBlockInfo>,
    #[serde(default)]
    pub resources: Vec<ShaderResourceInfo>,
    /// Shader bytes as stored in the capture. Text for GLSL and HLSL
    /// encodings, bytecode otherwise.
    #[serde(default)]
    pub raw_bytes: Vec<u8>,
    #[serde(default)]
    pub debug_files: Vec<DebugSourceFile>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Binding {
    pub slot: u32,
    pub resource: ResourceId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstantBinding {
    pub slot: u32,
    pub resource: ResourceId,
    #[serde(default)]
    pub byte_offset: u64,
    #[serde(default)]
    pub byte_size: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundShader {
    pub stage: ShaderStage,
    pub shader: ResourceId,
    #[serde(default = "default_entry_point")]
    pub entry_point: String,
    #[serde(default)]
    pub read_only: Vec<Binding>,
    #[serde(default)]
    pub read_write: Vec<Binding>,
    #[serde(default)]
    pub samplers: Vec<SamplerState>,
    #[serde(default)]
    pub constant_buffers: Vec<ConstantBinding>,
}

/// Raw pipeline state as the replay reports it, ids unresolved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSnapshot {
    pub shaders: Vec<BoundShader>,
    pub vertex_buffers: Vec<ResourceId>,
    pub index_buffer: Option<ResourceId>,
    pub topology: String,
    pub viewports: Vec<Viewport>,
    pub rasterizer: RasterizerState,
    pub blend: Vec<BlendTarget>,
    pub depth_stencil: DepthStencilState,
    pub render_targets: Vec<ResourceId>,
    pub depth_target: Option<ResourceId>,
}

impl PipelineSnapshot {
    pub fn shader(&self, stage: ShaderStage) -> Option<&BoundShader> {
        self.shaders
            .iter()
            .find(|bound| bound.stage == stage && !bound.shader.is_null())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mip_extent_never_reaches_zero() {
        assert_eq!(mip_extent(256, 0), 256);
        assert_eq!(mip_extent(256, 3), 32);
        assert_eq!(mip_extent(5, 4), 1);
        assert_eq!(mip_extent(1024, 40), 1);
    }

    #[test]
    fn test_action_node_defaults() {
        let node: ActionNode = serde_json::from_value(json!({
            "event_id": 12,
            "name": "Draw(36)",
            "flags": ["Drawcall", "Indexed"],
        }))
        .unwrap();
        assert!(node.is_draw_like());
        assert!(!node.is_region());
        assert_eq!(node.num_instances, 0);
        assert!(node.outputs.is_empty());
    }

    #[test]
    fn test_null_shader_counts_as_unbound() {
        let snapshot = PipelineSnapshot {
            shaders: vec![BoundShader {
                stage: ShaderStage::Pixel,
                shader: ResourceId::NULL,
                entry_point: "main".into(),
                read_only: vec![],
                read_write: vec![],
                samplers: vec![],
                constant_buffers: vec![],
            }],
            ..Default::default()
        };
        assert!(snapshot.shader(ShaderStage::Pixel).is_none());
        assert!(snapshot.shader(ShaderStage::Vertex).is_none());
    }
}
