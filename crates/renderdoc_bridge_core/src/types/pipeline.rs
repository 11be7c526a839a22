//! Pipeline state records. Fixed-function pieces are shared with the replay
//! capability as-is; bindings are reported with resolved names.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::common::{ResourceRef, ShaderStage};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub min_depth: f32,
    #[serde(default = "default_max_depth")]
    pub max_depth: f32,
}

fn default_max_depth() -> f32 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterizerState {
    pub fill_mode: String,
    pub cull_mode: String,
    pub front_ccw: bool,
    pub depth_clip: bool,
    pub scissor_enable: bool,
}

impl Default for RasterizerState {
    fn default() -> Self {
        Self {
            fill_mode: "Solid".to_string(),
            cull_mode: "Back".to_string(),
            front_ccw: false,
            depth_clip: true,
            scissor_enable: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlendTarget {
    pub enabled: bool,
    pub color_source: String,
    pub color_destination: String,
    pub color_operation: String,
    pub alpha_source: String,
    pub alpha_destination: String,
    pub alpha_operation: String,
    pub write_mask: u8,
}

impl Default for BlendTarget {
    fn default() -> Self {
        Self {
            enabled: false,
            color_source: "One".to_string(),
            color_destination: "Zero".to_string(),
            color_operation: "Add".to_string(),
            alpha_source: "One".to_string(),
            alpha_destination: "Zero".to_string(),
            alpha_operation: "Add".to_string(),
            write_mask: 0xF,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepthStencilState {
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_function: String,
    pub stencil_enable: bool,
}

impl Default for DepthStencilState {
    fn default() -> Self {
        Self {
            depth_test: true,
            depth_write: true,
            depth_function: "Less".to_string(),
            stencil_enable: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplerState {
    pub slot: u32,
    #[serde(default)]
    pub address_u: String,
    #[serde(default)]
    pub address_v: String,
    #[serde(default)]
    pub address_w: String,
    #[serde(default)]
    pub filter: String,
    #[serde(default)]
    pub max_anisotropy: u32,
    #[serde(default)]
    pub min_lod: f32,
    #[serde(default)]
    pub max_lod: f32,
    #[serde(default)]
    pub mip_lod_bias: f32,
}

/// A texture or buffer bound to a shader slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundResource {
    pub slot: u32,
    #[serde(flatten)]
    pub resource: ResourceRef,
    /// "texture", "buffer" or "unknown"
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstantBufferBinding {
    pub slot: u32,
    #[serde(flatten)]
    pub resource: ResourceRef,
    pub byte_offset: u64,
    pub byte_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageState {
    pub shader: ResourceRef,
    pub entry_point: String,
    pub read_only: Vec<BoundResource>,
    pub read_write: Vec<BoundResource>,
    pub samplers: Vec<SamplerState>,
    pub constant_buffers: Vec<ConstantBufferBinding>,
}

/// Everything bound at one event, read-only once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    pub event_id: u32,
    pub api: String,
    pub shaders: BTreeMap<ShaderStage, StageState>,
    pub vertex_buffers: Vec<ResourceRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_buffer: Option<ResourceRef>,
    pub topology: String,
    pub viewports: Vec<Viewport>,
    pub rasterizer: RasterizerState,
    pub blend: Vec<BlendTarget>,
    pub depth_stencil: DepthStencilState,
    pub render_targets: Vec<ResourceRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth_target: Option<ResourceRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineStates {
    pub count: usize,
    pub pipelines: Vec<PipelineState>,
}
