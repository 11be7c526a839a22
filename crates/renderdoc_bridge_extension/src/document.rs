//! A replay engine backed by JSON capture documents.
//!
//! The document records what a live replay would report: the action tree,
//! resource descriptions, pipeline state at the events where it changes,
//! shader reflection and disassembly, and optional GPU durations. It lets the
//! bridge run headless (the `renderdoc_bridge_host` binary and the tests)
//! without a debugger attached.

use std::collections::BTreeMap;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use renderdoc_bridge_core::types::{
    ConstantBlockInfo, DebugSourceFile, ResourceId, ShaderResourceInfo, ShaderStage,
};
use serde::{Deserialize, Serialize};

use crate::error::ReplayError;
use crate::replay::{
    ActionNode, BufferDescription, PipelineSnapshot, ReplayController, ReplayEngine,
    ResourceDescription, ResourceKind, ShaderDescription, ShaderReflection, Subresource,
    TextureDescription,
};

pub const SUPPORTED_APIS: &[&str] = &["D3D11", "D3D12", "OpenGL", "Vulkan"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaptureDocument {
    pub api: String,
    #[serde(default)]
    pub actions: Vec<ActionNode>,
    #[serde(default)]
    pub textures: Vec<DocumentTexture>,
    #[serde(default)]
    pub buffers: Vec<DocumentBuffer>,
    #[serde(default)]
    pub shaders: Vec<DocumentShader>,
    /// Resources that are neither textures, buffers nor shaders.
    #[serde(default)]
    pub resources: Vec<ResourceDescription>,
    /// Pipeline state from each listed event onwards.
    #[serde(default)]
    pub pipelines: Vec<DocumentPipeline>,
    /// Absent when the GPU duration counter is unavailable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu_durations: Option<Vec<DocumentDuration>>,
    #[serde(default = "default_targets")]
    pub disassembly_targets: Vec<String>,
}

fn default_targets() -> Vec<String> {
    vec!["SPIR-V".to_string(), "GLSL (cross-compiled)".to_string()]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentTexture {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub description: TextureDescription,
    #[serde(default = "default_bytes_per_pixel")]
    pub bytes_per_pixel: u32,
}

fn default_bytes_per_pixel() -> u32 {
    4
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentBuffer {
    pub resource_id: ResourceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Size in bytes; taken from `data_base64` when that is present.
    #[serde(default)]
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_base64: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentShader {
    pub resource_id: ResourceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub stage: ShaderStage,
    #[serde(default = "default_entry_point")]
    pub entry_point: String,
    #[serde(default)]
    pub encoding: String,
    #[serde(default)]
    pub constant_blocks: Vec<ConstantBlockInfo>,
    #[serde(default)]
    pub resources: Vec<ShaderResourceInfo>,
    /// Disassembly text keyed by target name.
    #[serde(default)]
    pub disassembly: BTreeMap<String, String>,
    /// Shader bytes as stored in the capture, base64 encoded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_bytes_base64: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub debug_files: Vec<DebugSourceFile>,
    #[serde(skip)]
    raw_bytes: Vec<u8>,
}

fn default_entry_point() -> String {
    "main".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentPipeline {
    pub event_id: u32,
    #[serde(flatten)]
    pub state: PipelineSnapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentDuration {
    pub event_id: u32,
    pub seconds: f64,
}

#[derive(Debug, Default)]
pub struct DocumentEngine;

impl DocumentEngine {
    pub fn new() -> Self {
        Self
    }
}

impl ReplayEngine for DocumentEngine {
    fn open_capture(&mut self, path: &Path) -> Result<Box<dyn ReplayController>, ReplayError> {
        if !path.is_file() {
            return Err(ReplayError::FileNotFound(path.to_path_buf()));
        }
        let bytes = std::fs::read(path)?;
        let document: CaptureDocument =
            serde_json::from_slice(&bytes).map_err(|e| ReplayError::Corrupt(e.to_string()))?;
        Ok(Box::new(DocumentController::new(document)?))
    }
}

pub struct DocumentController {
    document: CaptureDocument,
    /// Bytes of buffers recorded with `data_base64`. Other buffers produce a
    /// repeating pattern on demand.
    recorded: BTreeMap<ResourceId, Vec<u8>>,
    current_event: u32,
}

impl DocumentController {
    pub fn new(mut document: CaptureDocument) -> Result<Self, ReplayError> {
        if !SUPPORTED_APIS.contains(&document.api.as_str()) {
            return Err(ReplayError::UnsupportedApi(document.api));
        }

        let mut recorded = BTreeMap::new();
        for buffer in &mut document.buffers {
            if let Some(encoded) = &buffer.data_base64 {
                let data = STANDARD.decode(encoded).map_err(|e| {
                    ReplayError::Corrupt(format!("buffer {}: {e}", buffer.resource_id))
                })?;
                buffer.size = data.len() as u64;
                recorded.insert(buffer.resource_id, data);
            }
        }

        for shader in &mut document.shaders {
            if let Some(encoded) = &shader.raw_bytes_base64 {
                shader.raw_bytes = STANDARD.decode(encoded).map_err(|e| {
                    ReplayError::Corrupt(format!("shader {}: {e}", shader.resource_id))
                })?;
            }
        }

        for texture in &mut document.textures {
            if texture.description.byte_size == 0 {
                texture.description.byte_size = texture_byte_size(texture);
            }
        }

        document.pipelines.sort_by_key(|p| p.event_id);

        Ok(Self {
            document,
            recorded,
            current_event: 0,
        })
    }

    fn shader(&self, id: ResourceId) -> Option<&DocumentShader> {
        self.document.shaders.iter().find(|s| s.resource_id == id)
    }

    fn texture(&self, id: ResourceId) -> Option<&DocumentTexture> {
        self.document
            .textures
            .iter()
            .find(|t| t.description.resource_id == id)
    }

    fn document_texture(&self, id: ResourceId) -> Result<&DocumentTexture, ReplayError> {
        self.texture(id)
            .ok_or_else(|| ReplayError::NotFound(format!("Texture {id} not found")))
    }
}

fn pattern_byte(index: u64) -> u8 {
    (index % 251) as u8
}

fn texture_byte_size(texture: &DocumentTexture) -> u64 {
    let desc = &texture.description;
    (0..desc.mips)
        .map(|mip| {
            u64::from(desc.mip_width(mip))
                * u64::from(desc.mip_height(mip))
                * u64::from(desc.mip_depth(mip))
        })
        .sum::<u64>()
        * u64::from(desc.array_size)
        * u64::from(desc.sample_count)
        * u64::from(texture.bytes_per_pixel)
}

impl ReplayController for DocumentController {
    fn api_name(&self) -> String {
        self.document.api.clone()
    }

    fn root_actions(&self) -> Vec<ActionNode> {
        self.document.actions.clone()
    }

    fn resources(&self) -> Vec<ResourceDescription> {
        let textures = self.document.textures.iter().map(|t| ResourceDescription {
            resource_id: t.description.resource_id,
            name: t.name.clone(),
            kind: ResourceKind::Texture,
        });
        let buffers = self.document.buffers.iter().map(|b| ResourceDescription {
            resource_id: b.resource_id,
            name: b.name.clone(),
            kind: ResourceKind::Buffer,
        });
        let shaders = self.document.shaders.iter().map(|s| ResourceDescription {
            resource_id: s.resource_id,
            name: s.name.clone(),
            kind: ResourceKind::Shader,
        });
        textures
            .chain(buffers)
            .chain(shaders)
            .chain(self.document.resources.iter().cloned())
            .collect()
    }

    fn textures(&self) -> Vec<TextureDescription> {
        self.document
            .textures
            .iter()
            .map(|t| t.description.clone())
            .collect()
    }

    fn buffers(&self) -> Vec<BufferDescription> {
        self.document
            .buffers
            .iter()
            .map(|b| BufferDescription {
                resource_id: b.resource_id,
                size: b.size,
            })
            .collect()
    }

    fn shaders(&self) -> Vec<ShaderDescription> {
        self.document
            .shaders
            .iter()
            .map(|s| ShaderDescription {
                resource_id: s.resource_id,
                stage: s.stage,
                entry_point: s.entry_point.clone(),
            })
            .collect()
    }

    fn set_frame_event(&mut self, event_id: u32) {
        self.current_event = event_id;
    }

    fn pipeline_state(&self) -> Result<PipelineSnapshot, ReplayError> {
        Ok(self
            .document
            .pipelines
            .iter()
            .rev()
            .find(|p| p.event_id <= self.current_event)
            .map(|p| p.state.clone())
            .unwrap_or_default())
    }

    fn shader_reflection(&self, shader: ResourceId) -> Option<ShaderReflection> {
        self.shader(shader).map(|s| ShaderReflection {
            entry_point: s.entry_point.clone(),
            encoding: s.encoding.clone(),
            constant_blocks: s.constant_blocks.clone(),
            resources: s.resources.clone(),
            raw_bytes: s.raw_bytes.clone(),
            debug_files: s.debug_files.clone(),
        })
    }

    fn disassembly_targets(&self) -> Vec<String> {
        self.document.disassembly_targets.clone()
    }

    fn disassemble_shader(&self, shader: ResourceId, target: &str) -> Result<String, ReplayError> {
        let found = self
            .shader(shader)
            .ok_or_else(|| ReplayError::NotFound(format!("Shader {shader} not found")))?;
        found.disassembly.get(target).cloned().ok_or_else(|| {
            ReplayError::Unsupported(format!("no {target} disassembly recorded for {shader}"))
        })
    }

    fn buffer_data(
        &self,
        buffer: ResourceId,
        offset: u64,
        length: u64,
    ) -> Result<Vec<u8>, ReplayError> {
        let described = self
            .document
            .buffers
            .iter()
            .find(|b| b.resource_id == buffer)
            .ok_or_else(|| ReplayError::NotFound(format!("Buffer {buffer} not found")))?;
        let start = offset.min(described.size);
        let end = offset.saturating_add(length).min(described.size);

        match self.recorded.get(&buffer) {
            Some(data) => {
                let start = usize::try_from(start).unwrap_or(usize::MAX).min(data.len());
                let end = usize::try_from(end).unwrap_or(usize::MAX).min(data.len());
                Ok(data[start..end].to_vec())
            }
            None => Ok((start..end).map(pattern_byte).collect()),
        }
    }

    fn subresource_size(&self, texture: ResourceId, mip: u32) -> Result<u64, ReplayError> {
        let found = self.document_texture(texture)?;
        let desc = &found.description;
        Ok(u64::from(desc.mip_width(mip))
            * u64::from(desc.mip_height(mip))
            * u64::from(found.bytes_per_pixel))
    }

    fn texture_data(&self, texture: ResourceId, sub: Subresource) -> Result<Vec<u8>, ReplayError> {
        let len = usize::try_from(self.subresource_size(texture, sub.mip)?)
            .map_err(|_| ReplayError::Unsupported(format!("Texture {texture} is too large")))?;
        let seed = sub.mip.wrapping_mul(31) ^ sub.slice.wrapping_mul(7) ^ sub.sample.wrapping_mul(3);
        Ok((0..len)
            .map(|i| (i as u32).wrapping_add(seed) as u8)
            .collect())
    }

    fn gpu_durations(&mut self) -> Result<Option<BTreeMap<u32, f64>>, ReplayError> {
        Ok(self.document.gpu_durations.as_ref().map(|durations| {
            durations
                .iter()
                .map(|d| (d.event_id, d.seconds))
                .collect()
        }))
    }

    fn shutdown(self: Box<Self>) {
        tracing::debug!("Document replay for {} API shut down", self.document.api);
    }
}
