use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::common::{ActionFlags, ResourceId, ResourceRef, ShaderStage, TextureDimension};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PingResponse {
    pub status: String,
    pub message: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureFile {
    pub filename: String,
    pub path: String,
    pub size_bytes: u64,
    /// RFC 3339 timestamp
    pub modified_time: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureList {
    pub directory: String,
    pub count: usize,
    pub captures: Vec<CaptureFile>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureStatus {
    pub loaded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_events: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenCaptureResponse {
    pub success: bool,
    pub filename: String,
    pub path: String,
    pub api: String,
    pub total_events: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloseCaptureResponse {
    pub closed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

/// One node of the returned action hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub event_id: u32,
    pub name: String,
    pub flags: ActionFlags,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_event_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ActionRecord>,
}

impl ActionRecord {
    /// Event ids of this record and its descendants, in pre-order.
    pub fn flatten_ids(&self, out: &mut Vec<u32>) {
        out.push(self.event_id);
        for child in &self.children {
            child.flatten_ids(out);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawCallList {
    /// Number of records in the returned tree, nested ones included.
    pub total: usize,
    pub actions: Vec<ActionRecord>,
}

impl DrawCallList {
    pub fn flatten_ids(&self) -> Vec<u32> {
        let mut ids = Vec::with_capacity(self.total);
        for action in &self.actions {
            action.flatten_ids(&mut ids);
        }
        ids
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionStatistics {
    pub draw_calls: usize,
    pub dispatches: usize,
    pub clears: usize,
    pub copies: usize,
    pub presents: usize,
    pub markers: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerSummary {
    pub name: String,
    pub event_id: u32,
    pub child_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceCounts {
    pub textures: usize,
    pub buffers: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameSummary {
    pub api: String,
    pub total_events: usize,
    pub statistics: ActionStatistics,
    pub top_level_markers: Vec<MarkerSummary>,
    pub render_targets: Vec<ResourceRef>,
    pub shader_counts: BTreeMap<ShaderStage, usize>,
    pub resource_counts: ResourceCounts,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchMatch {
    pub event_id: u32,
    pub name: String,
    pub match_reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub query: String,
    pub count: usize,
    pub matches: Vec<SearchMatch>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawCallDetails {
    pub event_id: u32,
    pub name: String,
    pub flags: ActionFlags,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_event_id: Option<u32>,
    pub marker_path: Vec<String>,
    pub child_count: usize,
    pub num_indices: u32,
    pub num_instances: u32,
    pub index_offset: u32,
    pub base_vertex: i32,
    pub vertex_offset: u32,
    pub instance_offset: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispatch_dimension: Option<[u32; 3]>,
    pub outputs: Vec<ResourceRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth_output: Option<ResourceRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionTiming {
    pub event_id: u32,
    pub name: String,
    pub duration_seconds: f64,
    pub duration_ms: f64,
}

/// GPU durations. Callers must check `available` before reading `timings`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionTimings {
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default)]
    pub timings: Vec<ActionTiming>,
    #[serde(default)]
    pub total_duration_ms: f64,
    #[serde(default)]
    pub count: usize,
}

impl ActionTimings {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            available: false,
            reason: Some(reason.into()),
            unit: None,
            timings: Vec::new(),
            total_duration_ms: 0.0,
            count: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstantBlockInfo {
    pub name: String,
    pub slot: u32,
    pub byte_size: u64,
    pub variable_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShaderResourceInfo {
    pub name: String,
    pub slot: u32,
    pub read_write: bool,
    pub resource_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShaderInfo {
    pub resource_id: ResourceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub entry_point: String,
    pub stage: ShaderStage,
    pub encoding: String,
    pub available_targets: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disassembly_target_used: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disassembly: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disassembly_error: Option<String>,
    /// Source embedded in the capture, when there is any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_encoding: Option<String>,
    pub constant_blocks: Vec<ConstantBlockInfo>,
    pub resources: Vec<ShaderResourceInfo>,
}

/// A source file carried in a shader's debug info.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugSourceFile {
    pub filename: String,
    pub contents: String,
}

/// Target reported when the source came from the capture rather than a
/// disassembler.
pub const EMBEDDED_SOURCE_TARGET: &str = "embedded_source";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShaderSource {
    pub resource_id: ResourceId,
    pub entry_point: String,
    pub stage: ShaderStage,
    pub target: String,
    pub source_code: String,
    pub available_targets: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_encoding: Option<String>,
    /// `raw_bytes` or `debug_files[<name>]` for embedded source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_method: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub debug_source_files: Vec<DebugSourceFile>,
    /// Output of every target when none was requested. Failed targets read
    /// `[Error: ...]`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub all_sources: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferContents {
    pub resource_id: ResourceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub total_size: u64,
    pub offset: u64,
    pub length: u64,
    pub data_base64: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextureInfo {
    pub resource_id: ResourceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub dimension: TextureDimension,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub array_size: u32,
    pub mips: u32,
    pub format: String,
    pub sample_count: u32,
    pub byte_size: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextureData {
    pub resource_id: ResourceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub dimension: TextureDimension,
    pub mip: u32,
    /// Array slice or cube face actually read; absent for 3D textures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slice: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub face: Option<String>,
    /// Depth slice actually read; present only for 3D textures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth_slice: Option<u32>,
    pub sample: u32,
    pub width: u32,
    pub height: u32,
    pub format: String,
    pub data_length: usize,
    pub data_base64: String,
}
