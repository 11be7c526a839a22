//! Typed arguments for each bridge operation.
//!
//! The extension's router deserializes `args` into these structs and calls
//! `validate` before anything reaches the capture, and the client serializes
//! them when issuing a request.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::common::{ActionFlags, ResourceId, ShaderStage};

fn default_true() -> bool {
    true
}

/// Arguments of operations that take none.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct NoArgs {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ListCapturesArgs {
    /// Directory to search for capture files (not recursive)
    pub directory: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct OpenCaptureArgs {
    /// Full path to the capture file to open. Any open capture is closed first.
    pub capture_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct GetDrawCallsArgs {
    /// Include child actions in the hierarchy (default: true)
    #[serde(default = "default_true")]
    pub include_children: bool,
    /// Only include actions under the first marker with exactly this name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker_filter: Option<String>,
    /// Drop the subtrees of markers with these exact names
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_markers: Vec<String>,
    /// Only include actions with event_id >= this value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id_min: Option<u32>,
    /// Only include actions with event_id <= this value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id_max: Option<u32>,
    /// Drop marker push/pop/set nodes, keeping only real actions
    #[serde(default)]
    pub only_actions: bool,
    /// Only include actions carrying at least one of these flags, e.g. ["Drawcall", "Dispatch"]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags_filter: Option<Vec<String>>,
}

impl Default for GetDrawCallsArgs {
    fn default() -> Self {
        Self {
            include_children: true,
            marker_filter: None,
            exclude_markers: Vec::new(),
            event_id_min: None,
            event_id_max: None,
            only_actions: false,
            flags_filter: None,
        }
    }
}

impl GetDrawCallsArgs {
    pub fn validate(&self) -> Result<(), String> {
        validate_range(self.event_id_min, self.event_id_max)?;
        validate_marker_name(self.marker_filter.as_deref())?;
        self.parsed_flags().map(|_| ())
    }

    /// The requested flag set, `None` when no flag filter was given.
    pub fn parsed_flags(&self) -> Result<Option<ActionFlags>, String> {
        self.flags_filter
            .as_ref()
            .map(|labels| {
                if labels.is_empty() {
                    return Err("flags_filter must name at least one flag".to_string());
                }
                ActionFlags::from_labels(labels)
            })
            .transpose()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct EventArgs {
    /// Event id to inspect
    pub event_id: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct GetActionTimingsArgs {
    /// Only report these event ids (default: all actions)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_ids: Option<Vec<u32>>,
    /// Only include actions under the first marker with exactly this name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker_filter: Option<String>,
    /// Exclude actions under markers with these exact names
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_markers: Vec<String>,
}

impl GetActionTimingsArgs {
    pub fn validate(&self) -> Result<(), String> {
        validate_marker_name(self.marker_filter.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct FindDrawsByShaderArgs {
    /// Partial, case-insensitive shader name or entry point
    pub shader_name: String,
    /// Restrict the search to one stage (default: all stages)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<ShaderStage>,
}

impl FindDrawsByShaderArgs {
    pub fn validate(&self) -> Result<(), String> {
        validate_needle("shader_name", &self.shader_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct FindDrawsByTextureArgs {
    /// Partial, case-insensitive texture name
    pub texture_name: String,
}

impl FindDrawsByTextureArgs {
    pub fn validate(&self) -> Result<(), String> {
        validate_needle("texture_name", &self.texture_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ResourceArgs {
    /// Resource id, e.g. "ResourceId::12345" or "12345"
    pub resource_id: ResourceId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ShaderArgs {
    /// Event id at which the pipeline is inspected
    pub event_id: u32,
    /// Shader stage
    pub stage: ShaderStage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ShaderSourceArgs {
    /// Event id at which the pipeline is inspected
    pub event_id: u32,
    /// Shader stage
    pub stage: ShaderStage,
    /// Disassembly target name (partial match), e.g. "GLSL" or "SPIR-V"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct BufferContentsArgs {
    /// Resource id of the buffer
    pub resource_id: ResourceId,
    /// Byte offset to start reading from (default: 0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    /// Number of bytes to read; omitted or 0 reads to the end of the buffer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct TextureDataArgs {
    /// Resource id of the texture
    pub resource_id: ResourceId,
    /// Mip level (default: 0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mip: Option<u32>,
    /// Array slice or cube face (0=X+, 1=X-, 2=Y+, 3=Y-, 4=Z+, 5=Z-); ignored for 3D textures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slice: Option<u32>,
    /// MSAA sample index (default: 0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample: Option<u32>,
    /// Depth slice of a 3D texture (default: 0); ignored for other textures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth_slice: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct MultiplePipelineStatesArgs {
    /// Event ids to snapshot, answered in the same order
    pub event_ids: Vec<u32>,
}

impl MultiplePipelineStatesArgs {
    pub fn validate(&self) -> Result<(), String> {
        if self.event_ids.is_empty() {
            return Err("event_ids must not be empty".to_string());
        }
        Ok(())
    }
}

fn validate_range(min: Option<u32>, max: Option<u32>) -> Result<(), String> {
    match (min, max) {
        (Some(min), Some(max)) if min > max => Err(format!(
            "event_id_min ({min}) must not exceed event_id_max ({max})"
        )),
        _ => Ok(()),
    }
}

fn validate_marker_name(marker: Option<&str>) -> Result<(), String> {
    match marker {
        Some(name) if name.is_empty() => Err("marker_filter must not be empty".to_string()),
        _ => Ok(()),
    }
}

fn validate_needle(field: &str, needle: &str) -> Result<(), String> {
    if needle.trim().is_empty() {
        return Err(format!("{field} must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn draw_call_args_default_include_children() {
        let args: GetDrawCallsArgs = serde_json::from_value(json!({})).unwrap();
        assert!(args.include_children);
        assert_eq!(args, GetDrawCallsArgs::default());
    }

    #[test]
    fn draw_call_args_reject_inverted_range() {
        let args = GetDrawCallsArgs {
            event_id_min: Some(30),
            event_id_max: Some(10),
            ..Default::default()
        };
        let err = args.validate().expect_err("inverted range must fail");
        assert!(err.contains("event_id_min (30)"), "unexpected error: {err}");
    }

    #[test]
    fn draw_call_args_reject_unknown_flags() {
        let args = GetDrawCallsArgs {
            flags_filter: Some(vec!["Drawcall".into(), "Sparkle".into()]),
            ..Default::default()
        };
        assert!(args.validate().unwrap_err().contains("Sparkle"));

        let args = GetDrawCallsArgs {
            flags_filter: Some(vec!["drawcall".into()]),
            ..Default::default()
        };
        assert_eq!(args.parsed_flags().unwrap(), Some(ActionFlags::DRAWCALL));
    }

    #[test]
    fn unknown_argument_fields_are_rejected() {
        let err = serde_json::from_value::<EventArgs>(json!({"event_id": 1, "eid": 2}))
            .expect_err("unknown field must fail");
        assert!(err.to_string().contains("eid"));
    }

    #[test]
    fn event_id_must_be_an_unsigned_integer() {
        assert!(serde_json::from_value::<EventArgs>(json!({"event_id": "ten"})).is_err());
        assert!(serde_json::from_value::<EventArgs>(json!({"event_id": -1})).is_err());
    }

    #[test]
    fn texture_data_args_all_optional_but_resource() {
        let args: TextureDataArgs =
            serde_json::from_value(json!({"resource_id": "ResourceId::5"})).unwrap();
        assert_eq!(args.resource_id, ResourceId(5));
        assert_eq!((args.mip, args.slice, args.sample, args.depth_slice), (None, None, None, None));
    }

    #[test]
    fn search_needles_must_not_be_blank() {
        let args = FindDrawsByShaderArgs {
            shader_name: "  ".into(),
            stage: None,
        };
        assert!(args.validate().is_err());
    }

    #[test]
    fn draw_call_args_schema_has_no_bare_true() {
        let schema = schemars::schema_for!(GetDrawCallsArgs);
        let json = serde_json::to_string(&schema).expect("schema serialization must succeed");
        assert!(
            !json.contains("\"exclude_markers\":true"),
            "Schema contains bare 'true' for exclude_markers:\n{json}"
        );
    }
}
