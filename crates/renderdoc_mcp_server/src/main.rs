mod shader_file;

use std::path::PathBuf;

use renderdoc_bridge_core::types::{
    BufferContentsArgs, EventArgs, FindDrawsByShaderArgs, FindDrawsByTextureArgs,
    GetActionTimingsArgs, GetDrawCallsArgs, ListCapturesArgs, MultiplePipelineStatesArgs, NoArgs,
    OpenCaptureArgs, ResourceArgs, ShaderArgs, ShaderSourceArgs, ShaderStage, TextureDataArgs,
};
use renderdoc_bridge_core::{ops, BridgeClient, BridgeConfig, BridgeError};
use rmcp::{
    handler::server::{tool::ToolRouter, wrapper::Parameters, ServerHandler},
    model::*,
    tool, tool_handler, tool_router, transport, ErrorData as McpError, ServiceExt,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
struct ShaderSourceParams {
    /// Event id at which the pipeline is inspected
    event_id: u32,
    /// Shader stage
    stage: ShaderStage,
    /// Directory to save the file in (default: ./renderdoc/<capture name>/)
    #[serde(default)]
    output_dir: Option<String>,
    /// Disassembly target name (partial match), e.g. "GLSL" or "SPIR-V"
    #[serde(default)]
    target: Option<String>,
}

#[derive(Clone)]
struct RenderDocMcpServer {
    tool_router: ToolRouter<Self>,
    client: BridgeClient,
}

/// Bridge failures keep their wire kind in the error data. Mistakes in the
/// request are reported as invalid params.
fn to_mcp_error(operation: &str, e: BridgeError) -> McpError {
    let kind = e.kind();
    let message = format!("{operation} failed: {e}");
    let data = Some(json!({ "kind": kind }));
    if kind.is_caller_error() {
        McpError::invalid_params(message, data)
    } else {
        McpError::internal_error(message, data)
    }
}

fn structured<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    serde_json::to_value(value)
        .map(CallToolResult::structured)
        .map_err(|e| McpError::internal_error(format!("Failed to encode result: {e}"), None))
}

#[tool_router]
impl RenderDocMcpServer {
    fn new(config: BridgeConfig) -> Self {
        Self {
            tool_router: Self::tool_router(),
            client: BridgeClient::new(config),
        }
    }

    #[tool(description = "Get the version of the RenderDoc MCP server")]
    async fn get_version(&self, _params: Parameters<NoArgs>) -> Result<CallToolResult, McpError> {
        Ok(CallToolResult::structured(json!({
            "version": env!("CARGO_PKG_VERSION"),
            "bridge_endpoint": self.client.config().channel.endpoint(),
        })))
    }

    #[tool(description = "Check connectivity to the RenderDoc bridge extension")]
    async fn ping(&self, _params: Parameters<NoArgs>) -> Result<CallToolResult, McpError> {
        let response = ops::capture::ping(&self.client)
            .await
            .map_err(|e| to_mcp_error("ping", e))?;
        structured(&response)
    }

    #[tool(description = "List RenderDoc capture (.rdc) files in a directory")]
    async fn list_captures(
        &self,
        params: Parameters<ListCapturesArgs>,
    ) -> Result<CallToolResult, McpError> {
        let response = ops::capture::list_captures(&self.client, &params.0.directory)
            .await
            .map_err(|e| to_mcp_error("list_captures", e))?;
        structured(&response)
    }

    #[tool(description = "Open a capture file in RenderDoc. Any open capture is closed first.")]
    async fn open_capture(
        &self,
        params: Parameters<OpenCaptureArgs>,
    ) -> Result<CallToolResult, McpError> {
        let response = ops::capture::open_capture(&self.client, &params.0.capture_path)
            .await
            .map_err(|e| to_mcp_error("open_capture", e))?;
        structured(&response)
    }

    #[tool(description = "Close the currently loaded capture")]
    async fn close_capture(&self, _params: Parameters<NoArgs>) -> Result<CallToolResult, McpError> {
        let response = ops::capture::close_capture(&self.client)
            .await
            .map_err(|e| to_mcp_error("close_capture", e))?;
        structured(&response)
    }

    #[tool(description = "Check whether a capture is loaded, and its file name, API and event count")]
    async fn get_capture_status(
        &self,
        _params: Parameters<NoArgs>,
    ) -> Result<CallToolResult, McpError> {
        let response = ops::capture::get_capture_status(&self.client)
            .await
            .map_err(|e| to_mcp_error("get_capture_status", e))?;
        structured(&response)
    }

    #[tool(
        description = "Get the action hierarchy of the loaded capture, optionally filtered by marker, event range, or flags"
    )]
    async fn get_draw_calls(
        &self,
        params: Parameters<GetDrawCallsArgs>,
    ) -> Result<CallToolResult, McpError> {
        let response = ops::actions::get_draw_calls(&self.client, &params.0)
            .await
            .map_err(|e| to_mcp_error("get_draw_calls", e))?;
        structured(&response)
    }

    #[tool(
        description = "Summarize the frame: API, action statistics, top-level markers, render targets, shader and resource counts"
    )]
    async fn get_frame_summary(
        &self,
        _params: Parameters<NoArgs>,
    ) -> Result<CallToolResult, McpError> {
        let response = ops::actions::get_frame_summary(&self.client)
            .await
            .map_err(|e| to_mcp_error("get_frame_summary", e))?;
        structured(&response)
    }

    #[tool(description = "Find draws and dispatches that use a shader, by partial name or entry point")]
    async fn find_draws_by_shader(
        &self,
        params: Parameters<FindDrawsByShaderArgs>,
    ) -> Result<CallToolResult, McpError> {
        let params = params.0;
        let response = ops::search::find_draws_by_shader(&self.client, &params.shader_name, params.stage)
            .await
            .map_err(|e| to_mcp_error("find_draws_by_shader", e))?;
        structured(&response)
    }

    #[tool(description = "Find draws and dispatches that read or write a texture, by partial name")]
    async fn find_draws_by_texture(
        &self,
        params: Parameters<FindDrawsByTextureArgs>,
    ) -> Result<CallToolResult, McpError> {
        let response = ops::search::find_draws_by_texture(&self.client, &params.0.texture_name)
            .await
            .map_err(|e| to_mcp_error("find_draws_by_texture", e))?;
        structured(&response)
    }

    #[tool(description = "Find draws and dispatches that bind a resource, by exact resource id")]
    async fn find_draws_by_resource(
        &self,
        params: Parameters<ResourceArgs>,
    ) -> Result<CallToolResult, McpError> {
        let response = ops::search::find_draws_by_resource(&self.client, params.0.resource_id)
            .await
            .map_err(|e| to_mcp_error("find_draws_by_resource", e))?;
        structured(&response)
    }

    #[tool(description = "Get the parameters, marker path and outputs of one action")]
    async fn get_draw_call_details(
        &self,
        params: Parameters<EventArgs>,
    ) -> Result<CallToolResult, McpError> {
        let response = ops::actions::get_draw_call_details(&self.client, params.0.event_id)
            .await
            .map_err(|e| to_mcp_error("get_draw_call_details", e))?;
        structured(&response)
    }

    #[tool(
        description = "Get GPU durations per action. Check 'available': some captures do not support the counter."
    )]
    async fn get_action_timings(
        &self,
        params: Parameters<GetActionTimingsArgs>,
    ) -> Result<CallToolResult, McpError> {
        let response = ops::actions::get_action_timings(&self.client, &params.0)
            .await
            .map_err(|e| to_mcp_error("get_action_timings", e))?;
        structured(&response)
    }

    #[tool(
        description = "Get reflection and readable disassembly of the shader bound to a stage at an event"
    )]
    async fn get_shader_info(&self, params: Parameters<ShaderArgs>) -> Result<CallToolResult, McpError> {
        let response = ops::pipeline::get_shader_info(&self.client, params.0.event_id, params.0.stage)
            .await
            .map_err(|e| to_mcp_error("get_shader_info", e))?;
        structured(&response)
    }

    #[tool(
        description = "Save the source of the shader bound to a stage at an event to a local file and return its path"
    )]
    async fn get_shader_source(
        &self,
        params: Parameters<ShaderSourceParams>,
    ) -> Result<CallToolResult, McpError> {
        let params = params.0;
        let args = ShaderSourceArgs {
            event_id: params.event_id,
            stage: params.stage,
            target: params.target,
        };
        let source = ops::pipeline::get_shader_source(&self.client, &args)
            .await
            .map_err(|e| to_mcp_error("get_shader_source", e))?;

        let dir = match params.output_dir {
            Some(dir) => PathBuf::from(dir),
            None => {
                let capture = ops::capture::get_capture_status(&self.client)
                    .await
                    .ok()
                    .and_then(|status| status.filename);
                let root = std::env::current_dir()
                    .unwrap_or_default()
                    .join(shader_file::DEFAULT_ROOT);
                shader_file::default_dir(&root, capture.as_deref())
            }
        };

        let saved = shader_file::save(&dir, params.event_id, &source)
            .await
            .map_err(|e| {
                McpError::internal_error(
                    format!("Failed to save shader source in {}: {e}", dir.display()),
                    None,
                )
            })?;
        structured(&saved)
    }

    #[tool(description = "Read bytes from a buffer, base64 encoded")]
    async fn get_buffer_contents(
        &self,
        params: Parameters<BufferContentsArgs>,
    ) -> Result<CallToolResult, McpError> {
        let response = ops::resources::get_buffer_contents(&self.client, &params.0)
            .await
            .map_err(|e| to_mcp_error("get_buffer_contents", e))?;
        structured(&response)
    }

    #[tool(description = "Get dimensions, format, mip and array counts of a texture")]
    async fn get_texture_info(
        &self,
        params: Parameters<ResourceArgs>,
    ) -> Result<CallToolResult, McpError> {
        let response = ops::resources::get_texture_info(&self.client, params.0.resource_id)
            .await
            .map_err(|e| to_mcp_error("get_texture_info", e))?;
        structured(&response)
    }

    #[tool(
        description = "Read one mip/slice/sample of a texture, base64 encoded. 3D textures use depth_slice."
    )]
    async fn get_texture_data(
        &self,
        params: Parameters<TextureDataArgs>,
    ) -> Result<CallToolResult, McpError> {
        let response = ops::resources::get_texture_data(&self.client, &params.0)
            .await
            .map_err(|e| to_mcp_error("get_texture_data", e))?;
        structured(&response)
    }

    #[tool(description = "Get the full pipeline state at an event")]
    async fn get_pipeline_state(
        &self,
        params: Parameters<EventArgs>,
    ) -> Result<CallToolResult, McpError> {
        let response = ops::pipeline::get_pipeline_state(&self.client, params.0.event_id)
            .await
            .map_err(|e| to_mcp_error("get_pipeline_state", e))?;
        structured(&response)
    }

    #[tool(description = "Get pipeline states for several events in one call, in the order given")]
    async fn get_multiple_pipeline_states(
        &self,
        params: Parameters<MultiplePipelineStatesArgs>,
    ) -> Result<CallToolResult, McpError> {
        let response = ops::pipeline::get_multiple_pipeline_states(&self.client, params.0.event_ids)
            .await
            .map_err(|e| to_mcp_error("get_multiple_pipeline_states", e))?;
        structured(&response)
    }
}

#[tool_handler]
impl ServerHandler for RenderDocMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Inspect RenderDoc frame captures: open a capture, then query actions, pipeline state, shaders, buffers and textures".into(),
            ),
        }
    }
}

fn init_tracing() {
    // stdout carries the MCP protocol.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = BridgeConfig::from_env();
    tracing::info!(
        "Starting RenderDoc MCP Server on stdio (bridge at {})",
        config.channel.endpoint()
    );

    let server = RenderDocMcpServer::new(config);
    let transport = transport::stdio();

    server.serve(transport).await?.waiting().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use renderdoc_bridge_core::protocol::operations;
    use renderdoc_bridge_core::ErrorKind;

    #[test]
    fn every_bridge_operation_has_a_tool() {
        let tools = RenderDocMcpServer::tool_router().list_all();
        let names: Vec<String> = tools.iter().map(|t| t.name.to_string()).collect();
        for operation in operations::ALL {
            assert!(names.iter().any(|n| n == operation), "missing tool {operation}");
        }
        assert!(names.iter().any(|n| n == "get_version"));
        assert_eq!(names.len(), operations::ALL.len() + 1);
    }

    #[test]
    fn shader_source_params_schema_lists_output_dir() {
        let schema = serde_json::to_value(schemars::schema_for!(ShaderSourceParams)).unwrap();
        let properties = schema["properties"].as_object().unwrap();
        for field in ["event_id", "stage", "output_dir", "target"] {
            assert!(properties.contains_key(field), "missing {field}");
        }
        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|v| v.as_str())
            .collect();
        assert_eq!(required, vec!["event_id", "stage"]);
    }

    #[test]
    fn draw_call_args_schema_is_all_optional() {
        let schema = serde_json::to_value(schemars::schema_for!(GetDrawCallsArgs)).unwrap();
        assert!(schema.get("required").is_none());
        assert!(schema["properties"]["marker_filter"].is_object());
    }

    #[test]
    fn bridge_errors_map_by_kind() {
        let err = to_mcp_error(
            "get_buffer_contents",
            BridgeError::remote(ErrorKind::RangeError, "past the end"),
        );
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
        assert_eq!(err.data, Some(json!({"kind": "RangeError"})));
        assert!(err.message.contains("past the end"));

        let err = to_mcp_error("ping", BridgeError::unreachable("127.0.0.1:19876", "refused"));
        assert_eq!(err.code, ErrorCode::INTERNAL_ERROR);
        assert_eq!(err.data, Some(json!({"kind": "TransportError"})));
    }
}
