//! Maps operation names onto facade calls and failures onto wire error kinds.

use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use renderdoc_bridge_core::protocol::operations;
use renderdoc_bridge_core::types::{
    BufferContentsArgs, EventArgs, FindDrawsByShaderArgs, FindDrawsByTextureArgs,
    GetActionTimingsArgs, GetDrawCallsArgs, ListCapturesArgs, MultiplePipelineStatesArgs, NoArgs,
    OpenCaptureArgs, ResourceArgs, ShaderArgs, ShaderSourceArgs, TextureDataArgs,
};
use renderdoc_bridge_core::{BridgeRequest, BridgeResponse, ErrorKind};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::FacadeError;
use crate::facade::CaptureFacade;

/// A request whose arguments have been decoded and validated.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Ping,
    ListCaptures(ListCapturesArgs),
    OpenCapture(OpenCaptureArgs),
    CloseCapture,
    GetCaptureStatus,
    GetDrawCalls(GetDrawCallsArgs),
    GetFrameSummary,
    FindDrawsByShader(FindDrawsByShaderArgs),
    FindDrawsByTexture(FindDrawsByTextureArgs),
    FindDrawsByResource(ResourceArgs),
    GetDrawCallDetails(EventArgs),
    GetActionTimings(GetActionTimingsArgs),
    GetShaderInfo(ShaderArgs),
    GetShaderSource(ShaderSourceArgs),
    GetBufferContents(BufferContentsArgs),
    GetTextureInfo(ResourceArgs),
    GetTextureData(TextureDataArgs),
    GetPipelineState(EventArgs),
    GetMultiplePipelineStates(MultiplePipelineStatesArgs),
}

impl Command {
    pub fn parse(operation: &str, args: Map<String, Value>) -> Result<Self, FacadeError> {
        let command = match operation {
            operations::PING => decode::<NoArgs>(args).map(|_| Self::Ping)?,
            operations::LIST_CAPTURES => Self::ListCaptures(decode(args)?),
            operations::OPEN_CAPTURE => Self::OpenCapture(decode(args)?),
            operations::CLOSE_CAPTURE => decode::<NoArgs>(args).map(|_| Self::CloseCapture)?,
            operations::GET_CAPTURE_STATUS => {
                decode::<NoArgs>(args).map(|_| Self::GetCaptureStatus)?
            }
            operations::GET_DRAW_CALLS => Self::GetDrawCalls(decode(args)?),
            operations::GET_FRAME_SUMMARY => {
                decode::<NoArgs>(args).map(|_| Self::GetFrameSummary)?
            }
            operations::FIND_DRAWS_BY_SHADER => Self::FindDrawsByShader(decode(args)?),
            operations::FIND_DRAWS_BY_TEXTURE => Self::FindDrawsByTexture(decode(args)?),
            operations::FIND_DRAWS_BY_RESOURCE => Self::FindDrawsByResource(decode(args)?),
            operations::GET_DRAW_CALL_DETAILS => Self::GetDrawCallDetails(decode(args)?),
            operations::GET_ACTION_TIMINGS => Self::GetActionTimings(decode(args)?),
            operations::GET_SHADER_INFO => Self::GetShaderInfo(decode(args)?),
            operations::GET_SHADER_SOURCE => Self::GetShaderSource(decode(args)?),
            operations::GET_BUFFER_CONTENTS => Self::GetBufferContents(decode(args)?),
            operations::GET_TEXTURE_INFO => Self::GetTextureInfo(decode(args)?),
            operations::GET_TEXTURE_DATA => Self::GetTextureData(decode(args)?),
            operations::GET_PIPELINE_STATE => Self::GetPipelineState(decode(args)?),
            operations::GET_MULTIPLE_PIPELINE_STATES => {
                Self::GetMultiplePipelineStates(decode(args)?)
            }
            other => return Err(FacadeError::UnknownOperation(other.to_string())),
        };
        command.validate()?;
        Ok(command)
    }

    fn validate(&self) -> Result<(), FacadeError> {
        let checked = match self {
            Self::GetDrawCalls(args) => args.validate(),
            Self::GetActionTimings(args) => args.validate(),
            Self::FindDrawsByShader(args) => args.validate(),
            Self::FindDrawsByTexture(args) => args.validate(),
            Self::GetMultiplePipelineStates(args) => args.validate(),
            _ => Ok(()),
        };
        checked.map_err(FacadeError::InvalidArgument)
    }
}

fn decode<T: DeserializeOwned>(args: Map<String, Value>) -> Result<T, FacadeError> {
    serde_json::from_value(Value::Object(args))
        .map_err(|e| FacadeError::InvalidArgument(e.to_string()))
}

/// Owns the facade and turns every request into exactly one response.
pub struct Router {
    facade: CaptureFacade,
}

impl Router {
    pub fn new(facade: CaptureFacade) -> Self {
        Self { facade }
    }

    pub fn facade(&self) -> &CaptureFacade {
        &self.facade
    }

    /// Never fails and never unwinds: a panic inside an operation becomes an
    /// `Internal` response and the router stays usable.
    pub fn handle(&mut self, request: BridgeRequest) -> BridgeResponse {
        let BridgeRequest {
            id,
            operation,
            args,
        } = request;
        let started = Instant::now();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.dispatch(&operation, args)));
        let response = match outcome {
            Ok(Ok(result)) => BridgeResponse::ok(id, result),
            Ok(Err(err)) => {
                let kind = err.kind();
                if kind.is_caller_error() || kind == ErrorKind::NotLoaded {
                    tracing::debug!("{} #{} rejected: {}", operation, id, err);
                } else {
                    tracing::warn!("{} #{} failed: {}", operation, id, err);
                }
                BridgeResponse::err(Some(id), kind, err.to_string())
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!("{} #{} panicked: {}", operation, id, message);
                BridgeResponse::err(
                    Some(id),
                    ErrorKind::Internal,
                    format!("Internal error while handling {operation}: {message}"),
                )
            }
        };

        tracing::debug!(
            "{} #{} answered in {:?} (success: {})",
            operation,
            id,
            started.elapsed(),
            response.success
        );
        response
    }

    /// Releases the loaded capture, if any.
    pub fn shutdown(&mut self) {
        self.facade.close_capture();
    }

    fn dispatch(&mut self, operation: &str, args: Map<String, Value>) -> Result<Value, FacadeError> {
        let facade = &mut self.facade;
        let value = match Command::parse(operation, args)? {
            Command::Ping => serde_json::to_value(facade.ping())?,
            Command::ListCaptures(args) => serde_json::to_value(facade.list_captures(&args.directory)?)?,
            Command::OpenCapture(args) => serde_json::to_value(facade.open_capture(&args.capture_path)?)?,
            Command::CloseCapture => serde_json::to_value(facade.close_capture())?,
            Command::GetCaptureStatus => serde_json::to_value(facade.get_capture_status())?,
            Command::GetDrawCalls(args) => serde_json::to_value(facade.get_draw_calls(&args)?)?,
            Command::GetFrameSummary => serde_json::to_value(facade.get_frame_summary()?)?,
            Command::FindDrawsByShader(args) => serde_json::to_value(
                facade.find_draws_by_shader(&args.shader_name, args.stage)?,
            )?,
            Command::FindDrawsByTexture(args) => {
                serde_json::to_value(facade.find_draws_by_texture(&args.texture_name)?)?
            }
            Command::FindDrawsByResource(args) => {
                serde_json::to_value(facade.find_draws_by_resource(args.resource_id)?)?
            }
            Command::GetDrawCallDetails(args) => {
                serde_json::to_value(facade.get_draw_call_details(args.event_id)?)?
            }
            Command::GetActionTimings(args) => {
                serde_json::to_value(facade.get_action_timings(&args)?)?
            }
            Command::GetShaderInfo(args) => {
                serde_json::to_value(facade.get_shader_info(args.event_id, args.stage)?)?
            }
            Command::GetShaderSource(args) => serde_json::to_value(facade.get_shader_source(
                args.event_id,
                args.stage,
                args.target.as_deref(),
            )?)?,
            Command::GetBufferContents(args) => {
                serde_json::to_value(facade.get_buffer_contents(&args)?)?
            }
            Command::GetTextureInfo(args) => {
                serde_json::to_value(facade.get_texture_info(args.resource_id)?)?
            }
            Command::GetTextureData(args) => serde_json::to_value(facade.get_texture_data(&args)?)?,
            Command::GetPipelineState(args) => {
                serde_json::to_value(facade.get_pipeline_state(args.event_id)?)?
            }
            Command::GetMultiplePipelineStates(args) => {
                serde_json::to_value(facade.get_multiple_pipeline_states(&args.event_ids)?)?
            }
        };
        Ok(value)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
