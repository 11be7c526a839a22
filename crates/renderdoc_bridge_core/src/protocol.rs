//! Request/response envelopes exchanged between the MCP server and the extension.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Operation names understood by the extension's router.
pub mod operations {
    pub const PING: &str = "ping";
    pub const LIST_CAPTURES: &str = "list_captures";
    pub const OPEN_CAPTURE: &str = "open_capture";
    pub const CLOSE_CAPTURE: &str = "close_capture";
    pub const GET_CAPTURE_STATUS: &str = "get_capture_status";
    pub const GET_DRAW_CALLS: &str = "get_draw_calls";
    pub const GET_FRAME_SUMMARY: &str = "get_frame_summary";
    pub const FIND_DRAWS_BY_SHADER: &str = "find_draws_by_shader";
    pub const FIND_DRAWS_BY_TEXTURE: &str = "find_draws_by_texture";
    pub const FIND_DRAWS_BY_RESOURCE: &str = "find_draws_by_resource";
    pub const GET_DRAW_CALL_DETAILS: &str = "get_draw_call_details";
    pub const GET_ACTION_TIMINGS: &str = "get_action_timings";
    pub const GET_SHADER_INFO: &str = "get_shader_info";
    pub const GET_SHADER_SOURCE: &str = "get_shader_source";
    pub const GET_BUFFER_CONTENTS: &str = "get_buffer_contents";
    pub const GET_TEXTURE_INFO: &str = "get_texture_info";
    pub const GET_TEXTURE_DATA: &str = "get_texture_data";
    pub const GET_PIPELINE_STATE: &str = "get_pipeline_state";
    pub const GET_MULTIPLE_PIPELINE_STATES: &str = "get_multiple_pipeline_states";

    pub const ALL: &[&str] = &[
        PING,
        LIST_CAPTURES,
        OPEN_CAPTURE,
        CLOSE_CAPTURE,
        GET_CAPTURE_STATUS,
        GET_DRAW_CALLS,
        GET_FRAME_SUMMARY,
        FIND_DRAWS_BY_SHADER,
        FIND_DRAWS_BY_TEXTURE,
        FIND_DRAWS_BY_RESOURCE,
        GET_DRAW_CALL_DETAILS,
        GET_ACTION_TIMINGS,
        GET_SHADER_INFO,
        GET_SHADER_SOURCE,
        GET_BUFFER_CONTENTS,
        GET_TEXTURE_INFO,
        GET_TEXTURE_DATA,
        GET_PIPELINE_STATE,
        GET_MULTIPLE_PIPELINE_STATES,
    ];
}

/// Stable error kinds carried in failed responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    NotLoaded,
    LoadError,
    NotFound,
    RangeError,
    UnknownOperation,
    InvalidArgument,
    Busy,
    Timeout,
    Unavailable,
    TransportError,
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotLoaded => "NotLoaded",
            Self::LoadError => "LoadError",
            Self::NotFound => "NotFound",
            Self::RangeError => "RangeError",
            Self::UnknownOperation => "UnknownOperation",
            Self::InvalidArgument => "InvalidArgument",
            Self::Busy => "Busy",
            Self::Timeout => "Timeout",
            Self::Unavailable => "Unavailable",
            Self::TransportError => "TransportError",
            Self::Internal => "Internal",
        }
    }

    /// Errors caused by what the caller sent rather than by the bridge itself.
    pub fn is_caller_error(self) -> bool {
        matches!(
            self,
            Self::NotFound | Self::RangeError | Self::UnknownOperation | Self::InvalidArgument
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeRequest {
    pub id: u64,
    pub operation: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

impl BridgeRequest {
    pub fn new(id: u64, operation: impl Into<String>, args: Map<String, Value>) -> Self {
        Self {
            id,
            operation: operation.into(),
            args,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeResponse {
    /// Correlation id of the request being answered; absent when the request
    /// was too malformed to recover one.
    #[serde(default)]
    pub id: Option<u64>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl BridgeResponse {
    pub fn ok(id: u64, result: Value) -> Self {
        Self {
            id: Some(id),
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn err(id: Option<u64>, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            id,
            success: false,
            result: None,
            error: Some(ErrorBody {
                kind,
                message: message.into(),
            }),
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }
}

/// Best-effort recovery of the correlation id from a body that failed to parse
/// as a full request, so the error response can still be matched.
pub fn recover_request_id(body: &[u8]) -> Option<u64> {
    serde_json::from_slice::<Value>(body)
        .ok()?
        .get("id")?
        .as_u64()
}
