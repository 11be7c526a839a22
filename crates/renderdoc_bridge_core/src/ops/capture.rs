use crate::protocol::operations;
use crate::types::{
    CaptureList, CaptureStatus, CloseCaptureResponse, ListCapturesArgs, NoArgs,
    OpenCaptureArgs, OpenCaptureResponse, PingResponse,
};
use crate::{BridgeClient, Result};

pub async fn ping(client: &BridgeClient) -> Result<PingResponse> {
    client.call(operations::PING, &NoArgs {}).await
}

pub async fn list_captures(client: &BridgeClient, directory: &str) -> Result<CaptureList> {
    let args = ListCapturesArgs {
        directory: directory.to_string(),
    };
    client.call(operations::LIST_CAPTURES, &args).await
}

pub async fn open_capture(client: &BridgeClient, capture_path: &str) -> Result<OpenCaptureResponse> {
    let args = OpenCaptureArgs {
        capture_path: capture_path.to_string(),
    };
    client.call(operations::OPEN_CAPTURE, &args).await
}

pub async fn close_capture(client: &BridgeClient) -> Result<CloseCaptureResponse> {
    client.call(operations::CLOSE_CAPTURE, &NoArgs {}).await
}

pub async fn get_capture_status(client: &BridgeClient) -> Result<CaptureStatus> {
    client.call(operations::GET_CAPTURE_STATUS, &NoArgs {}).await
}
