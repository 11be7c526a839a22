use crate::protocol::operations;
use crate::types::{
    ActionTimings, DrawCallDetails, DrawCallList, EventArgs, FrameSummary, GetActionTimingsArgs,
    GetDrawCallsArgs, NoArgs,
};
use crate::{BridgeClient, Result};

pub async fn get_draw_calls(client: &BridgeClient, args: &GetDrawCallsArgs) -> Result<DrawCallList> {
    client.call(operations::GET_DRAW_CALLS, args).await
}

pub async fn get_frame_summary(client: &BridgeClient) -> Result<FrameSummary> {
    client.call(operations::GET_FRAME_SUMMARY, &NoArgs {}).await
}

pub async fn get_draw_call_details(client: &BridgeClient, event_id: u32) -> Result<DrawCallDetails> {
    client
        .call(operations::GET_DRAW_CALL_DETAILS, &EventArgs { event_id })
        .await
}

/// Callers must check `ActionTimings::available`; an unsupported counter is
/// not an error.
pub async fn get_action_timings(
    client: &BridgeClient,
    args: &GetActionTimingsArgs,
) -> Result<ActionTimings> {
    client.call(operations::GET_ACTION_TIMINGS, args).await
}
