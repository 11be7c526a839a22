use crate::protocol::operations;
use crate::types::{
    EventArgs, MultiplePipelineStatesArgs, PipelineState, PipelineStates, ShaderArgs, ShaderInfo,
    ShaderSource, ShaderSourceArgs, ShaderStage,
};
use crate::{BridgeClient, Result};

pub async fn get_pipeline_state(client: &BridgeClient, event_id: u32) -> Result<PipelineState> {
    client
        .call(operations::GET_PIPELINE_STATE, &EventArgs { event_id })
        .await
}

pub async fn get_multiple_pipeline_states(
    client: &BridgeClient,
    event_ids: Vec<u32>,
) -> Result<PipelineStates> {
    let args = MultiplePipelineStatesArgs { event_ids };
    client
        .call(operations::GET_MULTIPLE_PIPELINE_STATES, &args)
        .await
}

pub async fn get_shader_info(
    client: &BridgeClient,
    event_id: u32,
    stage: ShaderStage,
) -> Result<ShaderInfo> {
    client
        .call(operations::GET_SHADER_INFO, &ShaderArgs { event_id, stage })
        .await
}

pub async fn get_shader_source(client: &BridgeClient, args: &ShaderSourceArgs) -> Result<ShaderSource> {
    client.call(operations::GET_SHADER_SOURCE, args).await
}
