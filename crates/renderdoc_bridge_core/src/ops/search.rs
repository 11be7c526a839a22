use crate::protocol::operations;
use crate::types::{
    FindDrawsByShaderArgs, FindDrawsByTextureArgs, ResourceArgs, ResourceId, SearchResult,
    ShaderStage,
};
use crate::{BridgeClient, Result};

pub async fn find_draws_by_shader(
    client: &BridgeClient,
    shader_name: &str,
    stage: Option<ShaderStage>,
) -> Result<SearchResult> {
    let args = FindDrawsByShaderArgs {
        shader_name: shader_name.to_string(),
        stage,
    };
    client.call(operations::FIND_DRAWS_BY_SHADER, &args).await
}

pub async fn find_draws_by_texture(client: &BridgeClient, texture_name: &str) -> Result<SearchResult> {
    let args = FindDrawsByTextureArgs {
        texture_name: texture_name.to_string(),
    };
    client.call(operations::FIND_DRAWS_BY_TEXTURE, &args).await
}

pub async fn find_draws_by_resource(
    client: &BridgeClient,
    resource_id: ResourceId,
) -> Result<SearchResult> {
    client
        .call(operations::FIND_DRAWS_BY_RESOURCE, &ResourceArgs { resource_id })
        .await
}
