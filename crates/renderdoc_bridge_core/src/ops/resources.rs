use base64::{engine::general_purpose::STANDARD, Engine};

use crate::protocol::operations;
use crate::types::{
    BufferContents, BufferContentsArgs, ResourceArgs, ResourceId, TextureData, TextureDataArgs,
    TextureInfo,
};
use crate::{BridgeClient, BridgeError, Result};

pub async fn get_buffer_contents(
    client: &BridgeClient,
    args: &BufferContentsArgs,
) -> Result<BufferContents> {
    client.call(operations::GET_BUFFER_CONTENTS, args).await
}

pub async fn get_texture_info(client: &BridgeClient, resource_id: ResourceId) -> Result<TextureInfo> {
    client
        .call(operations::GET_TEXTURE_INFO, &ResourceArgs { resource_id })
        .await
}

pub async fn get_texture_data(client: &BridgeClient, args: &TextureDataArgs) -> Result<TextureData> {
    client.call(operations::GET_TEXTURE_DATA, args).await
}

/// Decodes a base64 payload carried by buffer or texture responses.
pub fn decode_payload(data_base64: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(data_base64)
        .map_err(|e| BridgeError::InvalidResponse(format!("payload is not valid base64: {e}")))
}
