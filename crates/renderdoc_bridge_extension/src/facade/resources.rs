use base64::{engine::general_purpose::STANDARD, Engine as _};
use renderdoc_bridge_core::types::{
    BufferContents, BufferContentsArgs, ResourceId, TextureData, TextureDataArgs, TextureInfo,
    CUBE_FACES,
};

use super::CaptureFacade;
use crate::error::FacadeError;
use crate::replay::{Subresource, TextureDescription};

impl CaptureFacade {
    /// Omitted offset reads from 0; omitted or zero length reads to the end.
    pub fn get_buffer_contents(
        &self,
        args: &BufferContentsArgs,
    ) -> Result<BufferContents, FacadeError> {
        let session = self.session()?;
        let id = args.resource_id;
        let size = session
            .buffer(id)
            .ok_or_else(|| FacadeError::NotFound(format!("Buffer {id} not found")))?
            .size;

        let offset = args.offset.unwrap_or(0);
        if offset > size {
            return Err(FacadeError::Range(format!(
                "Offset {offset} is past the end of buffer {id} ({size} bytes)"
            )));
        }
        let length = match args.length {
            None | Some(0) => size - offset,
            Some(length) => length,
        };
        if offset.checked_add(length).map_or(true, |end| end > size) {
            return Err(FacadeError::Range(format!(
                "Range {offset}+{length} exceeds buffer {id} size of {size} bytes"
            )));
        }
        self.check_blob_size(length)?;

        let data = session.controller().buffer_data(id, offset, length)?;
        Ok(BufferContents {
            resource_id: id,
            name: session.resource_name(id),
            total_size: size,
            offset,
            length: data.len() as u64,
            data_base64: STANDARD.encode(&data),
        })
    }

    pub fn get_texture_info(&self, resource_id: ResourceId) -> Result<TextureInfo, FacadeError> {
        let session = self.session()?;
        let desc = texture(session.texture(resource_id), resource_id)?;
        Ok(TextureInfo {
            resource_id,
            name: session.resource_name(resource_id),
            dimension: desc.dimension,
            width: desc.width,
            height: desc.height,
            depth: desc.depth,
            array_size: desc.array_size,
            mips: desc.mips,
            format: desc.format.clone(),
            sample_count: desc.sample_count,
            byte_size: desc.byte_size,
        })
    }

    /// Reads one 2D image. Volume textures are addressed by `depth_slice`,
    /// everything else by `slice`; the other one is ignored.
    pub fn get_texture_data(&self, args: &TextureDataArgs) -> Result<TextureData, FacadeError> {
        let session = self.session()?;
        let id = args.resource_id;
        let desc = texture(session.texture(id), id)?;

        let mip = args.mip.unwrap_or(0);
        if mip >= desc.mips {
            return Err(FacadeError::Range(format!(
                "Mip {mip} out of range, texture {id} has {} mips",
                desc.mips
            )));
        }
        let sample = args.sample.unwrap_or(0);
        if sample >= desc.sample_count {
            return Err(FacadeError::Range(format!(
                "Sample {sample} out of range, texture {id} has {} samples",
                desc.sample_count
            )));
        }

        let (slice, depth_slice, face) = if desc.dimension.is_3d() {
            let depth_slice = args.depth_slice.unwrap_or(0);
            let depth = desc.mip_depth(mip);
            if depth_slice >= depth {
                return Err(FacadeError::Range(format!(
                    "Depth slice {depth_slice} out of range, mip {mip} of texture {id} is {depth} deep"
                )));
            }
            (None, Some(depth_slice), None)
        } else {
            let slice = args.slice.unwrap_or(0);
            if slice >= desc.array_size {
                return Err(FacadeError::Range(format!(
                    "Slice {slice} out of range, texture {id} has {} slices",
                    desc.array_size
                )));
            }
            let face = desc
                .dimension
                .is_cube()
                .then(|| CUBE_FACES[(slice % 6) as usize].to_string());
            (Some(slice), None, face)
        };

        let sub = Subresource {
            mip,
            slice: slice.or(depth_slice).unwrap_or(0),
            sample,
        };
        let controller = session.controller();
        self.check_blob_size(controller.subresource_size(id, mip)?)?;
        let data = controller.texture_data(id, sub)?;

        Ok(TextureData {
            resource_id: id,
            name: session.resource_name(id),
            dimension: desc.dimension,
            mip,
            slice,
            face,
            depth_slice,
            sample,
            width: desc.mip_width(mip),
            height: desc.mip_height(mip),
            format: desc.format.clone(),
            data_length: data.len(),
            data_base64: STANDARD.encode(&data),
        })
    }

    fn check_blob_size(&self, length: u64) -> Result<(), FacadeError> {
        if length > self.max_blob_bytes as u64 {
            return Err(FacadeError::Range(format!(
                "Payload of {length} bytes exceeds the transfer limit of {} bytes",
                self.max_blob_bytes
            )));
        }
        Ok(())
    }
}

fn texture(
    desc: Option<&TextureDescription>,
    id: ResourceId,
) -> Result<&TextureDescription, FacadeError> {
    desc.ok_or_else(|| FacadeError::NotFound(format!("Texture {id} not found")))
}
