//! `[u32 big-endian length][UTF-8 JSON body]` frames used by the socket channel.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest body either side will accept.
pub const MAX_FRAME_LEN: usize = 256 * 1024 * 1024;

const HEADER_LEN: usize = 4;

pub async fn write_frame<W>(writer: &mut W, body: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    if body.len() > MAX_FRAME_LEN {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("frame body of {} bytes exceeds limit of {MAX_FRAME_LEN}", body.len()),
        ));
    }
    let header = (body.len() as u32).to_be_bytes();
    writer.write_all(&header).await?;
    writer.write_all(body).await?;
    writer.flush().await
}

/// Reads one complete frame body.
///
/// Returns `Ok(None)` when the peer closed the stream cleanly before a new
/// header started. A stream that ends inside a frame is an error, so a
/// partially received request is never handed to a caller.
pub async fn read_frame<R>(reader: &mut R) -> std::io::Result<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0_u8; HEADER_LEN];
    let mut filled = 0;
    while filled < HEADER_LEN {
        let read = reader.read(&mut header[filled..]).await?;
        if read == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "stream closed while reading frame header",
            ));
        }
        filled += read;
    }

    let length = u32::from_be_bytes(header) as usize;
    if length > MAX_FRAME_LEN {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("frame length {length} exceeds limit of {MAX_FRAME_LEN}"),
        ));
    }

    let mut body = vec![0_u8; length];
    reader.read_exact(&mut body).await?;
    Ok(Some(body))
}
