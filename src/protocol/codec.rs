//! Length-prefixed JSON frames

use crate::error::{DistSortError, ErrorCode};
use crate::model::Endpoint;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest frame body accepted in either direction
pub const MAX_FRAME_LEN: usize = 256 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed frame body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Frame of {0} bytes exceeds the frame size limit")]
    FrameTooLarge(usize),
}

impl CodecError {
    /// Whether the peer closed the connection before sending a full frame
    pub fn is_eof(&self) -> bool {
        matches!(self, CodecError::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof)
    }

    /// Attribute a codec failure to the peer it happened with
    pub fn with_endpoint(self, endpoint: &Endpoint) -> DistSortError {
        match self {
            CodecError::Io(source) => DistSortError::Io {
                endpoint: endpoint.clone(),
                source,
            },
            CodecError::Json(e) => {
                DistSortError::protocol(format!("malformed frame from {endpoint}: {e}"))
            }
            CodecError::FrameTooLarge(len) => DistSortError::protocol_with_code(
                ErrorCode::PROTOCOL_FRAME_TOO_LARGE,
                format!("{endpoint} sent a {len} byte frame"),
            ),
        }
    }
}

/// Encode one value as a frame
pub async fn write_frame<W, T>(writer: &mut W, value: &T) -> Result<(), CodecError>
where
    W: AsyncWrite + Unpin,
    T: Serialize + ?Sized,
{
    let body = serde_json::to_vec(value)?;
    if body.len() > MAX_FRAME_LEN {
        return Err(CodecError::FrameTooLarge(body.len()));
    }
    writer.write_u32(body.len() as u32).await?;
    writer.write_all(&body).await?;
    Ok(())
}

/// Decode one frame into a value
pub async fn read_frame<R, T>(reader: &mut R) -> Result<T, CodecError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let len = reader.read_u32().await? as usize;
    if len > MAX_FRAME_LEN {
        return Err(CodecError::FrameTooLarge(len));
    }
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(serde_json::from_slice(&body)?)
}
