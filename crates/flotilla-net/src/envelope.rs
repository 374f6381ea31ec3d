//! Frame envelope and codec.
//!
//! Every frame on the wire is one `Envelope`, bincode-encoded behind a
//! 4-byte big-endian length prefix. Payload bytes inside an envelope are
//! opaque to this layer; typed YAML decoding happens in `flotilla-wire` at
//! the edges that care.

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use flotilla_wire::{Command, ErrorOp, Event, Role, Status};

use crate::error::NetError;

/// Upper bound on an encoded frame. Nothing in the protocol comes close;
/// anything larger is a broken or hostile peer.
pub const MAX_FRAME_BYTES: usize = 1 << 20;

/// One frame on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Envelope {
    /// First frame a peer sends: who it is and what role it claims.
    Connect { uuid: String, role: Role },
    /// Server's reply completing the handshake.
    ConnectAck { status: Status },
    Command { op: Command, payload: Vec<u8> },
    Event { op: Event, payload: Vec<u8> },
    Status { status: Status, payload: Vec<u8> },
    Error { op: ErrorOp, payload: Vec<u8> },
}

/// Write one envelope, length-prefixed.
pub async fn write_envelope<W>(writer: &mut W, envelope: &Envelope) -> Result<(), NetError>
where
    W: AsyncWrite + Unpin,
{
    let bytes = bincode::serialize(envelope)?;
    if bytes.len() > MAX_FRAME_BYTES {
        return Err(NetError::FrameTooLarge(bytes.len(), MAX_FRAME_BYTES));
    }

    writer.write_all(&(bytes.len() as u32).to_be_bytes()).await?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one envelope. Returns `Ok(None)` on a clean close before the next
/// length prefix.
pub async fn read_envelope<R>(reader: &mut R) -> Result<Option<Envelope>, NetError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_BYTES {
        return Err(NetError::FrameTooLarge(len, MAX_FRAME_BYTES));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(Some(bincode::deserialize(&body)?))
}
