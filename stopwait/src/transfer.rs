//! Streaming a byte source over a [`Session`].
//!
//! The session moves one packet of at most [`MAX_PAYLOAD`] bytes at a time.
//! These helpers cut a stream into such chunks, send them in order, and mark
//! the end of the stream with a zero-length packet.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use thiserror::Error;

use crate::channel::Channel;
use crate::packet::MAX_PAYLOAD;
use crate::session::{Session, SessionError};

#[derive(Error, Debug)]
pub enum TransferError {
    #[error(transparent)]
    Session(#[from] SessionError),
    /// Reading the source or writing the sink failed.
    #[error("stream I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Send everything `reader` yields, then the end-of-stream marker.
///
/// Returns the number of payload bytes sent.
pub async fn send_stream<C, R>(session: &mut Session<C>, reader: &mut R) -> Result<u64, TransferError>
where
    C: Channel,
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; MAX_PAYLOAD];
    let mut total = 0u64;
    loop {
        let n = fill_chunk(reader, &mut chunk).await?;
        if n == 0 {
            break;
        }
        session.send(&chunk[..n]).await?;
        total += n as u64;
    }
    session.send(&[]).await?;
    log::debug!("[xfer] sent {total} bytes");
    Ok(total)
}

/// Write every payload received into `writer` until the end-of-stream marker.
///
/// Returns the number of payload bytes written.
pub async fn receive_stream<C, W>(
    session: &mut Session<C>,
    writer: &mut W,
) -> Result<u64, TransferError>
where
    C: Channel,
    W: AsyncWrite + Unpin,
{
    let mut total = 0u64;
    loop {
        let payload = session.receive().await?;
        if payload.is_empty() {
            break;
        }
        writer.write_all(&payload).await?;
        total += payload.len() as u64;
    }
    writer.flush().await?;
    log::debug!("[xfer] received {total} bytes");
    Ok(total)
}

/// Read until `buf` is full or the source is exhausted.
///
/// Short reads are topped up so that only the last chunk can be partial.
async fn fill_chunk<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
