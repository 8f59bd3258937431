//! Framed event transport.
//!
//! Events travel as length-prefixed JSON documents: a 4-byte little-endian
//! length followed by the document bytes. The framing works over any tokio
//! byte stream; [`tcp`] provides the socket plumbing used by the relay and
//! the CLI client.

pub mod tcp;

pub use tcp::{connect, TcpFrameReader, TcpFrameWriter, TcpListener};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::io::{
    AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter, ReadHalf, WriteHalf,
};

/// Default upper bound for a single frame.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 64 * 1024;

/// Errors raised while moving frames.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("Malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Receiving half of a framed connection.
#[async_trait]
pub trait FrameSource<T: Send>: Send {
    /// Receives the next item, `None` once the peer has closed the stream.
    async fn receive(&mut self) -> Result<Option<T>, TransportError>;
}

/// Sending half of a framed connection.
#[async_trait]
pub trait FrameSink<T: Sync>: Send {
    /// Sends one item and flushes it.
    async fn send(&mut self, item: &T) -> Result<(), TransportError>;

    /// Flushes and shuts down the write side.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Helper to write a length-prefixed frame.
pub async fn write_length_prefixed<W: AsyncWrite + Unpin>(
    writer: &mut W,
    data: &[u8],
    max: usize,
) -> Result<(), TransportError> {
    let too_large = || TransportError::FrameTooLarge {
        size: data.len(),
        max,
    };
    if data.len() > max {
        return Err(too_large());
    }
    let len = u32::try_from(data.len()).map_err(|_| too_large())?;
    writer.write_all(&len.to_le_bytes()).await?;
    writer.write_all(data).await?;
    writer.flush().await?;
    Ok(())
}

/// Helper to read a length-prefixed frame. Returns `None` on end of stream.
pub async fn read_length_prefixed<R: AsyncRead + Unpin>(
    reader: &mut R,
    max: usize,
) -> Result<Option<Vec<u8>>, TransportError> {
    let mut len_bytes = [0u8; 4];
    match reader.read_exact(&mut len_bytes).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes(len_bytes) as usize;
    if len > max {
        return Err(TransportError::FrameTooLarge { size: len, max });
    }

    let mut data = vec![0u8; len];
    reader.read_exact(&mut data).await?;
    Ok(Some(data))
}

/// Decodes JSON frames from a byte stream.
pub struct FrameReader<R> {
    reader: BufReader<R>,
    max_frame_bytes: usize,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R, max_frame_bytes: usize) -> Self {
        Self {
            reader: BufReader::new(reader),
            max_frame_bytes,
        }
    }
}

#[async_trait]
impl<R, T> FrameSource<T> for FrameReader<R>
where
    R: AsyncRead + Unpin + Send,
    T: DeserializeOwned + Send,
{
    async fn receive(&mut self) -> Result<Option<T>, TransportError> {
        match read_length_prefixed(&mut self.reader, self.max_frame_bytes).await? {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None),
        }
    }
}

/// Encodes JSON frames onto a byte stream.
pub struct FrameWriter<W> {
    writer: BufWriter<W>,
    max_frame_bytes: usize,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(writer: W, max_frame_bytes: usize) -> Self {
        Self {
            writer: BufWriter::new(writer),
            max_frame_bytes,
        }
    }
}

#[async_trait]
impl<W, T> FrameSink<T> for FrameWriter<W>
where
    W: AsyncWrite + Unpin + Send,
    T: Serialize + Sync,
{
    async fn send(&mut self, item: &T) -> Result<(), TransportError> {
        let data = serde_json::to_vec(item)?;
        write_length_prefixed(&mut self.writer, &data, self.max_frame_bytes).await
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.writer.flush().await?;
        self.writer.shutdown().await?;
        Ok(())
    }
}

/// Splits a byte stream into a framed reader and writer.
pub fn framed<S>(stream: S, max_frame_bytes: usize) -> (FrameReader<ReadHalf<S>>, FrameWriter<WriteHalf<S>>)
where
    S: AsyncRead + AsyncWrite,
{
    let (read_half, write_half) = tokio::io::split(stream);
    (
        FrameReader::new(read_half, max_frame_bytes),
        FrameWriter::new(write_half, max_frame_bytes),
    )
}
