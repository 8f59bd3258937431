//! TCP plumbing for framed connections.

use std::net::SocketAddr;

use tokio::io::{ReadHalf, WriteHalf};
use tokio::net::{TcpListener as TokioTcpListener, TcpStream, ToSocketAddrs};

use super::{framed, FrameReader, FrameWriter, TransportError};

/// Framed reader over a TCP connection.
pub type TcpFrameReader = FrameReader<ReadHalf<TcpStream>>;

/// Framed writer over a TCP connection.
pub type TcpFrameWriter = FrameWriter<WriteHalf<TcpStream>>;

/// Connects to a relay and returns the framed halves.
pub async fn connect<A: ToSocketAddrs>(
    addr: A,
    max_frame_bytes: usize,
) -> Result<(TcpFrameReader, TcpFrameWriter), TransportError> {
    let stream = TcpStream::connect(addr).await?;
    stream.set_nodelay(true)?;
    Ok(framed(stream, max_frame_bytes))
}

/// TCP listener accepting relay connections.
pub struct TcpListener {
    listener: TokioTcpListener,
}

impl TcpListener {
    /// Bind to an address and start listening.
    pub async fn bind<A: ToSocketAddrs>(addr: A) -> Result<Self, TransportError> {
        let listener = TokioTcpListener::bind(addr).await?;
        Ok(Self { listener })
    }

    /// Accept a new connection.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr), TransportError> {
        let (stream, addr) = self.listener.accept().await?;
        stream.set_nodelay(true)?;
        Ok((stream, addr))
    }

    /// Get the local address.
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.listener.local_addr()?)
    }
}
