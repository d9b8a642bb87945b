//! Transport boundary.
//!
//! A [`Transport`] opens byte-stream channels to exactly one peer each. The
//! session facade only needs the two halves of the stream and a printable
//! remote address, so radio sockets, TCP, or in-memory pipes all fit.
//!
//! [`TcpTransport`] is the bundled implementation.

use std::future::Future;

use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::{
        TcpListener, TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
};

use crate::error::TransportError;

/// An open channel to one peer.
#[derive(Debug)]
pub struct Channel<R, W> {
    /// Inbound half
    pub reader: R,
    /// Outbound half
    pub writer: W,
    /// Partner address as reported by the transport
    pub remote: String,
}

/// Accepts channels opened by peers.
pub trait Listener: Send + Sync + 'static {
    /// Inbound half type
    type Reader: AsyncRead + Unpin + Send + 'static;
    /// Outbound half type
    type Writer: AsyncWrite + Unpin + Send + 'static;

    /// Wait for the next incoming channel.
    fn accept(
        &self,
    ) -> impl Future<Output = Result<Channel<Self::Reader, Self::Writer>, TransportError>> + Send;

    /// Address peers should connect to.
    fn local_address(&self) -> Result<String, TransportError>;
}

/// Opens channels to peers and listens for theirs.
pub trait Transport: Send + Sync + 'static {
    /// Inbound half type
    type Reader: AsyncRead + Unpin + Send + 'static;
    /// Outbound half type
    type Writer: AsyncWrite + Unpin + Send + 'static;
    /// Listener type produced by [`Transport::bind`]
    type Listener: Listener<Reader = Self::Reader, Writer = Self::Writer>;

    /// Start listening on `address`.
    fn bind(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<Self::Listener, TransportError>> + Send;

    /// Open a channel to `address`.
    fn connect(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<Channel<Self::Reader, Self::Writer>, TransportError>> + Send;
}

/// TCP stand-in for the radio socket.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpTransport;

/// Listening TCP socket.
#[derive(Debug)]
pub struct TcpChannelListener {
    listener: TcpListener,
}

fn split(stream: TcpStream) -> Result<Channel<OwnedReadHalf, OwnedWriteHalf>, TransportError> {
    // Small control frames must not wait for Nagle
    stream.set_nodelay(true)?;
    let remote = stream.peer_addr()?.to_string();
    let (reader, writer) = stream.into_split();
    Ok(Channel { reader, writer, remote })
}

impl Listener for TcpChannelListener {
    type Reader = OwnedReadHalf;
    type Writer = OwnedWriteHalf;

    async fn accept(&self) -> Result<Channel<OwnedReadHalf, OwnedWriteHalf>, TransportError> {
        let (stream, _) = self.listener.accept().await?;
        split(stream)
    }

    fn local_address(&self) -> Result<String, TransportError> {
        Ok(self.listener.local_addr()?.to_string())
    }
}

impl Transport for TcpTransport {
    type Reader = OwnedReadHalf;
    type Writer = OwnedWriteHalf;
    type Listener = TcpChannelListener;

    async fn bind(&self, address: &str) -> Result<TcpChannelListener, TransportError> {
        let listener = TcpListener::bind(address).await.map_err(|e| {
            TransportError::InvalidAddress { address: address.to_string(), reason: e.to_string() }
        })?;
        tracing::info!("listening on {}", listener.local_addr()?);
        Ok(TcpChannelListener { listener })
    }

    async fn connect(
        &self,
        address: &str,
    ) -> Result<Channel<OwnedReadHalf, OwnedWriteHalf>, TransportError> {
        let stream = TcpStream::connect(address).await?;
        split(stream)
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;

    #[tokio::test]
    async fn tcp_channel_round_trip() {
        let transport = TcpTransport;
        let listener = transport.bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_address().unwrap();

        let (client, server) = tokio::join!(transport.connect(&address), listener.accept());
        let mut client = client.unwrap();
        let mut server = server.unwrap();

        client.writer.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        server.reader.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");
        assert_eq!(server.remote, client.writer.local_addr().unwrap().to_string());
    }

    #[tokio::test]
    async fn bind_rejects_bad_address() {
        let result = TcpTransport.bind("not an address").await;
        assert!(matches!(result, Err(TransportError::InvalidAddress { .. })));
    }
}
