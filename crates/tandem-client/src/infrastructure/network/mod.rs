//! TCP transport for the coupling proxy.
//!
//! [`TcpClientChannel`] implements the application's
//! [`ClientChannel`](crate::application::solver::ClientChannel) seam over one
//! TCP stream:
//!
//! - `connect` dials the server, sends the hello frame carrying the solver
//!   name, and blocks until the welcome frame assigns this process its rank.
//! - After the handshake the channel only moves whole frames; the proxy owns
//!   call encoding and reply decoding.

use std::net::SocketAddr;

use tandem_core::protocol::codec::{decode_welcome, encode_hello, frame_payload_len};
use tandem_core::{Hello, RankId, HEADER_SIZE};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{info, warn};

use crate::application::solver::{ClientChannel, ClientChannelError};

use async_trait::async_trait;

/// A connected, rank-assigned TCP channel to the coupling server.
#[derive(Debug)]
pub struct TcpClientChannel {
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
    rank: RankId,
    rank_count: i32,
    dimensions: i32,
}

impl TcpClientChannel {
    /// Connects to the coupling server and completes the join handshake.
    ///
    /// Blocks until the server has admitted this process, which happens in
    /// connection order: the first solver to join becomes rank 0.
    pub async fn connect(addr: SocketAddr, solver: &str) -> Result<Self, ClientChannelError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| ClientChannelError::ConnectFailed { addr, source })?;
        if let Err(err) = stream.set_nodelay(true) {
            warn!("could not disable Nagle on the server connection: {err}");
        }
        let (mut reader, mut writer) = stream.into_split();

        let hello = Hello {
            solver: solver.to_string(),
        };
        let hello_frame = encode_hello(&hello).map_err(invalid_frame)?;
        writer.write_all(&hello_frame).await?;

        let welcome_frame = read_frame(&mut reader)
            .await?
            .ok_or(ClientChannelError::Closed)?;
        let (welcome, _) = decode_welcome(&welcome_frame).map_err(invalid_frame)?;
        info!(
            rank = welcome.rank,
            rank_count = welcome.rank_count,
            dimensions = welcome.dimensions,
            "joined coupling session"
        );

        Ok(Self {
            reader,
            writer,
            rank: welcome.rank,
            rank_count: welcome.rank_count,
            dimensions: welcome.dimensions,
        })
    }

    /// The rank the server assigned to this connection.
    pub fn rank(&self) -> RankId {
        self.rank
    }

    /// Total number of ranks in the session.
    pub fn rank_count(&self) -> i32 {
        self.rank_count
    }

    /// Spatial dimensionality of the server's coupling state.
    pub fn dimensions(&self) -> i32 {
        self.dimensions
    }
}

#[async_trait]
impl ClientChannel for TcpClientChannel {
    async fn send(&mut self, frame: Vec<u8>) -> Result<(), ClientChannelError> {
        self.writer.write_all(&frame).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Vec<u8>, ClientChannelError> {
        match read_frame(&mut self.reader).await? {
            Some(frame) => Ok(frame),
            None => Err(ClientChannelError::Closed),
        }
    }
}

fn invalid_frame(err: tandem_core::CodecError) -> ClientChannelError {
    ClientChannelError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, err))
}

/// Reads one complete frame: the fixed header, then exactly the payload
/// length the header declares. Returns `None` on a clean EOF before the
/// header.
async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> std::io::Result<Option<Vec<u8>>> {
    let mut header = [0u8; HEADER_SIZE];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(err),
    }

    let payload_len = frame_payload_len(&header)
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))?;

    let mut frame = vec![0u8; HEADER_SIZE + payload_len];
    frame[..HEADER_SIZE].copy_from_slice(&header);
    if payload_len > 0 {
        reader.read_exact(&mut frame[HEADER_SIZE..]).await?;
    }
    Ok(Some(frame))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_core::protocol::codec::{decode_hello, encode_welcome};
    use tandem_core::{decode_call, decode_reply, encode_call, encode_reply, Call, Reply, Welcome};
    use tokio::net::TcpListener;

    /// Accepts one connection, answers the hello with the given welcome, and
    /// returns the accepted stream for further scripting.
    async fn accept_one(listener: &TcpListener, welcome: Welcome) -> TcpStream {
        let (mut stream, _) = listener.accept().await.unwrap();
        let frame = read_frame(&mut stream).await.unwrap().unwrap();
        let (hello, _) = decode_hello(&frame).unwrap();
        assert!(!hello.solver.is_empty());
        stream
            .write_all(&encode_welcome(&welcome).unwrap())
            .await
            .unwrap();
        stream
    }

    #[tokio::test]
    async fn test_connect_handshake_yields_the_assigned_rank() {
        // Arrange
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            accept_one(
                &listener,
                Welcome {
                    rank: 1,
                    rank_count: 2,
                    dimensions: 3,
                },
            )
            .await
        });

        // Act
        let channel = TcpClientChannel::connect(addr, "flow-solver").await.unwrap();

        // Assert
        assert_eq!(channel.rank(), 1);
        assert_eq!(channel.rank_count(), 2);
        assert_eq!(channel.dimensions(), 3);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_frames_round_trip_after_the_handshake() {
        // Arrange: a scripted server that answers one call with one ack.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let mut stream = accept_one(
                &listener,
                Welcome {
                    rank: 0,
                    rank_count: 1,
                    dimensions: 2,
                },
            )
            .await;
            let frame = read_frame(&mut stream).await.unwrap().unwrap();
            let (call, _) = decode_call(&frame).unwrap();
            assert_eq!(call, Call::Ping);
            stream
                .write_all(&encode_reply(&Reply::Ack).unwrap())
                .await
                .unwrap();
        });

        let mut channel = TcpClientChannel::connect(addr, "flow-solver").await.unwrap();

        // Act
        channel.send(encode_call(&Call::Ping).unwrap()).await.unwrap();
        let reply_frame = channel.recv().await.unwrap();

        // Assert
        let (reply, _) = decode_reply(&reply_frame).unwrap();
        assert_eq!(reply, Reply::Ack);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_recv_after_server_close_reports_closed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let stream = accept_one(
                &listener,
                Welcome {
                    rank: 0,
                    rank_count: 1,
                    dimensions: 3,
                },
            )
            .await;
            drop(stream);
        });

        let mut channel = TcpClientChannel::connect(addr, "flow-solver").await.unwrap();
        server.await.unwrap();

        let err = channel.recv().await.unwrap_err();
        assert!(matches!(err, ClientChannelError::Closed));
    }

    #[tokio::test]
    async fn test_connect_to_closed_port_reports_connect_failed() {
        // Port 1 is reserved and never listening in the test environment.
        let addr: SocketAddr = "127.0.0.1:1".parse().unwrap();

        let err = TcpClientChannel::connect(addr, "flow-solver")
            .await
            .unwrap_err();

        assert!(matches!(err, ClientChannelError::ConnectFailed { .. }));
    }
}
