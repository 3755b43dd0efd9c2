//! TCP transport: the rank handshake and per-rank frame multiplexing.
//!
//! Connection model: every solver rank opens one TCP connection and keeps it
//! for the whole session. [`TcpChannelListener::accept_ranks`] admits exactly
//! the configured number of connections, assigning rank ids densely in
//! arrival order, and hands back a [`TcpServerChannel`] that implements the
//! session loop's [`ServerChannel`] seam.
//!
//! Reading is fanned out to one task per rank; all tasks feed a single
//! bounded mpsc queue so the session loop sees one ordered event stream.
//! Writing stays in the session loop, which owns the write half of every
//! connection.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tandem_core::protocol::codec::{decode_hello, encode_welcome, frame_payload_len};
use tandem_core::{RankId, Welcome, HEADER_SIZE};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout_at;
use tracing::{debug, info, warn};

use crate::application::session::{ChannelError, Inbound, ServerChannel};

/// Error type for transport setup and the rank handshake.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("bind failed on {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("accepting a solver connection failed: {source}")]
    AcceptFailed {
        #[source]
        source: std::io::Error,
    },
    #[error("handshake with {peer} failed: {reason}")]
    Handshake { peer: SocketAddr, reason: String },
    #[error("handshake i/o with {peer} failed: {source}")]
    HandshakeIo {
        peer: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("only {joined} of {expected} ranks joined within {waited:?}")]
    JoinTimeout {
        joined: usize,
        expected: usize,
        waited: Duration,
    },
}

/// Backpressure bound for frames waiting on the session loop.
const INBOUND_QUEUE_DEPTH: usize = 64;

/// A bound socket waiting for solver ranks to join.
pub struct TcpChannelListener {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TcpChannelListener {
    pub async fn bind(addr: SocketAddr) -> Result<Self, NetworkError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| NetworkError::BindFailed { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| NetworkError::BindFailed { addr, source })?;
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// The actual bound address (useful when binding port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Admits exactly `rank_count` solver connections and returns the
    /// multiplexed session channel.
    ///
    /// Ranks are assigned densely from 0 in arrival order. The whole
    /// handshake phase shares one deadline: a missing rank fails startup
    /// with [`NetworkError::JoinTimeout`] instead of waiting forever.
    pub async fn accept_ranks(
        self,
        rank_count: usize,
        dimensions: i32,
        handshake_timeout: Duration,
    ) -> Result<TcpServerChannel, NetworkError> {
        let deadline = tokio::time::Instant::now() + handshake_timeout;
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_QUEUE_DEPTH);
        let mut writers = HashMap::with_capacity(rank_count);

        for rank in 0..rank_count as RankId {
            let join_timeout = || NetworkError::JoinTimeout {
                joined: rank as usize,
                expected: rank_count,
                waited: handshake_timeout,
            };

            let (stream, peer) = timeout_at(deadline, self.listener.accept())
                .await
                .map_err(|_| join_timeout())?
                .map_err(|source| NetworkError::AcceptFailed { source })?;
            if let Err(err) = stream.set_nodelay(true) {
                warn!(%peer, error = %err, "could not set TCP_NODELAY on solver socket");
            }
            let (mut read_half, mut write_half) = stream.into_split();

            let hello_frame = timeout_at(deadline, read_frame(&mut read_half))
                .await
                .map_err(|_| join_timeout())?
                .map_err(|source| NetworkError::HandshakeIo { peer, source })?
                .ok_or_else(|| NetworkError::Handshake {
                    peer,
                    reason: "connection closed before hello".to_string(),
                })?;
            let (hello, _) = decode_hello(&hello_frame).map_err(|err| NetworkError::Handshake {
                peer,
                reason: err.to_string(),
            })?;

            let welcome = Welcome {
                rank,
                rank_count: rank_count as i32,
                dimensions,
            };
            let frame = encode_welcome(&welcome).map_err(|err| NetworkError::Handshake {
                peer,
                reason: err.to_string(),
            })?;
            write_half
                .write_all(&frame)
                .await
                .map_err(|source| NetworkError::HandshakeIo { peer, source })?;

            info!(rank, solver = %hello.solver, %peer, "rank joined");
            writers.insert(rank, write_half);
            tokio::spawn(read_loop(rank, read_half, inbound_tx.clone()));
        }

        info!(ranks = rank_count, "all ranks joined; session channel ready");
        Ok(TcpServerChannel {
            rank_count,
            inbound_rx,
            writers,
        })
    }
}

/// All rank connections, multiplexed behind the [`ServerChannel`] seam.
pub struct TcpServerChannel {
    rank_count: usize,
    inbound_rx: mpsc::Receiver<Inbound>,
    writers: HashMap<RankId, OwnedWriteHalf>,
}

#[async_trait]
impl ServerChannel for TcpServerChannel {
    fn rank_count(&self) -> usize {
        self.rank_count
    }

    async fn recv(&mut self) -> Option<Inbound> {
        self.inbound_rx.recv().await
    }

    async fn send(&mut self, rank: RankId, frame: Vec<u8>) -> Result<(), ChannelError> {
        let writer = self
            .writers
            .get_mut(&rank)
            .ok_or(ChannelError::UnknownRank { rank })?;
        writer
            .write_all(&frame)
            .await
            .map_err(|source| ChannelError::Io { rank, source })
    }
}

/// Reads one length-prefixed frame, header included.
///
/// Returns `Ok(None)` on a clean EOF at a frame boundary; EOF inside a frame
/// is an error. An invalid header (bad version, oversized payload) surfaces
/// as `InvalidData` so the caller drops the connection instead of guessing
/// at the stream position.
async fn read_frame<R>(reader: &mut R) -> std::io::Result<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
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
    reader.read_exact(&mut frame[HEADER_SIZE..]).await?;
    Ok(Some(frame))
}

/// Forwards frames from one rank until its connection ends, then reports
/// the close so the session loop can react.
async fn read_loop(rank: RankId, mut reader: OwnedReadHalf, inbound: mpsc::Sender<Inbound>) {
    loop {
        match read_frame(&mut reader).await {
            Ok(Some(bytes)) => {
                if inbound.send(Inbound::Frame { rank, bytes }).await.is_err() {
                    // Session loop is gone; nothing left to deliver to.
                    return;
                }
            }
            Ok(None) => {
                debug!(rank, "solver connection closed");
                break;
            }
            Err(err) => {
                warn!(rank, error = %err, "solver connection failed");
                break;
            }
        }
    }
    let _ = inbound.send(Inbound::Closed { rank }).await;
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_core::protocol::codec::{decode_welcome, encode_hello};
    use tandem_core::Hello;
    use tokio::net::TcpStream;

    async fn join_as(addr: SocketAddr, solver: &str) -> (TcpStream, Welcome) {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let hello = encode_hello(&Hello {
            solver: solver.to_string(),
        })
        .unwrap();
        stream.write_all(&hello).await.unwrap();
        let frame = read_frame(&mut stream).await.unwrap().unwrap();
        let (welcome, _) = decode_welcome(&frame).unwrap();
        (stream, welcome)
    }

    #[tokio::test]
    async fn test_ranks_are_assigned_densely_in_arrival_order() {
        let listener = TcpChannelListener::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let addr = listener.local_addr();
        let accept = tokio::spawn(listener.accept_ranks(2, 3, Duration::from_secs(5)));

        let (_first, welcome_a) = join_as(addr, "fluid").await;
        assert_eq!(welcome_a.rank, 0);
        assert_eq!(welcome_a.rank_count, 2);
        assert_eq!(welcome_a.dimensions, 3);

        let (_second, welcome_b) = join_as(addr, "solid").await;
        assert_eq!(welcome_b.rank, 1);

        let channel = accept.await.unwrap().unwrap();
        assert_eq!(channel.rank_count(), 2);
    }

    #[tokio::test]
    async fn test_missing_rank_fails_startup_with_join_timeout() {
        let listener = TcpChannelListener::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let addr = listener.local_addr();
        let accept = tokio::spawn(listener.accept_ranks(2, 3, Duration::from_millis(100)));

        let (_only, welcome) = join_as(addr, "fluid").await;
        assert_eq!(welcome.rank, 0);

        let result = accept.await.unwrap();
        assert!(matches!(
            result,
            Err(NetworkError::JoinTimeout {
                joined: 1,
                expected: 2,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_frames_flow_from_socket_to_channel_and_back() {
        let listener = TcpChannelListener::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let addr = listener.local_addr();
        let accept = tokio::spawn(listener.accept_ranks(1, 2, Duration::from_secs(5)));

        let (mut stream, _) = join_as(addr, "fluid").await;
        let mut channel = accept.await.unwrap().unwrap();

        let call = tandem_core::encode_call(&tandem_core::Call::Ping).unwrap();
        stream.write_all(&call).await.unwrap();
        match channel.recv().await {
            Some(Inbound::Frame { rank, bytes }) => {
                assert_eq!(rank, 0);
                assert_eq!(bytes, call);
            }
            other => panic!("expected the ping frame, got {other:?}"),
        }

        let reply = tandem_core::encode_reply(&tandem_core::Reply::Ack).unwrap();
        channel.send(0, reply.clone()).await.unwrap();
        let echoed = read_frame(&mut stream).await.unwrap().unwrap();
        assert_eq!(echoed, reply);

        drop(stream);
        assert!(matches!(
            channel.recv().await,
            Some(Inbound::Closed { rank: 0 })
        ));
    }

    #[tokio::test]
    async fn test_send_to_unknown_rank_is_an_error() {
        let (_tx, inbound_rx) = mpsc::channel(1);
        let mut channel = TcpServerChannel {
            rank_count: 1,
            inbound_rx,
            writers: HashMap::new(),
        };
        assert!(matches!(
            channel.send(5, vec![0u8; 4]).await,
            Err(ChannelError::UnknownRank { rank: 5 })
        ));
    }
}
