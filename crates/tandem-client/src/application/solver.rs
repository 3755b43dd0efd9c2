//! The coupling proxy: typed calls over a frame channel.
//!
//! [`CouplingProxy`] turns each protocol operation into an async method that
//! encodes the call, sends one frame, awaits one reply frame, and checks the
//! reply shape. The transport behind it is the [`ClientChannel`] trait, so
//! every proxy rule is testable against a scripted channel.
//!
//! Failure layering: a [`Reply::Failure`] from the server becomes
//! [`ProxyError::Remote`] with the wire failure code; a dead or closed
//! channel becomes [`ProxyError::ServerUnreachable`], which never travels
//! on the wire.

use async_trait::async_trait;
use tandem_core::protocol::reply::ReplyTag;
use tandem_core::{decode_reply, encode_call, Call, CodecError, FailureCode, Reply};
use thiserror::Error;

/// Error type for the client's transport.
#[derive(Debug, Error)]
pub enum ClientChannelError {
    #[error("connect to {addr} failed: {source}")]
    ConnectFailed {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("connection i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("server closed the connection")]
    Closed,
}

/// Frame transport between the proxy and the coupling server.
///
/// Implemented by the TCP channel in production and by scripted fakes in
/// tests.
#[async_trait]
pub trait ClientChannel: Send {
    /// Sends one complete frame.
    async fn send(&mut self, frame: Vec<u8>) -> Result<(), ClientChannelError>;

    /// Receives the next complete frame.
    async fn recv(&mut self) -> Result<Vec<u8>, ClientChannelError>;
}

/// Error type for proxy calls.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The server executed (or refused) the call and reported a failure.
    #[error("server rejected {op}: {code}: {message}")]
    Remote {
        op: &'static str,
        code: FailureCode,
        message: String,
    },
    /// The server answered with a success reply of the wrong shape.
    #[error("{op} expected a {expected:?} reply, got {got:?}")]
    UnexpectedReply {
        op: &'static str,
        expected: ReplyTag,
        got: ReplyTag,
    },
    /// A value-array reply did not match the caller's buffer length.
    #[error("{op} returned {got} values, expected {expected}")]
    ReplyLength {
        op: &'static str,
        expected: usize,
        got: usize,
    },
    /// A frame could not be encoded or decoded.
    #[error("{op} frame could not be coded: {source}")]
    Protocol {
        op: &'static str,
        #[source]
        source: CodecError,
    },
    /// The transport failed; detected locally, never sent by the server.
    #[error("server unreachable: {source}")]
    ServerUnreachable {
        #[from]
        source: ClientChannelError,
    },
}

/// One typed async method per protocol operation.
///
/// The proxy is strictly sequential: each method sends one call frame and
/// blocks on its reply, matching the single-outstanding-call wire contract.
pub struct CouplingProxy<C: ClientChannel> {
    channel: C,
}

impl<C: ClientChannel> CouplingProxy<C> {
    pub fn new(channel: C) -> Self {
        Self { channel }
    }

    /// Sends `call` and returns its successful reply.
    async fn round_trip(&mut self, op: &'static str, call: &Call) -> Result<Reply, ProxyError> {
        let frame = encode_call(call).map_err(|source| ProxyError::Protocol { op, source })?;
        self.channel.send(frame).await?;
        let reply_frame = self.channel.recv().await?;
        let (reply, _) =
            decode_reply(&reply_frame).map_err(|source| ProxyError::Protocol { op, source })?;
        match reply {
            Reply::Failure { code, message } => Err(ProxyError::Remote { op, code, message }),
            reply => Ok(reply),
        }
    }

    // ── Control and lifecycle ─────────────────────────────────────────────

    /// Liveness probe; answered by the server without touching the session.
    pub async fn ping(&mut self) -> Result<(), ProxyError> {
        let call = Call::Ping;
        let op = call.opcode().name();
        expect_ack(op, self.round_trip(op, &call).await?)
    }

    /// Collective: freezes registered geometry and starts the session.
    /// Returns once every rank has called it.
    pub async fn initialize(&mut self) -> Result<(), ProxyError> {
        let call = Call::Initialize;
        let op = call.opcode().name();
        expect_ack(op, self.round_trip(op, &call).await?)
    }

    /// Collective: exchanges initial data values after `initialize`.
    pub async fn initialize_data(&mut self) -> Result<(), ProxyError> {
        let call = Call::InitializeData;
        let op = call.opcode().name();
        expect_ack(op, self.round_trip(op, &call).await?)
    }

    /// Collective: completes one time window. The server advances by the
    /// minimum `dt` offered across all ranks.
    pub async fn advance(&mut self, dt: f64) -> Result<(), ProxyError> {
        let call = Call::Advance { dt };
        let op = call.opcode().name();
        expect_ack(op, self.round_trip(op, &call).await?)
    }

    /// Collective: ends the session. No further calls are valid after this
    /// returns.
    pub async fn finalize(&mut self) -> Result<(), ProxyError> {
        let call = Call::Finalize;
        let op = call.opcode().name();
        expect_ack(op, self.round_trip(op, &call).await?)
    }

    /// Reports a completed coupling action tag to the server.
    pub async fn fulfilled_action(&mut self, action: &str) -> Result<(), ProxyError> {
        let call = Call::FulfilledAction {
            action: action.to_string(),
        };
        let op = call.opcode().name();
        expect_ack(op, self.round_trip(op, &call).await?)
    }

    // ── Mesh construction and queries ─────────────────────────────────────

    /// Registers one vertex and returns its server-assigned id.
    pub async fn set_mesh_vertex(
        &mut self,
        mesh_id: i32,
        position: &[f64],
    ) -> Result<i32, ProxyError> {
        let call = Call::SetMeshVertex {
            mesh_id,
            position: position.to_vec(),
        };
        let op = call.opcode().name();
        expect_id(op, self.round_trip(op, &call).await?)
    }

    pub async fn get_mesh_vertex_size(&mut self, mesh_id: i32) -> Result<i32, ProxyError> {
        let call = Call::GetMeshVertexSize { mesh_id };
        let op = call.opcode().name();
        expect_size(op, self.round_trip(op, &call).await?)
    }

    /// Drops all geometry from the mesh; vertex ids restart from zero.
    pub async fn reset_mesh(&mut self, mesh_id: i32) -> Result<(), ProxyError> {
        let call = Call::ResetMesh { mesh_id };
        let op = call.opcode().name();
        expect_ack(op, self.round_trip(op, &call).await?)
    }

    /// Registers `n` vertices from a flat `n × dimensions` position array
    /// and returns their ids in input order.
    pub async fn set_mesh_vertices(
        &mut self,
        mesh_id: i32,
        positions: &[f64],
    ) -> Result<Vec<i32>, ProxyError> {
        let call = Call::SetMeshVertices {
            mesh_id,
            positions: positions.to_vec(),
        };
        let op = call.opcode().name();
        expect_ids(op, self.round_trip(op, &call).await?)
    }

    /// Fetches vertex positions into `positions`, which must hold exactly
    /// `ids.len() × dimensions` values.
    pub async fn get_mesh_vertices(
        &mut self,
        mesh_id: i32,
        ids: &[i32],
        positions: &mut [f64],
    ) -> Result<(), ProxyError> {
        let call = Call::GetMeshVertices {
            mesh_id,
            ids: ids.to_vec(),
        };
        let op = call.opcode().name();
        fill_values(op, self.round_trip(op, &call).await?, positions)
    }

    /// Looks up vertex ids by exact position match.
    pub async fn get_mesh_vertex_ids_from_positions(
        &mut self,
        mesh_id: i32,
        positions: &[f64],
    ) -> Result<Vec<i32>, ProxyError> {
        let call = Call::GetMeshVertexIdsFromPositions {
            mesh_id,
            positions: positions.to_vec(),
        };
        let op = call.opcode().name();
        expect_ids(op, self.round_trip(op, &call).await?)
    }

    /// Registers (or reuses) the undirected edge between two vertices and
    /// returns its id.
    pub async fn set_mesh_edge(
        &mut self,
        mesh_id: i32,
        first_vertex: i32,
        second_vertex: i32,
    ) -> Result<i32, ProxyError> {
        let call = Call::SetMeshEdge {
            mesh_id,
            first_vertex,
            second_vertex,
        };
        let op = call.opcode().name();
        expect_id(op, self.round_trip(op, &call).await?)
    }

    pub async fn set_mesh_triangle(
        &mut self,
        mesh_id: i32,
        first_edge: i32,
        second_edge: i32,
        third_edge: i32,
    ) -> Result<(), ProxyError> {
        let call = Call::SetMeshTriangle {
            mesh_id,
            first_edge,
            second_edge,
            third_edge,
        };
        let op = call.opcode().name();
        expect_ack(op, self.round_trip(op, &call).await?)
    }

    pub async fn set_mesh_triangle_with_edges(
        &mut self,
        mesh_id: i32,
        first_vertex: i32,
        second_vertex: i32,
        third_vertex: i32,
    ) -> Result<(), ProxyError> {
        let call = Call::SetMeshTriangleWithEdges {
            mesh_id,
            first_vertex,
            second_vertex,
            third_vertex,
        };
        let op = call.opcode().name();
        expect_ack(op, self.round_trip(op, &call).await?)
    }

    pub async fn set_mesh_quad(
        &mut self,
        mesh_id: i32,
        first_edge: i32,
        second_edge: i32,
        third_edge: i32,
        fourth_edge: i32,
    ) -> Result<(), ProxyError> {
        let call = Call::SetMeshQuad {
            mesh_id,
            first_edge,
            second_edge,
            third_edge,
            fourth_edge,
        };
        let op = call.opcode().name();
        expect_ack(op, self.round_trip(op, &call).await?)
    }

    pub async fn set_mesh_quad_with_edges(
        &mut self,
        mesh_id: i32,
        first_vertex: i32,
        second_vertex: i32,
        third_vertex: i32,
        fourth_vertex: i32,
    ) -> Result<(), ProxyError> {
        let call = Call::SetMeshQuadWithEdges {
            mesh_id,
            first_vertex,
            second_vertex,
            third_vertex,
            fourth_vertex,
        };
        let op = call.opcode().name();
        expect_ack(op, self.round_trip(op, &call).await?)
    }

    // ── Field data access ─────────────────────────────────────────────────

    pub async fn write_scalar_data(
        &mut self,
        data_id: i32,
        index: i32,
        value: f64,
    ) -> Result<(), ProxyError> {
        let call = Call::WriteScalarData {
            data_id,
            index,
            value,
        };
        let op = call.opcode().name();
        expect_ack(op, self.round_trip(op, &call).await?)
    }

    pub async fn read_scalar_data(&mut self, data_id: i32, index: i32) -> Result<f64, ProxyError> {
        let call = Call::ReadScalarData { data_id, index };
        let op = call.opcode().name();
        expect_scalar(op, self.round_trip(op, &call).await?)
    }

    pub async fn write_block_scalar_data(
        &mut self,
        data_id: i32,
        indices: &[i32],
        values: &[f64],
    ) -> Result<(), ProxyError> {
        let call = Call::WriteBlockScalarData {
            data_id,
            indices: indices.to_vec(),
            values: values.to_vec(),
        };
        let op = call.opcode().name();
        expect_ack(op, self.round_trip(op, &call).await?)
    }

    /// Reads one value per index into `values`, which must hold exactly
    /// `indices.len()` entries.
    pub async fn read_block_scalar_data(
        &mut self,
        data_id: i32,
        indices: &[i32],
        values: &mut [f64],
    ) -> Result<(), ProxyError> {
        let call = Call::ReadBlockScalarData {
            data_id,
            indices: indices.to_vec(),
        };
        let op = call.opcode().name();
        fill_values(op, self.round_trip(op, &call).await?, values)
    }

    pub async fn write_vector_data(
        &mut self,
        data_id: i32,
        index: i32,
        value: &[f64],
    ) -> Result<(), ProxyError> {
        let call = Call::WriteVectorData {
            data_id,
            index,
            value: value.to_vec(),
        };
        let op = call.opcode().name();
        expect_ack(op, self.round_trip(op, &call).await?)
    }

    /// Reads one vector entry into `value`, which must hold exactly
    /// `components` values.
    pub async fn read_vector_data(
        &mut self,
        data_id: i32,
        index: i32,
        value: &mut [f64],
    ) -> Result<(), ProxyError> {
        let call = Call::ReadVectorData { data_id, index };
        let op = call.opcode().name();
        fill_values(op, self.round_trip(op, &call).await?, value)
    }

    pub async fn write_block_vector_data(
        &mut self,
        data_id: i32,
        indices: &[i32],
        values: &[f64],
    ) -> Result<(), ProxyError> {
        let call = Call::WriteBlockVectorData {
            data_id,
            indices: indices.to_vec(),
            values: values.to_vec(),
        };
        let op = call.opcode().name();
        expect_ack(op, self.round_trip(op, &call).await?)
    }

    /// Reads whole vector entries into `values`, which must hold exactly
    /// `indices.len() × components` values.
    pub async fn read_block_vector_data(
        &mut self,
        data_id: i32,
        indices: &[i32],
        values: &mut [f64],
    ) -> Result<(), ProxyError> {
        let call = Call::ReadBlockVectorData {
            data_id,
            indices: indices.to_vec(),
        };
        let op = call.opcode().name();
        fill_values(op, self.round_trip(op, &call).await?, values)
    }

    // ── Data mapping ──────────────────────────────────────────────────────

    /// Collective: pushes written field values from this mesh onto its
    /// same-named counterpart fields.
    pub async fn map_write_data_from(&mut self, mesh_id: i32) -> Result<(), ProxyError> {
        let call = Call::MapWriteDataFrom { mesh_id };
        let op = call.opcode().name();
        expect_ack(op, self.round_trip(op, &call).await?)
    }

    /// Collective: pulls counterpart field values onto this mesh.
    pub async fn map_read_data_to(&mut self, mesh_id: i32) -> Result<(), ProxyError> {
        let call = Call::MapReadDataTo { mesh_id };
        let op = call.opcode().name();
        expect_ack(op, self.round_trip(op, &call).await?)
    }
}

// ── Reply shape checks ────────────────────────────────────────────────────────

fn unexpected(op: &'static str, expected: ReplyTag, got: Reply) -> ProxyError {
    ProxyError::UnexpectedReply {
        op,
        expected,
        got: got.tag(),
    }
}

fn expect_ack(op: &'static str, reply: Reply) -> Result<(), ProxyError> {
    match reply {
        Reply::Ack => Ok(()),
        other => Err(unexpected(op, ReplyTag::Ack, other)),
    }
}

fn expect_id(op: &'static str, reply: Reply) -> Result<i32, ProxyError> {
    match reply {
        Reply::Id(id) => Ok(id),
        other => Err(unexpected(op, ReplyTag::Id, other)),
    }
}

fn expect_size(op: &'static str, reply: Reply) -> Result<i32, ProxyError> {
    match reply {
        Reply::Size(size) => Ok(size),
        other => Err(unexpected(op, ReplyTag::Size, other)),
    }
}

fn expect_ids(op: &'static str, reply: Reply) -> Result<Vec<i32>, ProxyError> {
    match reply {
        Reply::Ids(ids) => Ok(ids),
        other => Err(unexpected(op, ReplyTag::Ids, other)),
    }
}

fn expect_scalar(op: &'static str, reply: Reply) -> Result<f64, ProxyError> {
    match reply {
        Reply::Scalar(value) => Ok(value),
        other => Err(unexpected(op, ReplyTag::Scalar, other)),
    }
}

fn fill_values(op: &'static str, reply: Reply, out: &mut [f64]) -> Result<(), ProxyError> {
    match reply {
        Reply::Values(values) => {
            if values.len() != out.len() {
                return Err(ProxyError::ReplyLength {
                    op,
                    expected: out.len(),
                    got: values.len(),
                });
            }
            out.copy_from_slice(&values);
            Ok(())
        }
        other => Err(unexpected(op, ReplyTag::Values, other)),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use tandem_core::{decode_call, encode_reply};

    /// Answers each call with the next scripted reply and keeps what was
    /// sent for inspection.
    struct ScriptedChannel {
        sent: Vec<Vec<u8>>,
        replies: VecDeque<Reply>,
    }

    impl ScriptedChannel {
        fn new(replies: Vec<Reply>) -> Self {
            Self {
                sent: Vec::new(),
                replies: replies.into(),
            }
        }
    }

    #[async_trait]
    impl ClientChannel for ScriptedChannel {
        async fn send(&mut self, frame: Vec<u8>) -> Result<(), ClientChannelError> {
            self.sent.push(frame);
            Ok(())
        }

        async fn recv(&mut self) -> Result<Vec<u8>, ClientChannelError> {
            let reply = self.replies.pop_front().ok_or(ClientChannelError::Closed)?;
            Ok(encode_reply(&reply).unwrap())
        }
    }

    fn proxy(replies: Vec<Reply>) -> CouplingProxy<ScriptedChannel> {
        CouplingProxy::new(ScriptedChannel::new(replies))
    }

    #[tokio::test]
    async fn test_set_mesh_vertex_sends_the_call_and_returns_the_id() {
        let mut proxy = proxy(vec![Reply::Id(4)]);

        let id = proxy.set_mesh_vertex(1, &[0.5, 1.5, 2.5]).await.unwrap();

        assert_eq!(id, 4);
        let (call, _) = decode_call(&proxy.channel.sent[0]).unwrap();
        assert_eq!(
            call,
            Call::SetMeshVertex {
                mesh_id: 1,
                position: vec![0.5, 1.5, 2.5],
            }
        );
    }

    #[tokio::test]
    async fn test_remote_failure_surfaces_code_and_message() {
        let mut proxy = proxy(vec![Reply::failure(
            FailureCode::UnknownHandle,
            "unknown data handle 9",
        )]);

        let err = proxy.write_scalar_data(9, 0, 1.0).await.unwrap_err();

        match err {
            ProxyError::Remote { op, code, message } => {
                assert_eq!(op, "writeScalarData");
                assert_eq!(code, FailureCode::UnknownHandle);
                assert!(message.contains('9'));
            }
            other => panic!("expected a remote failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_wrong_reply_shape_is_rejected() {
        let mut proxy = proxy(vec![Reply::Scalar(1.0)]);

        let err = proxy.ping().await.unwrap_err();

        assert!(matches!(
            err,
            ProxyError::UnexpectedReply {
                op: "ping",
                expected: ReplyTag::Ack,
                got: ReplyTag::Scalar,
            }
        ));
    }

    #[tokio::test]
    async fn test_block_read_checks_the_reply_length() {
        let mut proxy = proxy(vec![Reply::Values(vec![1.0, 2.0])]);
        let mut out = [0.0; 3];

        let err = proxy
            .read_block_scalar_data(1, &[0, 1, 2], &mut out)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ProxyError::ReplyLength {
                expected: 3,
                got: 2,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_block_read_fills_the_buffer() {
        let mut proxy = proxy(vec![Reply::Values(vec![10.0, 20.0])]);
        let mut out = [0.0; 2];

        proxy
            .read_block_scalar_data(1, &[0, 1], &mut out)
            .await
            .unwrap();

        assert_eq!(out, [10.0, 20.0]);
    }

    #[tokio::test]
    async fn test_closed_channel_is_server_unreachable() {
        let mut proxy = proxy(Vec::new());

        let err = proxy.initialize().await.unwrap_err();

        assert!(matches!(
            err,
            ProxyError::ServerUnreachable {
                source: ClientChannelError::Closed,
            }
        ));
    }

    #[tokio::test]
    async fn test_advance_round_trips_the_offered_time_step() {
        let mut proxy = proxy(vec![Reply::Ack]);

        proxy.advance(0.125).await.unwrap();

        let (call, _) = decode_call(&proxy.channel.sent[0]).unwrap();
        assert_eq!(call, Call::Advance { dt: 0.125 });
    }
}
