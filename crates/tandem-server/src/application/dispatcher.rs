//! Frame dispatch: decode, classify, execute, reply.
//!
//! The [`Dispatcher`] is the single place that decides what happens to an
//! inbound frame. Per-rank calls run against the façade immediately and
//! produce one reply for the sender. Collective calls are parked in the
//! [`CollectiveTracker`] until every rank has joined, then execute exactly
//! once and produce one reply per participant.
//!
//! The dispatcher is transport-free: it consumes raw frame bytes and returns
//! `(rank, reply)` pairs for the session loop to deliver. That keeps every
//! protocol rule testable without a socket.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use tandem_core::{decode_call, Call, FailureCode, Opcode, RankId, Reply};
use tracing::{debug, info, warn};

use crate::application::collective::{CollectiveTracker, JoinOutcome};
use crate::application::facade::CouplingFacade;

/// Protocol brain of the server: one per coupling session.
pub struct Dispatcher<F: CouplingFacade> {
    facade: F,
    tracker: CollectiveTracker,
    lost_ranks: HashSet<RankId>,
    finalized: bool,
}

impl<F: CouplingFacade> Dispatcher<F> {
    pub fn new(facade: F, rank_count: usize, collective_timeout: Duration) -> Self {
        Self {
            facade,
            tracker: CollectiveTracker::new(rank_count, collective_timeout),
            lost_ranks: HashSet::new(),
            finalized: false,
        }
    }

    /// True once a finalize round has completed; the session loop exits then.
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// The instant at which the oldest pending collective round times out.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.tracker.deadline()
    }

    /// Read access to the façade, for inspection after a session ends.
    pub fn facade(&self) -> &F {
        &self.facade
    }

    /// Handles one raw frame from `sender` and returns the replies to send.
    pub fn handle_frame(&mut self, sender: RankId, frame: &[u8]) -> Vec<(RankId, Reply)> {
        if self.finalized {
            return vec![(
                sender,
                Reply::failure(FailureCode::MalformedCall, "session already finalized"),
            )];
        }

        let call = match decode_call(frame) {
            Ok((call, _)) => call,
            Err(err) => {
                warn!(rank = sender, error = %err, "dropping undecodable frame");
                return vec![(
                    sender,
                    Reply::failure(
                        FailureCode::MalformedCall,
                        format!("undecodable call frame: {err}"),
                    ),
                )];
            }
        };

        let op = call.opcode();
        debug!(rank = sender, op = op.name(), "dispatching call");

        if op == Opcode::Ping {
            return vec![(sender, Reply::Ack)];
        }

        if op.is_collective() {
            // A departed rank can never join again, so no new round can
            // complete; fail fast instead of parking the caller forever.
            if let Some(lost) = self.lost_ranks.iter().copied().min() {
                return vec![(
                    sender,
                    Reply::failure(
                        FailureCode::CollectiveAborted,
                        format!(
                            "collective {} aborted: rank {lost} left the session",
                            op.name()
                        ),
                    ),
                )];
            }
            return match self.tracker.join(sender, call, Instant::now()) {
                Ok(JoinOutcome::Waiting) => Vec::new(),
                Ok(JoinOutcome::Complete(round)) => self.execute_collective(round),
                Err(err) => {
                    warn!(rank = sender, error = %err, "collective join rejected");
                    vec![(
                        sender,
                        Reply::failure(FailureCode::MalformedCall, err.to_string()),
                    )]
                }
            };
        }

        self.execute_per_rank(sender, call)
    }

    /// Marks `rank` as gone and aborts every round it can no longer join.
    pub fn handle_disconnect(&mut self, rank: RankId) -> Vec<(RankId, Reply)> {
        if self.finalized {
            return Vec::new();
        }
        self.lost_ranks.insert(rank);
        warn!(rank, "rank disconnected mid-session");

        let mut replies = Vec::new();
        for (op, waiters) in self.tracker.abort_all() {
            let reply = Reply::failure(
                FailureCode::CollectiveAborted,
                format!("rank {rank} disconnected during collective {}", op.name()),
            );
            for waiter in waiters {
                if !self.lost_ranks.contains(&waiter) {
                    replies.push((waiter, reply.clone()));
                }
            }
        }
        replies
    }

    /// Fails every round whose bounded wait has elapsed at `now`.
    pub fn expire_rounds(&mut self, now: Instant) -> Vec<(RankId, Reply)> {
        let mut replies = Vec::new();
        for (op, waiters) in self.tracker.expire(now) {
            warn!(
                op = op.name(),
                waiting = waiters.len(),
                "collective round timed out"
            );
            let reply = Reply::failure(
                FailureCode::Timeout,
                format!("collective {} timed out waiting for all ranks", op.name()),
            );
            for waiter in waiters {
                replies.push((waiter, reply.clone()));
            }
        }
        replies
    }

    /// Runs a completed round against the façade, once, and fans out the
    /// outcome to every participant.
    fn execute_collective(&mut self, round: Vec<(RankId, Call)>) -> Vec<(RankId, Reply)> {
        let op = match round.first() {
            Some((_, call)) => call.opcode(),
            None => return Vec::new(),
        };
        let participants: Vec<RankId> = round.iter().map(|(rank, _)| *rank).collect();

        let result = match op {
            Opcode::Initialize => self.facade.initialize(),
            Opcode::InitializeData => self.facade.initialize_data(),
            Opcode::Finalize => self.facade.finalize(),
            Opcode::Advance => {
                let mut dt = f64::INFINITY;
                for (_, call) in &round {
                    if let Call::Advance { dt: offered } = call {
                        // min() would discard a NaN; it must poison the round.
                        if offered.is_nan() {
                            dt = *offered;
                            break;
                        }
                        dt = dt.min(*offered);
                    }
                }
                self.facade.advance(dt)
            }
            Opcode::MapWriteDataFrom | Opcode::MapReadDataTo => {
                let mesh_ids: Vec<i32> = round
                    .iter()
                    .filter_map(|(_, call)| match call {
                        Call::MapWriteDataFrom { mesh_id } | Call::MapReadDataTo { mesh_id } => {
                            Some(*mesh_id)
                        }
                        _ => None,
                    })
                    .collect();
                match mesh_ids.split_first() {
                    Some((&mesh, rest)) if rest.iter().all(|&other| other == mesh) => {
                        if op == Opcode::MapWriteDataFrom {
                            self.facade.map_write_data_from(mesh)
                        } else {
                            self.facade.map_read_data_to(mesh)
                        }
                    }
                    _ => {
                        warn!(op = op.name(), "ranks disagree on the mapping mesh");
                        return self.abort_round(op, &participants, "ranks disagree on the mesh id");
                    }
                }
            }
            // handle_frame only assembles rounds for collective opcodes.
            other => {
                return self.abort_round(op, &participants, &format!(
                    "{} is not a collective operation",
                    other.name()
                ));
            }
        };

        match result {
            Ok(()) => {
                if op == Opcode::Finalize {
                    self.finalized = true;
                    info!("finalize round complete; session closing");
                }
                participants
                    .into_iter()
                    .map(|rank| (rank, Reply::Ack))
                    .collect()
            }
            Err(err) => {
                warn!(op = op.name(), error = %err, "collective execution failed");
                self.abort_round(op, &participants, &err.to_string())
            }
        }
    }

    fn abort_round(
        &self,
        op: Opcode,
        participants: &[RankId],
        reason: &str,
    ) -> Vec<(RankId, Reply)> {
        let reply = Reply::failure(
            FailureCode::CollectiveAborted,
            format!("collective {} aborted: {reason}", op.name()),
        );
        participants
            .iter()
            .map(|&rank| (rank, reply.clone()))
            .collect()
    }

    /// Executes a per-rank call immediately; the sender gets the only reply.
    fn execute_per_rank(&mut self, sender: RankId, call: Call) -> Vec<(RankId, Reply)> {
        let op = call.opcode();
        let result = match call {
            Call::FulfilledAction { action } => {
                self.facade.fulfilled_action(&action).map(|()| Reply::Ack)
            }
            Call::SetMeshVertex { mesh_id, position } => self
                .facade
                .set_mesh_vertex(mesh_id, &position)
                .map(Reply::Id),
            Call::GetMeshVertexSize { mesh_id } => {
                self.facade.get_mesh_vertex_size(mesh_id).map(Reply::Size)
            }
            Call::ResetMesh { mesh_id } => self.facade.reset_mesh(mesh_id).map(|()| Reply::Ack),
            Call::SetMeshVertices { mesh_id, positions } => self
                .facade
                .set_mesh_vertices(mesh_id, &positions)
                .map(Reply::Ids),
            Call::GetMeshVertices { mesh_id, ids } => self
                .facade
                .get_mesh_vertices(mesh_id, &ids)
                .map(Reply::Values),
            Call::GetMeshVertexIdsFromPositions { mesh_id, positions } => self
                .facade
                .get_mesh_vertex_ids_from_positions(mesh_id, &positions)
                .map(Reply::Ids),
            Call::SetMeshEdge {
                mesh_id,
                first_vertex,
                second_vertex,
            } => self
                .facade
                .set_mesh_edge(mesh_id, first_vertex, second_vertex)
                .map(Reply::Id),
            Call::SetMeshTriangle {
                mesh_id,
                first_edge,
                second_edge,
                third_edge,
            } => self
                .facade
                .set_mesh_triangle(mesh_id, first_edge, second_edge, third_edge)
                .map(|()| Reply::Ack),
            Call::SetMeshTriangleWithEdges {
                mesh_id,
                first_vertex,
                second_vertex,
                third_vertex,
            } => self
                .facade
                .set_mesh_triangle_with_edges(mesh_id, first_vertex, second_vertex, third_vertex)
                .map(|()| Reply::Ack),
            Call::SetMeshQuad {
                mesh_id,
                first_edge,
                second_edge,
                third_edge,
                fourth_edge,
            } => self
                .facade
                .set_mesh_quad(mesh_id, first_edge, second_edge, third_edge, fourth_edge)
                .map(|()| Reply::Ack),
            Call::SetMeshQuadWithEdges {
                mesh_id,
                first_vertex,
                second_vertex,
                third_vertex,
                fourth_vertex,
            } => self
                .facade
                .set_mesh_quad_with_edges(
                    mesh_id,
                    first_vertex,
                    second_vertex,
                    third_vertex,
                    fourth_vertex,
                )
                .map(|()| Reply::Ack),
            Call::WriteScalarData {
                data_id,
                index,
                value,
            } => self
                .facade
                .write_scalar_data(data_id, index, value)
                .map(|()| Reply::Ack),
            Call::ReadScalarData { data_id, index } => self
                .facade
                .read_scalar_data(data_id, index)
                .map(Reply::Scalar),
            Call::WriteBlockScalarData {
                data_id,
                indices,
                values,
            } => self
                .facade
                .write_block_scalar_data(data_id, &indices, &values)
                .map(|()| Reply::Ack),
            Call::ReadBlockScalarData { data_id, indices } => self
                .facade
                .read_block_scalar_data(data_id, &indices)
                .map(Reply::Values),
            Call::WriteVectorData {
                data_id,
                index,
                value,
            } => self
                .facade
                .write_vector_data(data_id, index, &value)
                .map(|()| Reply::Ack),
            Call::ReadVectorData { data_id, index } => self
                .facade
                .read_vector_data(data_id, index)
                .map(Reply::Values),
            Call::WriteBlockVectorData {
                data_id,
                indices,
                values,
            } => self
                .facade
                .write_block_vector_data(data_id, &indices, &values)
                .map(|()| Reply::Ack),
            Call::ReadBlockVectorData { data_id, indices } => self
                .facade
                .read_block_vector_data(data_id, &indices)
                .map(Reply::Values),
            Call::Ping
            | Call::Initialize
            | Call::InitializeData
            | Call::Advance { .. }
            | Call::Finalize
            | Call::MapWriteDataFrom { .. }
            | Call::MapReadDataTo { .. } => {
                // handle_frame answers ping itself and routes collective
                // calls to the tracker before reaching here.
                return vec![(
                    sender,
                    Reply::failure(
                        FailureCode::MalformedCall,
                        format!("{} cannot be executed per rank", op.name()),
                    ),
                )];
            }
        };

        match result {
            Ok(reply) => vec![(sender, reply)],
            Err(err) => {
                warn!(rank = sender, op = op.name(), error = %err, "call failed");
                vec![(sender, Reply::failure(err.failure_code(), err.to_string()))]
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
