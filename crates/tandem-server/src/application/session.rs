//! The session loop: one coupling run from handshake to finalize.
//!
//! [`Session`] owns a [`ServerChannel`] (the transport seam) and a
//! [`Dispatcher`] (the protocol brain) and shuttles events between them.
//! The loop also arms the collective timeout: whenever a round is pending,
//! the wait for the next inbound event is bounded by the round's deadline.

use std::time::Instant;

use async_trait::async_trait;
use tandem_core::{encode_reply, RankId, Reply};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::application::dispatcher::Dispatcher;
use crate::application::facade::CouplingFacade;

/// One inbound transport event.
#[derive(Debug)]
pub enum Inbound {
    /// A complete frame arrived from `rank`.
    Frame { rank: RankId, bytes: Vec<u8> },
    /// `rank`'s connection closed (clean or not).
    Closed { rank: RankId },
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("rank {rank} has no open connection")]
    UnknownRank { rank: RankId },
    #[error("writing to rank {rank} failed")]
    Io {
        rank: RankId,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("all client connections closed before finalize")]
    ConnectionLost,
}

/// Transport seam between the session loop and the network layer.
///
/// The production implementation multiplexes one TCP connection per rank;
/// tests drive the loop with a scripted fake instead.
#[async_trait]
pub trait ServerChannel: Send {
    /// Number of ranks admitted at handshake.
    fn rank_count(&self) -> usize;

    /// Next inbound event; `None` once every connection has closed.
    ///
    /// Must be cancel-safe: the session loop may drop the future when a
    /// collective deadline fires.
    async fn recv(&mut self) -> Option<Inbound>;

    /// Delivers one encoded reply frame to `rank`.
    async fn send(&mut self, rank: RankId, frame: Vec<u8>) -> Result<(), ChannelError>;
}

/// Runs one coupling session to completion.
pub struct Session<C, F>
where
    C: ServerChannel,
    F: CouplingFacade,
{
    channel: C,
    dispatcher: Dispatcher<F>,
    open_ranks: usize,
}

impl<C, F> Session<C, F>
where
    C: ServerChannel,
    F: CouplingFacade,
{
    pub fn new(channel: C, dispatcher: Dispatcher<F>) -> Self {
        let open_ranks = channel.rank_count();
        Self {
            channel,
            dispatcher,
            open_ranks,
        }
    }

    /// Serves frames until the finalize round completes.
    ///
    /// Returns the dispatcher so callers can inspect the final coupling
    /// state. Exits with [`ServerError::ConnectionLost`] if every rank
    /// disconnects first.
    pub async fn run(mut self) -> Result<Dispatcher<F>, ServerError> {
        info!(ranks = self.open_ranks, "session loop started");
        loop {
            let event = match self.dispatcher.next_deadline() {
                Some(deadline) => {
                    let deadline = tokio::time::Instant::from_std(deadline);
                    match tokio::time::timeout_at(deadline, self.channel.recv()).await {
                        Ok(event) => event,
                        Err(_) => {
                            let replies = self.dispatcher.expire_rounds(Instant::now());
                            self.deliver(replies).await;
                            continue;
                        }
                    }
                }
                None => self.channel.recv().await,
            };

            match event {
                Some(Inbound::Frame { rank, bytes }) => {
                    let replies = self.dispatcher.handle_frame(rank, &bytes);
                    self.deliver(replies).await;
                    if self.dispatcher.is_finalized() {
                        info!("coupling finalized; session loop closing");
                        return Ok(self.dispatcher);
                    }
                }
                Some(Inbound::Closed { rank }) => {
                    self.open_ranks = self.open_ranks.saturating_sub(1);
                    let replies = self.dispatcher.handle_disconnect(rank);
                    self.deliver(replies).await;
                    if self.open_ranks == 0 {
                        return self.finish();
                    }
                }
                None => return self.finish(),
            }
        }
    }

    fn finish(self) -> Result<Dispatcher<F>, ServerError> {
        if self.dispatcher.is_finalized() {
            Ok(self.dispatcher)
        } else {
            Err(ServerError::ConnectionLost)
        }
    }

    /// Encodes and sends each reply; delivery failures are logged, not
    /// fatal, since the writer's rank will surface as `Closed` shortly.
    async fn deliver(&mut self, replies: Vec<(RankId, Reply)>) {
        for (rank, reply) in replies {
            let frame = match encode_reply(&reply) {
                Ok(frame) => frame,
                Err(err) => {
                    error!(rank, error = %err, "reply could not be encoded");
                    continue;
                }
            };
            if let Err(err) = self.channel.send(rank, frame).await {
                warn!(rank, error = %err, "reply could not be delivered");
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::coupling::SolverCoupling;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tandem_core::{decode_reply, encode_call, Call, FailureCode};

    enum Step {
        Frame(RankId, Vec<u8>),
        Close(RankId),
        Wait(Duration),
    }

    /// Shared view of what the session sent, decoded for easy asserts.
    #[derive(Clone, Default)]
    struct SentLog(Arc<Mutex<Vec<(RankId, Reply)>>>);

    impl SentLog {
        fn replies(&self) -> Vec<(RankId, Reply)> {
            self.0.lock().unwrap().clone()
        }
    }

    /// Feeds a pre-scripted event sequence into the session loop.
    struct ScriptedChannel {
        rank_count: usize,
        script: VecDeque<Step>,
        sent: SentLog,
    }

    impl ScriptedChannel {
        fn new(rank_count: usize, script: Vec<Step>) -> (Self, SentLog) {
            let sent = SentLog::default();
            (
                Self {
                    rank_count,
                    script: script.into(),
                    sent: sent.clone(),
                },
                sent,
            )
        }
    }

    #[async_trait]
    impl ServerChannel for ScriptedChannel {
        fn rank_count(&self) -> usize {
            self.rank_count
        }

        async fn recv(&mut self) -> Option<Inbound> {
            loop {
                match self.script.pop_front()? {
                    Step::Wait(pause) => tokio::time::sleep(pause).await,
                    Step::Frame(rank, bytes) => return Some(Inbound::Frame { rank, bytes }),
                    Step::Close(rank) => return Some(Inbound::Closed { rank }),
                }
            }
        }

        async fn send(&mut self, rank: RankId, frame: Vec<u8>) -> Result<(), ChannelError> {
            let (reply, _) = decode_reply(&frame).unwrap();
            self.sent.0.lock().unwrap().push((rank, reply));
            Ok(())
        }
    }

    fn frame(rank: RankId, call: &Call) -> Step {
        Step::Frame(rank, encode_call(call).unwrap())
    }

    fn session(
        rank_count: usize,
        timeout: Duration,
        script: Vec<Step>,
    ) -> (Session<ScriptedChannel, SolverCoupling>, SentLog) {
        let (channel, sent) = ScriptedChannel::new(rank_count, script);
        let dispatcher = Dispatcher::new(SolverCoupling::new(3), rank_count, timeout);
        (Session::new(channel, dispatcher), sent)
    }

    #[tokio::test]
    async fn test_single_rank_lifecycle_runs_to_finalize() {
        let script = vec![
            frame(0, &Call::Ping),
            frame(0, &Call::Initialize),
            frame(0, &Call::Advance { dt: 0.5 }),
            frame(0, &Call::Finalize),
        ];
        let (session, sent) = session(1, Duration::from_secs(5), script);

        let dispatcher = session.run().await.unwrap();

        assert_eq!(dispatcher.facade().coupled_time(), 0.5);
        let replies = sent.replies();
        assert_eq!(replies.len(), 4);
        assert!(replies.iter().all(|(rank, reply)| *rank == 0 && *reply == Reply::Ack));
    }

    #[tokio::test]
    async fn test_two_ranks_complete_collectives_together() {
        let script = vec![
            frame(0, &Call::Initialize),
            frame(1, &Call::Initialize),
            frame(0, &Call::Finalize),
            frame(1, &Call::Finalize),
        ];
        let (session, sent) = session(2, Duration::from_secs(5), script);

        session.run().await.unwrap();

        let replies = sent.replies();
        assert_eq!(replies.len(), 4);
        // Both ranks are answered when each round completes.
        let mut ranks: Vec<RankId> = replies.iter().map(|(rank, _)| *rank).collect();
        ranks.sort_unstable();
        assert_eq!(ranks, vec![0, 0, 1, 1]);
    }

    #[tokio::test]
    async fn test_all_connections_lost_before_finalize_is_an_error() {
        let script = vec![frame(0, &Call::Ping), Step::Close(0)];
        let (session, sent) = session(1, Duration::from_secs(5), script);

        let result = session.run().await;

        assert!(matches!(result, Err(ServerError::ConnectionLost)));
        assert_eq!(sent.replies(), vec![(0, Reply::Ack)]);
    }

    #[tokio::test]
    async fn test_disconnect_aborts_the_pending_round() {
        let script = vec![
            frame(0, &Call::Initialize),
            Step::Close(1),
            Step::Close(0),
        ];
        let (session, sent) = session(2, Duration::from_secs(5), script);

        let result = session.run().await;

        assert!(matches!(result, Err(ServerError::ConnectionLost)));
        let replies = sent.replies();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].0, 0);
        assert!(matches!(
            replies[0].1,
            Reply::Failure {
                code: FailureCode::CollectiveAborted,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_stalled_round_times_out_through_the_loop() {
        let script = vec![
            frame(0, &Call::Initialize),
            Step::Wait(Duration::from_millis(500)),
            Step::Close(0),
            Step::Close(1),
        ];
        let (session, sent) = session(2, Duration::from_millis(50), script);

        let result = session.run().await;

        assert!(matches!(result, Err(ServerError::ConnectionLost)));
        let replies = sent.replies();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].0, 0);
        assert!(matches!(
            replies[0].1,
            Reply::Failure {
                code: FailureCode::Timeout,
                ..
            }
        ));
    }
}
