//! Tracking of collective calls across ranks.
//!
//! A collective operation only runs once every connected rank has asked for
//! it. [`CollectiveTracker`] holds the partially assembled rounds: each
//! `join` either parks the caller or, when the last rank arrives, hands the
//! full round back for execution. Rounds carry their opening instant so the
//! session loop can expire ones that never complete.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tandem_core::{Call, Opcode, RankId};
use thiserror::Error;

/// Result of a rank joining a collective round.
#[derive(Debug, PartialEq)]
pub enum JoinOutcome {
    /// The round is still missing ranks; the caller gets no reply yet.
    Waiting,
    /// Every rank has joined; the calls are returned in arrival order.
    Complete(Vec<(RankId, Call)>),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JoinError {
    #[error("rank {0} is outside the connected rank range")]
    UnknownRank(RankId),
    #[error("rank {rank} joined {op:?} twice in the same round")]
    DuplicateJoin { rank: RankId, op: Opcode },
}

#[derive(Debug)]
struct PendingRound {
    calls: Vec<(RankId, Call)>,
    opened_at: Instant,
}

/// One pending round per collective opcode.
#[derive(Debug)]
pub struct CollectiveTracker {
    rank_count: usize,
    timeout: Duration,
    rounds: HashMap<Opcode, PendingRound>,
}

impl CollectiveTracker {
    pub fn new(rank_count: usize, timeout: Duration) -> Self {
        Self {
            rank_count,
            timeout,
            rounds: HashMap::new(),
        }
    }

    /// Adds `rank`'s call to the round for its opcode.
    ///
    /// A failed join leaves the round exactly as it was.
    pub fn join(&mut self, rank: RankId, call: Call, now: Instant) -> Result<JoinOutcome, JoinError> {
        if rank < 0 || rank as usize >= self.rank_count {
            return Err(JoinError::UnknownRank(rank));
        }
        let op = call.opcode();
        let round = self.rounds.entry(op).or_insert_with(|| PendingRound {
            calls: Vec::with_capacity(self.rank_count),
            opened_at: now,
        });
        if round.calls.iter().any(|(joined, _)| *joined == rank) {
            return Err(JoinError::DuplicateJoin { rank, op });
        }
        round.calls.push((rank, call));
        if round.calls.len() == self.rank_count {
            let round = self.rounds.remove(&op).map(|r| r.calls).unwrap_or_default();
            return Ok(JoinOutcome::Complete(round));
        }
        Ok(JoinOutcome::Waiting)
    }

    /// The earliest instant at which a pending round exceeds its timeout.
    pub fn deadline(&self) -> Option<Instant> {
        self.rounds
            .values()
            .map(|round| round.opened_at + self.timeout)
            .min()
    }

    /// Removes every round older than the timeout and reports its waiters.
    pub fn expire(&mut self, now: Instant) -> Vec<(Opcode, Vec<RankId>)> {
        let timeout = self.timeout;
        let expired: Vec<Opcode> = self
            .rounds
            .iter()
            .filter(|(_, round)| now.duration_since(round.opened_at) >= timeout)
            .map(|(&op, _)| op)
            .collect();
        expired
            .into_iter()
            .filter_map(|op| {
                self.rounds
                    .remove(&op)
                    .map(|round| (op, round.calls.into_iter().map(|(rank, _)| rank).collect()))
            })
            .collect()
    }

    /// Drains every pending round, complete or not.
    pub fn abort_all(&mut self) -> Vec<(Opcode, Vec<RankId>)> {
        self.rounds
            .drain()
            .map(|(op, round)| (op, round.calls.into_iter().map(|(rank, _)| rank).collect()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker(rank_count: usize) -> CollectiveTracker {
        CollectiveTracker::new(rank_count, Duration::from_secs(30))
    }

    #[test]
    fn test_single_rank_completes_immediately() {
        let mut tracker = tracker(1);
        let outcome = tracker
            .join(0, Call::Initialize, Instant::now())
            .unwrap();
        match outcome {
            JoinOutcome::Complete(calls) => assert_eq!(calls.len(), 1),
            JoinOutcome::Waiting => panic!("single-rank round must complete at once"),
        }
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_round_waits_until_last_rank_joins() {
        let mut tracker = tracker(4);
        let now = Instant::now();
        for rank in [0, 1, 2] {
            assert!(matches!(
                tracker.join(rank, Call::Advance { dt: 0.1 }, now).unwrap(),
                JoinOutcome::Waiting
            ));
        }
        match tracker.join(3, Call::Advance { dt: 0.3 }, now).unwrap() {
            JoinOutcome::Complete(calls) => {
                let ranks: Vec<RankId> = calls.iter().map(|(rank, _)| *rank).collect();
                assert_eq!(ranks, vec![0, 1, 2, 3]);
            }
            JoinOutcome::Waiting => panic!("last join must complete the round"),
        }
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_duplicate_join_is_rejected_and_round_survives() {
        let mut tracker = tracker(2);
        let now = Instant::now();
        tracker.join(0, Call::Finalize, now).unwrap();
        assert_eq!(
            tracker.join(0, Call::Finalize, now),
            Err(JoinError::DuplicateJoin {
                rank: 0,
                op: Opcode::Finalize
            })
        );
        // The healthy rank can still complete the round.
        assert!(matches!(
            tracker.join(1, Call::Finalize, now).unwrap(),
            JoinOutcome::Complete(_)
        ));
    }

    #[test]
    fn test_out_of_range_rank_is_rejected() {
        let mut tracker = tracker(2);
        let now = Instant::now();
        assert_eq!(
            tracker.join(2, Call::Initialize, now),
            Err(JoinError::UnknownRank(2))
        );
        assert_eq!(
            tracker.join(-1, Call::Initialize, now),
            Err(JoinError::UnknownRank(-1))
        );
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_distinct_opcodes_track_separate_rounds() {
        let mut tracker = tracker(2);
        let now = Instant::now();
        tracker.join(0, Call::Initialize, now).unwrap();
        tracker.join(0, Call::Advance { dt: 0.1 }, now).unwrap();
        // Completing one round leaves the other pending.
        assert!(matches!(
            tracker.join(1, Call::Initialize, now).unwrap(),
            JoinOutcome::Complete(_)
        ));
        assert!(!tracker.is_empty());
    }

    #[test]
    fn test_deadline_tracks_oldest_round() {
        let mut tracker = CollectiveTracker::new(2, Duration::from_secs(10));
        assert!(tracker.deadline().is_none());

        let first = Instant::now();
        tracker.join(0, Call::Initialize, first).unwrap();
        let second = first + Duration::from_secs(5);
        tracker.join(0, Call::Advance { dt: 0.1 }, second).unwrap();

        assert_eq!(tracker.deadline(), Some(first + Duration::from_secs(10)));
    }

    #[test]
    fn test_expire_drains_only_overdue_rounds() {
        let mut tracker = CollectiveTracker::new(2, Duration::from_secs(10));
        let first = Instant::now();
        tracker.join(0, Call::Initialize, first).unwrap();
        let second = first + Duration::from_secs(8);
        tracker.join(1, Call::Advance { dt: 0.1 }, second).unwrap();

        let expired = tracker.expire(first + Duration::from_secs(10));
        assert_eq!(expired, vec![(Opcode::Initialize, vec![0])]);
        assert!(!tracker.is_empty());
    }

    #[test]
    fn test_abort_all_reports_every_waiter() {
        let mut tracker = tracker(3);
        let now = Instant::now();
        tracker.join(0, Call::Initialize, now).unwrap();
        tracker.join(1, Call::Initialize, now).unwrap();
        tracker.join(2, Call::Finalize, now).unwrap();

        let mut aborted = tracker.abort_all();
        aborted.sort_by_key(|(op, _)| *op as u8);
        assert_eq!(aborted.len(), 2);
        assert!(tracker.is_empty());
    }
}
