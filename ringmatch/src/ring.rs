// Copyright 2025 the Ringmatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The ring exchange: every batch visits every rank exactly once.

use core::mem;

use crate::batch::RingBatch;
use crate::comm::Communicator;
use crate::error::MatchError;

/// Progress of a [`RingMatcher`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RingState {
    /// No pass has run yet.
    Idle,
    /// A pass is in (or failed during) this round.
    Round(usize),
    /// The last pass completed all rounds.
    Done,
}

/// Drives the ring protocol over a [`Communicator`].
///
/// With `P` ranks a pass has `P` rounds. In round 0 each rank evaluates the
/// batch it packed itself. In round `k > 0` it sends the batch it holds to
/// `(rank + 1) % P`, tagged with its own rank, and receives the next one from
/// `(rank + P - 1) % P`. Every round ends with a barrier, so after `P` rounds
/// each batch has been evaluated on every rank exactly once.
///
/// A failing rank stops at the error and leaves its peers blocked in the
/// next receive or barrier; errors are not retried.
#[derive(Debug)]
pub struct RingMatcher<C> {
    comm: C,
    state: RingState,
    recv_buf: Vec<u8>,
}

impl<C: Communicator> RingMatcher<C> {
    /// Wrap a transport endpoint.
    pub fn new(comm: C) -> Self {
        Self {
            comm,
            state: RingState::Idle,
            recv_buf: Vec::new(),
        }
    }

    /// Current progress.
    pub fn state(&self) -> RingState {
        self.state
    }

    /// The transport endpoint.
    pub fn comm(&self) -> &C {
        &self.comm
    }

    /// Give back the transport endpoint.
    pub fn into_comm(self) -> C {
        self.comm
    }

    /// Run one pass starting from `batch`, calling `visit(round, held)` for
    /// the batch held in each round.
    pub fn run<F>(&mut self, batch: RingBatch, mut visit: F) -> Result<(), MatchError>
    where
        F: FnMut(usize, &RingBatch) -> Result<(), MatchError>,
    {
        let size = self.comm.size();
        let rank = self.comm.rank();
        let next = (rank + 1) % size;
        let prev = (rank + size - 1) % size;

        let mut held = batch;
        for round in 0..size {
            self.state = RingState::Round(round);
            if round > 0 {
                self.comm.send(next, rank, held.into_bytes())?;
                if !self.recv_buf.is_empty() {
                    return Err(MatchError::ReceiveBufferNotEmpty {
                        round,
                        len: self.recv_buf.len(),
                    });
                }
                let env = self.comm.recv(&mut self.recv_buf)?;
                if env.source != prev || env.tag != prev {
                    return Err(MatchError::UnexpectedSender {
                        expected: prev,
                        source_rank: env.source,
                        tag: env.tag,
                    });
                }
                held = RingBatch::from_bytes(mem::take(&mut self.recv_buf))?;
            }
            log::trace!(
                "rank {rank}: round {round}/{size} holds {} entities",
                held.len()
            );
            visit(round, &held)?;
            self.comm.barrier()?;
        }
        self.state = RingState::Done;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::Envelope;

    // A single endpoint replaying canned receives.
    #[derive(Debug, Default)]
    struct Scripted {
        rank: usize,
        size: usize,
        inbox: Vec<Result<(Envelope, Vec<u8>), MatchError>>,
        sent: Vec<(usize, usize, Vec<u8>)>,
        barriers: usize,
    }

    impl Communicator for Scripted {
        fn rank(&self) -> usize {
            self.rank
        }

        fn size(&self) -> usize {
            self.size
        }

        fn send(&mut self, to: usize, tag: usize, payload: Vec<u8>) -> Result<(), MatchError> {
            self.sent.push((to, tag, payload));
            Ok(())
        }

        fn recv(&mut self, buf: &mut Vec<u8>) -> Result<Envelope, MatchError> {
            match self.inbox.remove(0) {
                Ok((env, bytes)) => {
                    buf.extend_from_slice(&bytes);
                    Ok(env)
                }
                Err(e) => {
                    buf.extend_from_slice(&[0xde, 0xad]);
                    Err(e)
                }
            }
        }

        fn barrier(&mut self) -> Result<(), MatchError> {
            self.barriers += 1;
            Ok(())
        }
    }

    fn frame(n: u32) -> Vec<u8> {
        let mut bytes = n.to_le_bytes().to_vec();
        for _ in 0..n {
            bytes.extend_from_slice(&0_u32.to_le_bytes());
        }
        bytes
    }

    #[test]
    fn single_rank_evaluates_its_own_batch_only() {
        let mut ring = RingMatcher::new(Scripted {
            size: 1,
            ..Default::default()
        });
        let mut rounds = Vec::new();
        ring.run(RingBatch::empty(), |round, held| {
            rounds.push((round, held.len()));
            Ok(())
        })
        .unwrap();
        assert_eq!(rounds, vec![(0, 0)]);
        assert_eq!(ring.state(), RingState::Done);
        assert!(ring.comm().sent.is_empty());
        assert_eq!(ring.comm().barriers, 1);
    }

    #[test]
    fn batches_move_to_the_successor() {
        let comm = Scripted {
            rank: 0,
            size: 3,
            inbox: vec![
                Ok((Envelope { source: 2, tag: 2 }, frame(1))),
                Ok((Envelope { source: 2, tag: 2 }, frame(2))),
            ],
            ..Default::default()
        };
        let mut ring = RingMatcher::new(comm);
        let mut seen = Vec::new();
        ring.run(RingBatch::empty(), |round, held| {
            seen.push((round, held.len()));
            Ok(())
        })
        .unwrap();

        assert_eq!(seen, vec![(0, 0), (1, 1), (2, 2)]);
        let comm = ring.into_comm();
        assert_eq!(comm.barriers, 3);
        assert_eq!(
            comm.sent,
            vec![(1, 0, frame(0)), (1, 0, frame(1))],
            "round k forwards what round k-1 received"
        );
    }

    #[test]
    fn wrong_tag_is_a_protocol_error() {
        let comm = Scripted {
            rank: 1,
            size: 3,
            inbox: vec![Ok((Envelope { source: 0, tag: 2 }, frame(0)))],
            ..Default::default()
        };
        let mut ring = RingMatcher::new(comm);
        let err = ring.run(RingBatch::empty(), |_, _| Ok(())).unwrap_err();
        assert_eq!(
            err,
            MatchError::UnexpectedSender {
                expected: 0,
                source_rank: 0,
                tag: 2
            }
        );
        assert_eq!(ring.state(), RingState::Round(1));
    }

    #[test]
    fn stale_receive_buffer_is_a_protocol_error() {
        let comm = Scripted {
            rank: 0,
            size: 2,
            inbox: vec![
                Err(MatchError::Transport("peer vanished".into())),
                Ok((Envelope { source: 1, tag: 1 }, frame(0))),
            ],
            ..Default::default()
        };
        let mut ring = RingMatcher::new(comm);
        let first = ring.run(RingBatch::empty(), |_, _| Ok(()));
        assert!(matches!(first, Err(MatchError::Transport(_))));

        // The failed receive left bytes behind; the next pass refuses to
        // receive on top of them.
        let second = ring.run(RingBatch::empty(), |_, _| Ok(()));
        assert_eq!(
            second,
            Err(MatchError::ReceiveBufferNotEmpty { round: 1, len: 2 })
        );
    }

    #[test]
    fn malformed_frame_is_rejected() {
        let comm = Scripted {
            rank: 0,
            size: 2,
            inbox: vec![Ok((Envelope { source: 1, tag: 1 }, vec![5, 0, 0]))],
            ..Default::default()
        };
        let mut ring = RingMatcher::new(comm);
        let err = ring.run(RingBatch::empty(), |_, _| Ok(())).unwrap_err();
        assert!(matches!(err, MatchError::Malformed(_)));
    }

    #[test]
    fn visitor_error_stops_the_pass() {
        let mut ring = RingMatcher::new(Scripted {
            size: 1,
            ..Default::default()
        });
        let err = ring
            .run(RingBatch::empty(), |_, _| Err(MatchError::IndexNotBuilt))
            .unwrap_err();
        assert_eq!(err, MatchError::IndexNotBuilt);
        assert_eq!(ring.comm().barriers, 0);
    }
}
