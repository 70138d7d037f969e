// Copyright 2025 the Ringmatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex, PoisonError};

use super::{Communicator, Envelope};
use crate::error::MatchError;

enum Packet {
    Message {
        source: usize,
        tag: usize,
        payload: Vec<u8>,
    },
    /// The endpoint of `source` was dropped.
    Left { source: usize },
}

#[derive(Debug, Default)]
struct Gate {
    arrived: usize,
    generation: u64,
    aborted: bool,
}

/// Barrier shared by all endpoints of one ring. Unlike `std::sync::Barrier`
/// it can be torn down, which releases every waiter with an error.
#[derive(Debug)]
struct SharedBarrier {
    size: usize,
    gate: Mutex<Gate>,
    released: Condvar,
}

impl SharedBarrier {
    fn new(size: usize) -> Self {
        Self {
            size,
            gate: Mutex::new(Gate::default()),
            released: Condvar::new(),
        }
    }

    fn wait(&self, rank: usize) -> Result<(), MatchError> {
        let aborted = || MatchError::Transport(format!("rank {rank}: a peer left the ring during a barrier"));
        let mut gate = self.gate.lock().map_err(|_| aborted())?;
        if gate.aborted {
            return Err(aborted());
        }
        gate.arrived += 1;
        if gate.arrived == self.size {
            gate.arrived = 0;
            gate.generation += 1;
            self.released.notify_all();
            return Ok(());
        }
        let generation = gate.generation;
        let gate = self
            .released
            .wait_while(gate, |g| g.generation == generation && !g.aborted)
            .map_err(|_| aborted())?;
        if gate.generation == generation {
            Err(aborted())
        } else {
            Ok(())
        }
    }

    fn abort(&self) {
        let mut gate = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        gate.aborted = true;
        self.released.notify_all();
    }
}

/// In-process transport: one endpoint per thread, connected by channels.
///
/// Dropping an endpoint tears the ring down: peers blocked in
/// [`recv`](Communicator::recv) or [`barrier`](Communicator::barrier), and
/// every later barrier, fail with [`MatchError::Transport`]. A rank that
/// bails out of a pass early thus never leaves the others waiting.
///
/// ```rust
/// use ringmatch::{Communicator, LocalComm};
///
/// let comms = LocalComm::create(2);
/// let handles: Vec<_> = comms
///     .into_iter()
///     .map(|mut comm| {
///         std::thread::spawn(move || {
///             let peer = 1 - comm.rank();
///             comm.send(peer, comm.rank(), vec![comm.rank() as u8]).unwrap();
///             let mut buf = Vec::new();
///             let env = comm.recv(&mut buf).unwrap();
///             comm.barrier().unwrap();
///             (env.source, buf)
///         })
///     })
///     .collect();
/// let got: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
/// assert_eq!(got, vec![(1, vec![1]), (0, vec![0])]);
/// ```
pub struct LocalComm {
    rank: usize,
    peers: Vec<Option<Sender<Packet>>>,
    inbox: Receiver<Packet>,
    barrier: Arc<SharedBarrier>,
}

impl core::fmt::Debug for LocalComm {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LocalComm")
            .field("rank", &self.rank)
            .field("size", &self.peers.len())
            .finish_non_exhaustive()
    }
}

impl LocalComm {
    /// Endpoints for `size` ranks, indexed by rank.
    ///
    /// # Panics
    ///
    /// If `size` is zero.
    pub fn create(size: usize) -> Vec<Self> {
        assert!(size > 0, "a ring needs at least one rank");
        let (senders, inboxes): (Vec<_>, Vec<_>) = (0..size).map(|_| mpsc::channel::<Packet>()).unzip();
        let barrier = Arc::new(SharedBarrier::new(size));
        inboxes
            .into_iter()
            .enumerate()
            .map(|(rank, inbox)| {
                // No sender to self: once every peer is gone, `recv` fails
                // instead of blocking.
                let peers = senders
                    .iter()
                    .enumerate()
                    .map(|(to, s)| (to != rank).then(|| s.clone()))
                    .collect();
                Self {
                    rank,
                    peers,
                    inbox,
                    barrier: Arc::clone(&barrier),
                }
            })
            .collect()
    }
}

impl Communicator for LocalComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.peers.len()
    }

    fn send(&mut self, to: usize, tag: usize, payload: Vec<u8>) -> Result<(), MatchError> {
        let peer = self
            .peers
            .get(to)
            .and_then(Option::as_ref)
            .ok_or_else(|| MatchError::Transport(format!("rank {} cannot send to rank {to}", self.rank)))?;
        peer.send(Packet::Message {
            source: self.rank,
            tag,
            payload,
        })
        .map_err(|_| MatchError::Transport(format!("rank {to} hung up")))
    }

    fn recv(&mut self, buf: &mut Vec<u8>) -> Result<Envelope, MatchError> {
        let packet = self
            .inbox
            .recv()
            .map_err(|_| MatchError::Transport(format!("all peers of rank {} hung up", self.rank)))?;
        match packet {
            Packet::Message {
                source,
                tag,
                payload,
            } => {
                buf.extend_from_slice(&payload);
                Ok(Envelope { source, tag })
            }
            Packet::Left { source } => Err(MatchError::Transport(format!(
                "rank {source} left the ring while rank {} was receiving",
                self.rank
            ))),
        }
    }

    fn barrier(&mut self) -> Result<(), MatchError> {
        self.barrier.wait(self.rank)
    }
}

impl Drop for LocalComm {
    fn drop(&mut self) {
        self.barrier.abort();
        for peer in self.peers.iter().flatten() {
            // A peer that is already gone needs no notice.
            let _ = peer.send(Packet::Left { source: self.rank });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_rank_cannot_send_to_itself() {
        let mut comms = LocalComm::create(1);
        let comm = &mut comms[0];
        assert_eq!(comm.size(), 1);
        assert!(matches!(comm.send(0, 0, vec![]), Err(MatchError::Transport(_))));
        assert_eq!(comm.barrier(), Ok(()));
    }

    #[test]
    fn dropped_peer_is_a_transport_error() {
        let mut comms = LocalComm::create(2);
        let peer = comms.pop().unwrap();
        drop(peer);
        let comm = &mut comms[0];
        let mut buf = Vec::new();
        assert!(matches!(comm.recv(&mut buf), Err(MatchError::Transport(_))));
        assert!(matches!(comm.send(1, 0, vec![1]), Err(MatchError::Transport(_))));
    }

    #[test]
    fn dropped_peer_releases_a_barrier_waiter() {
        let mut comms = LocalComm::create(3);
        let last = comms.pop().unwrap();
        let mut first = comms.remove(0);
        let waiter = std::thread::spawn(move || first.barrier());
        drop(last);
        assert!(matches!(waiter.join().unwrap(), Err(MatchError::Transport(_))));
        assert!(matches!(comms[0].barrier(), Err(MatchError::Transport(_))));
    }

    #[test]
    fn completed_barriers_are_not_affected_by_a_later_drop() {
        let comms = LocalComm::create(2);
        let handles: Vec<_> = comms
            .into_iter()
            .map(|mut comm| std::thread::spawn(move || comm.barrier()))
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), Ok(()));
        }
    }

    #[test]
    fn messages_keep_source_and_tag() {
        let mut comms = LocalComm::create(3);
        comms[2].send(0, 2, vec![9, 8]).unwrap();
        let mut buf = vec![1];
        let env = comms[0].recv(&mut buf).unwrap();
        assert_eq!(env, Envelope { source: 2, tag: 2 });
        assert_eq!(buf, vec![1, 9, 8]);
    }
}
