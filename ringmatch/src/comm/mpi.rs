// Copyright 2025 the Ringmatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use ::mpi::environment::Universe;
use ::mpi::topology::SimpleCommunicator;
use ::mpi::traits::{
    Communicator as _, CommunicatorCollectives as _, Destination as _, Source as _,
};

use super::{Communicator, Envelope};
use crate::error::MatchError;

/// Transport over an MPI communicator, one OS process per rank.
///
/// MPI's standard-mode send may wait for the matching receive once a message
/// is large enough, which deadlocks a ring where every rank sends first. A
/// [`send`](Communicator::send) is therefore held back and posted as a
/// non-blocking send by the next [`recv`](Communicator::recv), which waits
/// for it after its own receive has completed. A send still held back when
/// [`barrier`](Communicator::barrier) runs is flushed with a blocking send.
///
/// ```rust,no_run
/// use ringmatch::{MatchConfig, Matcher, MpiComm, PointSet};
///
/// let universe = mpi::initialize().unwrap();
/// let comm = MpiComm::world(&universe);
/// let refs = PointSet::new();
/// let mut matcher = Matcher::new(comm, MatchConfig::new(1e-6, 8, 1.0)).unwrap();
/// matcher.build_index(&refs, &[]).unwrap();
/// ```
pub struct MpiComm {
    world: SimpleCommunicator,
    pending: Option<(i32, i32, Vec<u8>)>,
}

impl core::fmt::Debug for MpiComm {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MpiComm")
            .field("rank", &self.world.rank())
            .field("size", &self.world.size())
            .field("pending", &self.pending.as_ref().map(|(to, _, p)| (to, p.len())))
            .finish_non_exhaustive()
    }
}

impl MpiComm {
    /// Wrap a communicator, e.g. a split of `MPI_COMM_WORLD`.
    pub fn new(world: SimpleCommunicator) -> Self {
        Self {
            world,
            pending: None,
        }
    }

    /// Endpoint on `MPI_COMM_WORLD`.
    pub fn world(universe: &Universe) -> Self {
        Self::new(universe.world())
    }

    fn flush(&mut self) {
        if let Some((to, tag, payload)) = self.pending.take() {
            self.world
                .process_at_rank(to)
                .send_with_tag(&payload[..], tag);
        }
    }
}

impl From<SimpleCommunicator> for MpiComm {
    fn from(world: SimpleCommunicator) -> Self {
        Self::new(world)
    }
}

impl Communicator for MpiComm {
    fn rank(&self) -> usize {
        self.world.rank() as usize
    }

    fn size(&self) -> usize {
        self.world.size() as usize
    }

    fn send(&mut self, to: usize, tag: usize, payload: Vec<u8>) -> Result<(), MatchError> {
        let rank = self.rank();
        if to >= self.size() || to == rank {
            return Err(MatchError::Transport(format!(
                "rank {rank} cannot send to rank {to}"
            )));
        }
        let tag = i32::try_from(tag)
            .map_err(|_| MatchError::Transport(format!("tag {tag} does not fit an MPI tag")))?;
        if self.pending.is_some() {
            return Err(MatchError::Transport(format!(
                "rank {rank} sent twice without receiving in between"
            )));
        }
        // `to < size`, and MPI sizes are `i32`.
        self.pending = Some((to as i32, tag, payload));
        Ok(())
    }

    fn recv(&mut self, buf: &mut Vec<u8>) -> Result<Envelope, MatchError> {
        let pending = self.pending.take();
        let world = &self.world;
        let (message, status) = ::mpi::request::scope(|scope| {
            let request = pending.as_ref().map(|(to, tag, payload)| {
                world
                    .process_at_rank(*to)
                    .immediate_send_with_tag(scope, &payload[..], *tag)
            });
            let received = world.any_process().receive_vec::<u8>();
            if let Some(request) = request {
                request.wait();
            }
            received
        });
        let source = usize::try_from(status.source_rank())
            .map_err(|_| MatchError::Transport(format!("bad source rank {}", status.source_rank())))?;
        let tag = usize::try_from(status.tag())
            .map_err(|_| MatchError::Transport(format!("bad tag {}", status.tag())))?;
        buf.extend_from_slice(&message);
        Ok(Envelope { source, tag })
    }

    fn barrier(&mut self) -> Result<(), MatchError> {
        self.flush();
        self.world.barrier();
        Ok(())
    }
}
