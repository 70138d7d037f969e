// Copyright 2025 the Ringmatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Point-to-point transport between ranks.
//!
//! - [`LocalComm`]: ranks as threads of one process, connected by channels.
//! - `MpiComm` *(feature `mpi`)*: ranks as MPI processes.

mod local;
#[cfg(feature = "mpi")]
mod mpi;

pub use local::LocalComm;
#[cfg(feature = "mpi")]
pub use mpi::MpiComm;

use crate::error::MatchError;

/// Sender information of a received message.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Envelope {
    /// Rank the message came from.
    pub source: usize,
    /// Tag the sender attached.
    pub tag: usize,
}

/// The transport the ring protocol runs over.
///
/// One value per rank. `send` must not wait for the matching receive (the
/// ring posts its send before its receive on every rank at once).
pub trait Communicator {
    /// This rank, in `0..size()`.
    fn rank(&self) -> usize;

    /// Number of ranks.
    fn size(&self) -> usize;

    /// Send `payload` to rank `to` under `tag`.
    fn send(&mut self, to: usize, tag: usize, payload: Vec<u8>) -> Result<(), MatchError>;

    /// Block until a message from any rank arrives and append its payload to
    /// `buf`.
    fn recv(&mut self, buf: &mut Vec<u8>) -> Result<Envelope, MatchError>;

    /// Block until every rank has called `barrier`.
    fn barrier(&mut self) -> Result<(), MatchError>;
}

impl<C: Communicator + ?Sized> Communicator for &mut C {
    fn rank(&self) -> usize {
        (**self).rank()
    }

    fn size(&self) -> usize {
        (**self).size()
    }

    fn send(&mut self, to: usize, tag: usize, payload: Vec<u8>) -> Result<(), MatchError> {
        (**self).send(to, tag, payload)
    }

    fn recv(&mut self, buf: &mut Vec<u8>) -> Result<Envelope, MatchError> {
        (**self).recv(buf)
    }

    fn barrier(&mut self) -> Result<(), MatchError> {
        (**self).barrier()
    }
}
