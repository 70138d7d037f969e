// Copyright 2025 the Ringmatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Ringmatch: distributed nearest-point matching without a global index.
//!
//! Two entity collections, *reference* and *query*, are spread over `P`
//! ranks. Each rank indexes only the reference entities it holds, in a
//! [`SpatialTree`](ringmatch_octree::SpatialTree). The query entities
//! then travel around the ring: each rank packs its own into a batch, and
//! over `P` rounds every batch visits every rank once and is evaluated
//! against that rank's index.
//!
//! - [`EntityAdapter`] is all the crate needs from the host: ids, ownership,
//!   coordinates, and a byte encoding. [`PointSet`] and [`CentroidSet`] cover
//!   point-like and element-like entities.
//! - [`Communicator`] is the transport. [`LocalComm`] connects ranks living
//!   on threads of one process; `MpiComm` runs one MPI process per rank.
//! - [`Matcher`] runs a pass with one of three policies:
//!   [`TieMatches`] (every closest query per reference),
//!   [`UniqueMatches`] (one query per reference) and
//!   [`ToleranceMatches`] (one reference per query, within the tolerance).
//!
//! Results stay on the rank where a match was found. Each result type has a
//! `merge` for hosts that want them in one place.
//!
//! ## Features
//!
//! - `mpi`: enables `MpiComm`, a [`Communicator`] over the `mpi` crate. Needs
//!   an MPI implementation installed on the system.
//!
//! # Example
//!
//! ```rust
//! use glam::DVec3;
//! use ringmatch::{Communicator, EntityAdapter, EntityId, LocalComm, MatchConfig, Matcher, PointSet};
//!
//! let comms = LocalComm::create(2);
//! let handles: Vec<_> = comms
//!     .into_iter()
//!     .map(|comm| {
//!         std::thread::spawn(move || {
//!             let rank = comm.rank() as u64;
//!             // Rank r holds reference 100 + r at x = 10 r, and query r near the
//!             // *other* rank's reference.
//!             let refs: PointSet =
//!                 [(EntityId(100 + rank), DVec3::new(10.0 * rank as f64, 0.0, 0.0))]
//!                     .into_iter()
//!                     .collect();
//!             let other = 1 - rank;
//!             let queries: PointSet =
//!                 [(EntityId(rank), DVec3::new(10.0 * other as f64 + 0.5, 0.0, 0.0))]
//!                     .into_iter()
//!                     .collect();
//!
//!             let mut m = Matcher::new(comm, MatchConfig::new(1.0, 8, 1.0)).unwrap();
//!             m.build_index(&refs, &refs.owned_ids()).unwrap();
//!             let found = m.match_within_tolerance(&queries, &queries.owned_ids()).unwrap();
//!             let record = *found.get(EntityId(other)).unwrap();
//!             (record.reference, record.distance)
//!         })
//!     })
//!     .collect();
//!
//! let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
//! assert_eq!(results, vec![(EntityId(100), 0.5), (EntityId(101), 0.5)]);
//! ```

mod adapter;
mod adapters;
mod batch;
mod comm;
mod config;
mod error;
mod index;
mod matcher;
mod policy;
mod ring;
mod wire;

pub use adapter::{EntityAdapter, EntityId};
pub use adapters::{CentroidSet, PointSet};
pub use batch::RingBatch;
pub use comm::{Communicator, Envelope, LocalComm};
#[cfg(feature = "mpi")]
pub use comm::MpiComm;
pub use config::{Axes, MatchConfig, PlaneTransform};
pub use error::MatchError;
pub use index::LocalIndex;
pub use matcher::Matcher;
pub use policy::{MatchPolicy, MatchRecord, TieGroup, TieMatches, ToleranceMatches, UniqueMatches};
pub use ring::{RingMatcher, RingState};

pub use ringmatch_octree::{BoundingBox, BuildError};
