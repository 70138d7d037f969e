// Copyright 2025 the Ringmatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Match a line of query points against a line of reference points, one MPI
//! process per rank.
//!
//! Rank `r` owns references `r * N .. (r + 1) * N` and the queries of the
//! next rank's slab, so every match is found one hop away.
//!
//! Run:
//! - `mpirun -n 4 cargo run -p ringmatch_demos --features mpi --example mpi_ring`

use glam::DVec3;
use mpi::traits::Communicator as _;
use ringmatch::{Communicator, EntityId, MatchConfig, MatchError, Matcher, MpiComm, PointSet};

const N: u64 = 100;

fn main() {
    env_logger::init();
    let Some(universe) = mpi::initialize() else {
        eprintln!("MPI is already initialized");
        std::process::exit(1);
    };
    let comm = MpiComm::world(&universe);
    let (rank, size) = (comm.rank() as u64, comm.size() as u64);

    let refs: PointSet = (rank * N..(rank + 1) * N)
        .map(|i| (EntityId(i), DVec3::new(i as f64, 0.0, 0.0)))
        .collect();
    let next = (rank + 1) % size;
    let queries: PointSet = (next * N..(next + 1) * N)
        .map(|i| (EntityId(1_000_000 + i), DVec3::new(i as f64 + 0.01, 0.02, 0.0)))
        .collect();
    let query_ids: Vec<_> = queries.local_ids();

    let run = || -> Result<usize, MatchError> {
        let mut matcher = Matcher::new(comm, MatchConfig::new(0.1, 8, 1.0))?;
        matcher.build_index(&refs, &refs.local_ids())?;
        let within = matcher.match_within_tolerance(&queries, &query_ids)?;
        Ok(within.len())
    };
    match run() {
        Ok(found) => println!("rank {rank}: {found} of {N} queries matched here"),
        Err(e) => {
            eprintln!("rank {rank} failed: {e}");
            universe.world().abort(1);
        }
    }
}
