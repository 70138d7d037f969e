// Copyright 2025 the Ringmatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Match two slightly offset point grids spread over four threaded ranks.
//!
//! Each rank owns one slab of the reference grid and a *different* slab of
//! the query grid, so every match has to travel around the ring.
//!
//! Run:
//! - `RUST_LOG=debug cargo run -p ringmatch_demos --example ring_match`

use std::thread;

use glam::DVec3;
use ringmatch::{
    EntityAdapter, EntityId, LocalComm, MatchConfig, MatchError, Matcher, PointSet,
    ToleranceMatches, UniqueMatches,
};

const RANKS: usize = 4;
const N: u64 = 8;
const SPACING: f64 = 1.0;

fn grid_point(id: u64) -> DVec3 {
    let (i, j, k) = (id % N, (id / N) % N, id / (N * N));
    DVec3::new(i as f64, j as f64, k as f64) * SPACING
}

/// Which rank owns grid id `id` when slabs are cut along z, shifted by `shift`.
fn slab_owner(id: u64, shift: usize) -> usize {
    let k = (id / (N * N)) as usize;
    (k * RANKS / N as usize + shift) % RANKS
}

fn rank_main(rank: usize, comm: LocalComm) -> Result<(ToleranceMatches, UniqueMatches), MatchError> {
    let ids = 0..N * N * N;
    let refs: PointSet = ids
        .clone()
        .filter(|&id| slab_owner(id, 0) == rank)
        .map(|id| (EntityId(id), grid_point(id)))
        .collect();
    // Queries sit a little off their reference and are owned one rank over.
    let queries: PointSet = ids
        .filter(|&id| slab_owner(id, 1) == rank)
        .map(|id| (EntityId(10_000 + id), grid_point(id) + DVec3::new(0.01, -0.02, 0.015)))
        .collect();

    let config = MatchConfig::new(0.1 * SPACING, 8, SPACING);
    let mut matcher = Matcher::new(comm, config)?;
    let index = matcher.build_index(&refs, &refs.owned_ids())?;
    log::info!("rank {rank}: {index:?}");

    let within = matcher.match_within_tolerance(&queries, &queries.owned_ids())?;
    let unique = matcher.match_best_unique(&queries, &queries.owned_ids())?;
    Ok((within, unique))
}

fn main() {
    env_logger::init();

    let results: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = LocalComm::create(RANKS)
            .into_iter()
            .enumerate()
            .map(|(rank, comm)| s.spawn(move || rank_main(rank, comm)))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("rank thread panicked"))
            .collect()
    });

    let mut within = ToleranceMatches::new();
    let mut unique = UniqueMatches::new();
    for (rank, result) in results.into_iter().enumerate() {
        match result {
            Ok((w, u)) => {
                println!(
                    "rank {rank}: {} queries within tolerance, {} references claimed",
                    w.len(),
                    u.len()
                );
                within.merge(w);
                unique.merge(u);
            }
            Err(e) => {
                eprintln!("rank {rank} failed: {e}");
                std::process::exit(1);
            }
        }
    }

    let worst = within.iter().map(|r| r.distance).fold(0.0_f64, f64::max);
    let misplaced = within
        .iter()
        .filter(|r| r.query.0 - 10_000 != r.reference.0)
        .count();
    println!(
        "{} of {} queries matched, {misplaced} to the wrong reference, worst distance {worst:.4}",
        within.len(),
        N * N * N,
    );
    println!("{} references claimed uniquely", unique.len());
}
