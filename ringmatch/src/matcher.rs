// Copyright 2025 the Ringmatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The per-rank entry point.

use crate::adapter::{EntityAdapter, EntityId};
use crate::batch::RingBatch;
use crate::comm::Communicator;
use crate::config::MatchConfig;
use crate::error::MatchError;
use crate::index::LocalIndex;
use crate::policy::{MatchPolicy, TieMatches, ToleranceMatches, UniqueMatches};
use crate::ring::RingMatcher;

/// Matching façade for one rank.
///
/// Build the reference index once with [`build_index`](Self::build_index),
/// then run any number of passes. Every rank must make the same sequence of
/// calls: each pass is a collective over the communicator.
///
/// Results stay on the rank that evaluated them. Query ids this rank does not
/// own are skipped when packing, so every rank may pass the same global list.
#[derive(Debug)]
pub struct Matcher<C> {
    ring: RingMatcher<C>,
    config: MatchConfig,
    index: Option<LocalIndex>,
}

impl<C: Communicator> Matcher<C> {
    /// A matcher over `comm`; fails if `config` is unusable.
    pub fn new(comm: C, config: MatchConfig) -> Result<Self, MatchError> {
        config.validate()?;
        Ok(Self {
            ring: RingMatcher::new(comm),
            config,
            index: None,
        })
    }

    /// The configuration in use.
    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// This rank.
    pub fn rank(&self) -> usize {
        self.ring.comm().rank()
    }

    /// The local index, once built.
    pub fn index(&self) -> Option<&LocalIndex> {
        self.index.as_ref()
    }

    /// Index this rank's reference entities, replacing any previous index.
    ///
    /// Ghosted references are allowed; every id must be local to `adapter`.
    pub fn build_index<A: EntityAdapter + ?Sized>(
        &mut self,
        adapter: &A,
        reference_ids: &[EntityId],
    ) -> Result<&LocalIndex, MatchError> {
        let index = LocalIndex::build(adapter, reference_ids, &self.config)?;
        Ok(self.index.insert(index))
    }

    /// For every reference entity on this rank, the queries closest to it.
    pub fn match_collect_ties<A: EntityAdapter + ?Sized>(
        &mut self,
        adapter: &A,
        query_ids: &[EntityId],
    ) -> Result<TieMatches, MatchError> {
        let mut ties = TieMatches::new(self.config.tie_epsilon);
        self.run("collect-ties", adapter, query_ids, &mut ties)?;
        Ok(ties)
    }

    /// At most one query per reference entity on this rank.
    pub fn match_best_unique<A: EntityAdapter + ?Sized>(
        &mut self,
        adapter: &A,
        query_ids: &[EntityId],
    ) -> Result<UniqueMatches, MatchError> {
        let mut unique = UniqueMatches::new();
        self.run("best-unique", adapter, query_ids, &mut unique)?;
        Ok(unique)
    }

    /// For every query evaluated here, its closest reference if no farther
    /// than the tolerance.
    pub fn match_within_tolerance<A: EntityAdapter + ?Sized>(
        &mut self,
        adapter: &A,
        query_ids: &[EntityId],
    ) -> Result<ToleranceMatches, MatchError> {
        let mut within = ToleranceMatches::new();
        self.run("within-tolerance", adapter, query_ids, &mut within)?;
        Ok(within)
    }

    /// Run one ring pass feeding every held query into `policy`.
    pub fn run<A, P>(
        &mut self,
        label: &str,
        adapter: &A,
        query_ids: &[EntityId],
        policy: &mut P,
    ) -> Result<(), MatchError>
    where
        A: EntityAdapter + ?Sized,
        P: MatchPolicy,
    {
        let index = self.index.as_ref().ok_or(MatchError::IndexNotBuilt)?;
        let config = &self.config;
        let plane_point = index.reference_plane_point();

        let owned: Vec<EntityId> = query_ids
            .iter()
            .copied()
            .filter(|&id| adapter.is_owner(id))
            .collect();
        let batch = RingBatch::pack(adapter, owned.iter().copied())?;
        let rank = self.ring.comm().rank();
        log::debug!(
            "rank {rank}: {label} pass with {} of {} query ids owned here",
            owned.len(),
            query_ids.len(),
        );

        let mut evaluated = 0_usize;
        self.ring.run(batch, |_, held| {
            for decoded in held.decode(adapter) {
                let (query, x) = decoded?;
                let x = config.transform_query(x, plane_point);
                policy.observe(index, config, query, x);
                evaluated += 1;
            }
            Ok(())
        })?;
        log::debug!("rank {rank}: {label} pass evaluated {evaluated} queries");
        Ok(())
    }
}
