// Copyright 2025 the Ringmatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Accumulators deciding what a rank records for each query it evaluates.
//!
//! Every policy sees the queries of one pass in ring order and keeps its
//! results on the evaluating rank. Use `merge` to combine per-rank results.

use glam::DVec3;
use hashbrown::HashMap;
use hashbrown::hash_map::Entry;
use smallvec::SmallVec;

use crate::adapter::EntityId;
use crate::config::MatchConfig;
use crate::index::LocalIndex;

/// Folds one evaluated query into an accumulator.
pub trait MatchPolicy {
    /// Record what `index` says about `query` at (already transformed)
    /// position `x`.
    fn observe(&mut self, index: &LocalIndex, config: &MatchConfig, query: EntityId, x: DVec3);
}

/// Queries recorded against one reference entity.
#[derive(Clone, Debug, PartialEq)]
pub struct TieGroup {
    /// Distance of every listed query.
    pub distance: f64,
    /// Queries at that distance, in the order they were seen.
    pub queries: SmallVec<[EntityId; 2]>,
}

/// Reference entity → every query that is closest to it.
///
/// A query whose distance is strictly smaller than the recorded one replaces
/// the list; one within `tie_epsilon` of it is appended. A query is also
/// recorded against every reference in its leaf lying within `tie_epsilon`
/// of its best distance, so coincident references each list it.
#[derive(Clone, Debug, Default)]
pub struct TieMatches {
    groups: HashMap<EntityId, TieGroup>,
    tie_epsilon: f64,
}

impl TieMatches {
    /// An empty table appending within `tie_epsilon`.
    pub fn new(tie_epsilon: f64) -> Self {
        Self {
            groups: HashMap::new(),
            tie_epsilon,
        }
    }

    fn record(&mut self, reference: EntityId, query: EntityId, distance: f64) {
        match self.groups.entry(reference) {
            Entry::Vacant(v) => {
                v.insert(TieGroup {
                    distance,
                    queries: smallvec::smallvec![query],
                });
            }
            Entry::Occupied(mut o) => {
                let group = o.get_mut();
                if group.distance > distance {
                    group.distance = distance;
                    group.queries.clear();
                    group.queries.push(query);
                } else if (group.distance - distance).abs() < self.tie_epsilon
                    && !group.queries.contains(&query)
                {
                    group.queries.push(query);
                }
            }
        }
    }

    /// The group recorded for `reference`.
    pub fn get(&self, reference: EntityId) -> Option<&TieGroup> {
        self.groups.get(&reference)
    }

    /// Queries recorded for `reference`; empty if none.
    pub fn queries_of(&self, reference: EntityId) -> &[EntityId] {
        self.groups
            .get(&reference)
            .map(|g| g.queries.as_slice())
            .unwrap_or_default()
    }

    /// Number of references with at least one query.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// All groups, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &TieGroup)> + '_ {
        self.groups.iter().map(|(id, g)| (*id, g))
    }

    /// Fold another rank's table into this one.
    pub fn merge(&mut self, other: Self) {
        for (reference, group) in other.groups {
            for query in group.queries {
                self.record(reference, query, group.distance);
            }
        }
    }
}

impl MatchPolicy for TieMatches {
    fn observe(&mut self, index: &LocalIndex, _config: &MatchConfig, query: EntityId, x: DVec3) {
        let Some((best, best_distance)) = index.closest(x, false) else {
            return;
        };
        self.record(best, query, best_distance);
        for (reference, distance) in index.ties(x, best_distance, self.tie_epsilon) {
            if reference != best {
                self.record(reference, query, distance);
            }
        }
    }
}

/// Reference entity → the single query that claimed it.
///
/// When the closest reference is already claimed by another query that is at
/// least as close, the query looks again, preferring another reference within
/// the leaf-scan band. It then takes the reference if it is unclaimed or if
/// the current claim is farther away.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UniqueMatches {
    claims: HashMap<EntityId, (EntityId, f64)>,
}

impl UniqueMatches {
    /// An empty claim table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The `(query, distance)` that claimed `reference`.
    pub fn claim(&self, reference: EntityId) -> Option<(EntityId, f64)> {
        self.claims.get(&reference).copied()
    }

    /// Number of claimed references.
    pub fn len(&self) -> usize {
        self.claims.len()
    }

    /// Whether nothing was claimed.
    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    /// All claims as `(reference, query, distance)`, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, EntityId, f64)> + '_ {
        self.claims.iter().map(|(m, &(q, d))| (*m, q, d))
    }

    /// The same table keyed by query: `query → (reference, distance)`.
    ///
    /// A query that claimed several references keeps the closest.
    pub fn by_query(&self) -> HashMap<EntityId, (EntityId, f64)> {
        let mut out: HashMap<EntityId, (EntityId, f64)> = HashMap::with_capacity(self.claims.len());
        for (reference, query, distance) in self.iter() {
            match out.entry(query) {
                Entry::Vacant(v) => {
                    v.insert((reference, distance));
                }
                Entry::Occupied(mut o) => {
                    if o.get().1 > distance {
                        o.insert((reference, distance));
                    }
                }
            }
        }
        out
    }

    /// Fold another rank's claims into this one, keeping the closer claim.
    pub fn merge(&mut self, other: Self) {
        for (reference, (query, distance)) in other.claims {
            self.offer(reference, query, distance);
        }
    }

    fn offer(&mut self, reference: EntityId, query: EntityId, distance: f64) {
        match self.claims.entry(reference) {
            Entry::Vacant(v) => {
                v.insert((query, distance));
            }
            Entry::Occupied(mut o) => {
                if o.get().1 > distance {
                    o.insert((query, distance));
                }
            }
        }
    }
}

impl MatchPolicy for UniqueMatches {
    fn observe(&mut self, index: &LocalIndex, _config: &MatchConfig, query: EntityId, x: DVec3) {
        let Some(mut found) = index.closest(x, false) else {
            return;
        };
        // A claim held by another query at least as close steers this one away.
        let taken = self
            .claims
            .get(&found.0)
            .is_some_and(|&(holder, d)| holder != query && d <= found.1);
        if taken {
            let Some(second) = index.closest(x, true) else {
                return;
            };
            found = second;
        }
        self.offer(found.0, query, found.1);
    }
}

/// One accepted match.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MatchRecord {
    /// The query entity.
    pub query: EntityId,
    /// The reference entity it matched.
    pub reference: EntityId,
    /// Distance between the two.
    pub distance: f64,
    /// Whether the rank that found the match owns `reference`.
    pub reference_is_owned: bool,
}

/// Query entity → its closest reference, if within the tolerance.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ToleranceMatches {
    records: HashMap<EntityId, MatchRecord>,
}

impl ToleranceMatches {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The record for `query`.
    pub fn get(&self, query: EntityId) -> Option<&MatchRecord> {
        self.records.get(&query)
    }

    /// Number of matched queries.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing matched.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &MatchRecord> + '_ {
        self.records.values()
    }

    /// Fold another rank's records into this one, keeping the closer match.
    pub fn merge(&mut self, other: Self) {
        for (query, record) in other.records {
            match self.records.entry(query) {
                Entry::Vacant(v) => {
                    v.insert(record);
                }
                Entry::Occupied(mut o) => {
                    if o.get().distance > record.distance {
                        o.insert(record);
                    }
                }
            }
        }
    }
}

impl MatchPolicy for ToleranceMatches {
    fn observe(&mut self, index: &LocalIndex, config: &MatchConfig, query: EntityId, x: DVec3) {
        let known = self.records.get(&query).map(|r| r.distance);
        let Some((reference, distance)) = index.closest(x, known.is_some()) else {
            return;
        };
        if distance > config.tolerance || known.is_some_and(|d| d <= distance) {
            return;
        }
        self.records.insert(
            query,
            MatchRecord {
                query,
                reference,
                distance,
                reference_is_owned: index.is_owned(reference),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::PointSet;

    fn index(points: &[(u64, DVec3)], config: &MatchConfig) -> LocalIndex {
        let set: PointSet = points.iter().map(|&(id, p)| (EntityId(id), p)).collect();
        let ids: Vec<_> = points.iter().map(|&(id, _)| EntityId(id)).collect();
        LocalIndex::build(&set, &ids, config).unwrap()
    }

    #[test]
    fn ties_reset_on_a_strictly_closer_query() {
        let config = MatchConfig::new(1.0, 8, 1.0);
        let idx = index(&[(1, DVec3::ZERO)], &config);
        let mut ties = TieMatches::new(config.tie_epsilon);

        ties.observe(&idx, &config, EntityId(10), DVec3::new(0.5, 0.0, 0.0));
        ties.observe(&idx, &config, EntityId(11), DVec3::new(0.0, -0.5, 0.0));
        assert_eq!(ties.queries_of(EntityId(1)), &[EntityId(10), EntityId(11)]);

        ties.observe(&idx, &config, EntityId(12), DVec3::new(0.0, 0.0, 0.25));
        assert_eq!(ties.queries_of(EntityId(1)), &[EntityId(12)]);
        assert_eq!(ties.get(EntityId(1)).map(|g| g.distance), Some(0.25));

        ties.observe(&idx, &config, EntityId(13), DVec3::new(0.0, 0.0, 0.75));
        assert_eq!(ties.queries_of(EntityId(1)), &[EntityId(12)]);
        assert!(ties.queries_of(EntityId(2)).is_empty());
    }

    #[test]
    fn coincident_references_each_list_the_query() {
        let config = MatchConfig::new(0.5, 8, 1.0);
        let idx = index(&[(1, DVec3::ONE), (2, DVec3::ONE)], &config);
        let mut ties = TieMatches::new(config.tie_epsilon);
        ties.observe(&idx, &config, EntityId(7), DVec3::ONE);
        assert_eq!(ties.len(), 2);
        assert_eq!(ties.queries_of(EntityId(1)), &[EntityId(7)]);
        assert_eq!(ties.queries_of(EntityId(2)), &[EntityId(7)]);
    }

    #[test]
    fn claimed_reference_sends_the_next_query_elsewhere() {
        // Both references share a leaf; the band (0.6) spans them.
        let config = MatchConfig::new(0.2, 8, 60.0);
        let idx = index(&[(1, DVec3::ZERO), (2, DVec3::new(0.5, 0.0, 0.0))], &config);
        let mut unique = UniqueMatches::new();

        unique.observe(&idx, &config, EntityId(10), DVec3::ZERO);
        unique.observe(&idx, &config, EntityId(11), DVec3::new(-0.1, 0.0, 0.0));

        assert_eq!(unique.claim(EntityId(1)), Some((EntityId(10), 0.0)));
        let (q, d) = unique.claim(EntityId(2)).unwrap();
        assert_eq!(q, EntityId(11));
        assert!((d - 0.6).abs() < 1e-12);
        let by_query = unique.by_query();
        assert_eq!(by_query.get(&EntityId(11)).map(|m| m.0), Some(EntityId(2)));
    }

    #[test]
    fn closer_query_takes_over_a_claim() {
        let config = MatchConfig::new(0.5, 8, 1.0);
        let idx = index(&[(1, DVec3::ZERO)], &config);
        let mut unique = UniqueMatches::new();
        unique.observe(&idx, &config, EntityId(10), DVec3::new(0.3, 0.0, 0.0));
        unique.observe(&idx, &config, EntityId(11), DVec3::new(0.1, 0.0, 0.0));
        unique.observe(&idx, &config, EntityId(12), DVec3::new(0.2, 0.0, 0.0));
        assert_eq!(unique.claim(EntityId(1)).map(|c| c.0), Some(EntityId(11)));
        assert_eq!(unique.len(), 1);
    }

    #[test]
    fn closer_query_keeps_the_claimed_reference() {
        let config = MatchConfig::new(0.5, 8, 60.0);
        let idx = index(&[(1, DVec3::ZERO), (2, DVec3::new(0.5, 0.0, 0.0))], &config);
        let mut unique = UniqueMatches::new();

        unique.observe(&idx, &config, EntityId(10), DVec3::new(0.0, 0.3, 0.0));
        assert_eq!(unique.claim(EntityId(1)), Some((EntityId(10), 0.3)));
        unique.observe(&idx, &config, EntityId(11), DVec3::new(0.0, 0.1, 0.0));

        assert_eq!(unique.claim(EntityId(1)), Some((EntityId(11), 0.1)));
        assert_eq!(unique.claim(EntityId(2)), None);
    }

    #[test]
    fn tolerance_is_inclusive() {
        let config = MatchConfig::new(0.5, 8, 1.0);
        let mut set = PointSet::new();
        set.insert_ghost(EntityId(1), DVec3::ZERO);
        let idx = LocalIndex::build(&set, &[EntityId(1)], &config).unwrap();
        let mut within = ToleranceMatches::new();

        within.observe(&idx, &config, EntityId(10), DVec3::new(0.5, 0.0, 0.0));
        within.observe(&idx, &config, EntityId(11), DVec3::new(0.4, 0.4, 0.0));
        within.observe(&idx, &config, EntityId(12), DVec3::new(0.0, 0.0, 0.6));

        assert_eq!(
            within.get(EntityId(10)),
            Some(&MatchRecord {
                query: EntityId(10),
                reference: EntityId(1),
                distance: 0.5,
                reference_is_owned: false,
            })
        );
        assert!(within.get(EntityId(11)).is_none(), "in the box but too far");
        assert!(within.get(EntityId(12)).is_none(), "outside the box");
        assert_eq!(within.len(), 1);
    }

    #[test]
    fn merge_keeps_the_closer_result() {
        let record = |reference, distance| MatchRecord {
            query: EntityId(5),
            reference: EntityId(reference),
            distance,
            reference_is_owned: true,
        };
        let mut a = ToleranceMatches::new();
        a.records.insert(EntityId(5), record(1, 0.3));
        let mut b = ToleranceMatches::new();
        b.records.insert(EntityId(5), record(2, 0.1));
        a.merge(b);
        assert_eq!(a.get(EntityId(5)).map(|r| r.reference), Some(EntityId(2)));

        let mut u = UniqueMatches::new();
        u.offer(EntityId(1), EntityId(8), 0.2);
        let mut v = UniqueMatches::new();
        v.offer(EntityId(1), EntityId(9), 0.4);
        v.offer(EntityId(2), EntityId(9), 0.1);
        u.merge(v);
        assert_eq!(u.claim(EntityId(1)), Some((EntityId(8), 0.2)));
        assert_eq!(u.claim(EntityId(2)), Some((EntityId(9), 0.1)));

        let mut t = TieMatches::new(1e-9);
        t.record(EntityId(1), EntityId(8), 0.2);
        let mut s = TieMatches::new(1e-9);
        s.record(EntityId(1), EntityId(9), 0.2);
        s.record(EntityId(1), EntityId(8), 0.2);
        t.merge(s);
        assert_eq!(t.queries_of(EntityId(1)), &[EntityId(8), EntityId(9)]);
    }
}
