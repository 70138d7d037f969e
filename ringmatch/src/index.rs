// Copyright 2025 the Ringmatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The per-rank reference index.

use glam::DVec3;
use hashbrown::HashSet;
use ringmatch_octree::{BoundingBox, SpatialTree};
use smallvec::SmallVec;

use crate::adapter::{EntityAdapter, EntityId};
use crate::config::MatchConfig;
use crate::error::MatchError;

/// Reference entities available on one rank, indexed for closest-point
/// lookups.
///
/// A rank without reference entities has no tree and no opinion on any
/// query point.
#[derive(Debug)]
pub struct LocalIndex {
    tree: Option<SpatialTree<EntityId>>,
    owned: HashSet<EntityId>,
    plane_point: Option<DVec3>,
    band: f64,
}

impl LocalIndex {
    /// Index `reference_ids`, all of which must be local to `adapter`.
    ///
    /// Repeated ids are indexed once. Coordinates are read here and frozen
    /// for the lifetime of the index.
    pub fn build<A: EntityAdapter + ?Sized>(
        adapter: &A,
        reference_ids: &[EntityId],
        config: &MatchConfig,
    ) -> Result<Self, MatchError> {
        config.validate()?;

        let mut seen = HashSet::with_capacity(reference_ids.len());
        let mut entries = Vec::with_capacity(reference_ids.len());
        let mut owned = HashSet::new();
        for &id in reference_ids {
            if !adapter.has_entity(id) {
                return Err(MatchError::EntityNotLocal(id));
            }
            if !seen.insert(id) {
                continue;
            }
            let p = adapter
                .coordinate_of(id)
                .ok_or(MatchError::MissingCoordinate(id))?;
            if adapter.is_owner(id) {
                owned.insert(id);
            }
            entries.push((id, p));
        }

        let plane_point = entries.first().map(|&(_, p)| p);
        let tree = if entries.is_empty() {
            log::debug!("no reference entities on this rank; index is empty");
            None
        } else {
            let tree = SpatialTree::build(entries, config.max_leaf_size, config.tolerance)?;
            log::debug!(
                "indexed {} reference entities ({} owned): {} nodes, {} leaves, depth {}",
                tree.len(),
                owned.len(),
                tree.node_count(),
                tree.leaves().count(),
                tree.depth(),
            );
            Some(tree)
        };

        Ok(Self {
            tree,
            owned,
            plane_point,
            band: config.band(),
        })
    }

    /// Number of indexed reference entities.
    pub fn len(&self) -> usize {
        self.tree.as_ref().map_or(0, SpatialTree::len)
    }

    /// Whether nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.tree.is_none()
    }

    /// The underlying tree, if any.
    pub fn tree(&self) -> Option<&SpatialTree<EntityId>> {
        self.tree.as_ref()
    }

    /// Box covered by the index.
    pub fn coverage(&self) -> Option<BoundingBox> {
        self.tree.as_ref().map(SpatialTree::root_bounds)
    }

    /// Whether `x` lies in the covered box.
    pub fn contains(&self, x: DVec3) -> bool {
        self.tree.as_ref().is_some_and(|t| t.is_point_in_box(x))
    }

    /// Whether this rank owns the reference entity `id`.
    pub fn is_owned(&self, id: EntityId) -> bool {
        self.owned.contains(&id)
    }

    /// Coordinate of the first indexed reference entity; the point on the
    /// reference plane for [`PlaneTransform`](crate::PlaneTransform).
    pub fn reference_plane_point(&self) -> Option<DVec3> {
        self.plane_point
    }

    /// Closest local reference entity to `x`, or `None` if `x` is outside
    /// the covered box.
    pub fn closest(&self, x: DVec3, want_second_best: bool) -> Option<(EntityId, f64)> {
        let tree = self.tree.as_ref()?;
        tree.nearest(x, self.band, want_second_best)
    }

    /// Reference entities in `x`'s leaf whose distance is within `eps` of
    /// `distance`.
    pub fn ties(&self, x: DVec3, distance: f64, eps: f64) -> SmallVec<[(EntityId, f64); 4]> {
        self.tree
            .as_ref()
            .and_then(|tree| tree.descend_to_leaf(x))
            .map(|leaf| leaf.ties(x, distance, eps).collect())
            .unwrap_or_default()
    }
}
