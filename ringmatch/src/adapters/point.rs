// Copyright 2025 the Ringmatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use glam::DVec3;
use hashbrown::HashMap;

use crate::adapter::{EntityAdapter, EntityId};
use crate::error::MatchError;
use crate::wire::{Reader, put_u64, put_vec3};

#[derive(Copy, Clone, Debug)]
struct PointRecord {
    position: DVec3,
    owned: bool,
}

/// Entities that are single points, keyed by id.
///
/// Wire format: `u64` id followed by three `f64` coordinates, little endian.
///
/// ```rust
/// use glam::DVec3;
/// use ringmatch::{EntityAdapter, EntityId, PointSet};
///
/// let mut nodes = PointSet::new();
/// nodes.insert_owned(EntityId(7), DVec3::new(1.0, 2.0, 3.0));
/// nodes.insert_ghost(EntityId(8), DVec3::ZERO);
///
/// assert!(nodes.has_entity(EntityId(8)));
/// assert!(!nodes.is_owner(EntityId(8)));
/// assert_eq!(nodes.owned_ids(), vec![EntityId(7)]);
///
/// let mut bytes = Vec::new();
/// nodes.serialize(EntityId(7), &mut bytes).unwrap();
/// assert_eq!(
///     PointSet::new().deserialize(&bytes),
///     Some((EntityId(7), DVec3::new(1.0, 2.0, 3.0)))
/// );
/// ```
#[derive(Clone, Debug, Default)]
pub struct PointSet {
    points: HashMap<EntityId, PointRecord>,
}

impl PointSet {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a point owned by this rank.
    pub fn insert_owned(&mut self, id: EntityId, position: DVec3) {
        self.points.insert(
            id,
            PointRecord {
                position,
                owned: true,
            },
        );
    }

    /// Add (or replace) a point available here but owned by another rank.
    pub fn insert_ghost(&mut self, id: EntityId, position: DVec3) {
        self.points.insert(
            id,
            PointRecord {
                position,
                owned: false,
            },
        );
    }

    /// Number of local points, ghosts included.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether there are no local points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Ids of all local points, ghosts included, in ascending order.
    pub fn local_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self.points.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

impl FromIterator<(EntityId, DVec3)> for PointSet {
    /// Collect owned points.
    fn from_iter<T: IntoIterator<Item = (EntityId, DVec3)>>(iter: T) -> Self {
        let mut set = Self::new();
        for (id, p) in iter {
            set.insert_owned(id, p);
        }
        set
    }
}

impl EntityAdapter for PointSet {
    fn owned_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self
            .points
            .iter()
            .filter(|(_, r)| r.owned)
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    fn has_entity(&self, id: EntityId) -> bool {
        self.points.contains_key(&id)
    }

    fn is_owner(&self, id: EntityId) -> bool {
        self.points.get(&id).is_some_and(|r| r.owned)
    }

    fn coordinate_of(&self, id: EntityId) -> Option<DVec3> {
        self.points.get(&id).map(|r| r.position)
    }

    fn serialize(&self, id: EntityId, out: &mut Vec<u8>) -> Result<(), MatchError> {
        let record = self.points.get(&id).ok_or(MatchError::EntityNotLocal(id))?;
        put_u64(out, id.0);
        put_vec3(out, record.position);
        Ok(())
    }

    fn deserialize(&self, bytes: &[u8]) -> Option<(EntityId, DVec3)> {
        let mut r = Reader::new(bytes);
        let id = r.u64()?;
        let position = r.vec3()?;
        r.is_empty().then_some((EntityId(id), position))
    }
}
