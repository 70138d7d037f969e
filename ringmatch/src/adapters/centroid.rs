// Copyright 2025 the Ringmatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use glam::DVec3;
use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::adapter::{EntityAdapter, EntityId};
use crate::error::MatchError;
use crate::wire::{Reader, put_u32, put_u64, put_vec3};

type Vertices = SmallVec<[DVec3; 8]>;

#[derive(Clone, Debug)]
struct Element {
    vertices: Vertices,
    owned: bool,
}

fn centroid(vertices: &[DVec3]) -> Option<DVec3> {
    if vertices.is_empty() {
        return None;
    }
    let sum: DVec3 = vertices.iter().copied().sum();
    Some(sum / vertices.len() as f64)
}

/// Entities made of several sub-points, located at the mean of those points.
///
/// The sub-points travel with the entity so the receiving rank computes the
/// same centroid. Wire format: `u64` id, `u32` vertex count, then the
/// vertices as `f64` triples, little endian.
///
/// An element without vertices has no coordinate; indexing or packing it
/// fails with [`MatchError::MissingCoordinate`].
#[derive(Clone, Debug, Default)]
pub struct CentroidSet {
    elements: HashMap<EntityId, Element>,
}

impl CentroidSet {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) an element owned by this rank.
    pub fn insert_owned(&mut self, id: EntityId, vertices: impl IntoIterator<Item = DVec3>) {
        self.insert(id, vertices, true);
    }

    /// Add (or replace) an element available here but owned by another rank.
    pub fn insert_ghost(&mut self, id: EntityId, vertices: impl IntoIterator<Item = DVec3>) {
        self.insert(id, vertices, false);
    }

    fn insert(&mut self, id: EntityId, vertices: impl IntoIterator<Item = DVec3>, owned: bool) {
        self.elements.insert(
            id,
            Element {
                vertices: vertices.into_iter().collect(),
                owned,
            },
        );
    }

    /// Number of local elements, ghosts included.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether there are no local elements.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// The sub-points of an element.
    pub fn vertices(&self, id: EntityId) -> Option<&[DVec3]> {
        self.elements.get(&id).map(|e| e.vertices.as_slice())
    }
}

impl EntityAdapter for CentroidSet {
    fn owned_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self
            .elements
            .iter()
            .filter(|(_, e)| e.owned)
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    fn has_entity(&self, id: EntityId) -> bool {
        self.elements.contains_key(&id)
    }

    fn is_owner(&self, id: EntityId) -> bool {
        self.elements.get(&id).is_some_and(|e| e.owned)
    }

    fn coordinate_of(&self, id: EntityId) -> Option<DVec3> {
        self.elements.get(&id).and_then(|e| centroid(&e.vertices))
    }

    fn serialize(&self, id: EntityId, out: &mut Vec<u8>) -> Result<(), MatchError> {
        let element = self.elements.get(&id).ok_or(MatchError::EntityNotLocal(id))?;
        if element.vertices.is_empty() {
            return Err(MatchError::MissingCoordinate(id));
        }
        let count = u32::try_from(element.vertices.len())
            .map_err(|_| MatchError::Malformed("element has too many vertices"))?;
        put_u64(out, id.0);
        put_u32(out, count);
        for v in &element.vertices {
            put_vec3(out, *v);
        }
        Ok(())
    }

    fn deserialize(&self, bytes: &[u8]) -> Option<(EntityId, DVec3)> {
        let mut r = Reader::new(bytes);
        let id = r.u64()?;
        let count = r.u32()? as usize;
        let mut vertices = Vertices::new();
        for _ in 0..count {
            vertices.push(r.vec3()?);
        }
        if !r.is_empty() {
            return None;
        }
        centroid(&vertices).map(|c| (EntityId(id), c))
    }
}
