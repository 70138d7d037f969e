// Copyright 2025 the Ringmatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The capability set the matching core needs from its host.

use core::fmt;

use glam::DVec3;

use crate::error::MatchError;

/// Global entity identifier, unique across ranks.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for EntityId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Host-side view of a distributed entity collection.
///
/// The tree and the ring protocol are written once against this trait. An
/// entity may be *local* on several ranks (owned on one, ghosted on others)
/// but is *owned* by exactly one.
///
/// Coordinates are read once per matching pass and not cached across passes.
pub trait EntityAdapter {
    /// Ids of the entities this rank owns.
    fn owned_ids(&self) -> Vec<EntityId>;

    /// Whether the entity is available on this rank, owned or ghosted.
    fn has_entity(&self, id: EntityId) -> bool;

    /// Whether this rank owns the entity.
    fn is_owner(&self, id: EntityId) -> bool;

    /// The point representing the entity, if it is local.
    fn coordinate_of(&self, id: EntityId) -> Option<DVec3>;

    /// Append a self-contained encoding of the entity to `out`.
    ///
    /// The bytes must be enough for [`deserialize`](Self::deserialize) on any
    /// rank to recover the id and the coordinate.
    fn serialize(&self, id: EntityId, out: &mut Vec<u8>) -> Result<(), MatchError>;

    /// Decode an entity produced by [`serialize`](Self::serialize), possibly on
    /// another rank. `None` if the bytes are not a valid encoding.
    fn deserialize(&self, bytes: &[u8]) -> Option<(EntityId, DVec3)>;
}

impl<A: EntityAdapter + ?Sized> EntityAdapter for &A {
    fn owned_ids(&self) -> Vec<EntityId> {
        (**self).owned_ids()
    }

    fn has_entity(&self, id: EntityId) -> bool {
        (**self).has_entity(id)
    }

    fn is_owner(&self, id: EntityId) -> bool {
        (**self).is_owner(id)
    }

    fn coordinate_of(&self, id: EntityId) -> Option<DVec3> {
        (**self).coordinate_of(id)
    }

    fn serialize(&self, id: EntityId, out: &mut Vec<u8>) -> Result<(), MatchError> {
        (**self).serialize(id, out)
    }

    fn deserialize(&self, bytes: &[u8]) -> Option<(EntityId, DVec3)> {
        (**self).deserialize(bytes)
    }
}
