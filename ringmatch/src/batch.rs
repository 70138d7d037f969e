// Copyright 2025 the Ringmatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Framing of the query batch that travels around the ring.

use crate::adapter::{EntityAdapter, EntityId};
use crate::error::MatchError;
use crate::wire::{Reader, patch_u32, put_u32};

/// A framed batch of serialized entities.
///
/// Layout (little endian): `u32` entity count, then per entity a `u32` byte
/// length followed by that many bytes as produced by
/// [`EntityAdapter::serialize`]. The frame is validated once when received,
/// so iterating a batch never fails.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RingBatch {
    bytes: Vec<u8>,
    len: usize,
}

impl Default for RingBatch {
    fn default() -> Self {
        Self::empty()
    }
}

impl RingBatch {
    /// A batch with no entities.
    pub fn empty() -> Self {
        let mut bytes = Vec::with_capacity(4);
        put_u32(&mut bytes, 0);
        Self { bytes, len: 0 }
    }

    /// Serialize `ids` through `adapter`, in order.
    pub fn pack<A: EntityAdapter + ?Sized>(
        adapter: &A,
        ids: impl IntoIterator<Item = EntityId>,
    ) -> Result<Self, MatchError> {
        let mut batch = Self::empty();
        for id in ids {
            batch.push(adapter, id)?;
        }
        Ok(batch)
    }

    fn push<A: EntityAdapter + ?Sized>(&mut self, adapter: &A, id: EntityId) -> Result<(), MatchError> {
        let count = u32::try_from(self.len + 1)
            .map_err(|_| MatchError::Malformed("batch exceeds u32::MAX entities"))?;
        let at = self.bytes.len();
        put_u32(&mut self.bytes, 0);
        let start = self.bytes.len();
        let written = adapter.serialize(id, &mut self.bytes).and_then(|()| {
            u32::try_from(self.bytes.len() - start)
                .map_err(|_| MatchError::Malformed("entity payload exceeds u32::MAX bytes"))
        });
        let size = match written {
            Ok(size) => size,
            Err(e) => {
                // Drop the partial frame so the batch stays valid.
                self.bytes.truncate(at);
                return Err(e);
            }
        };
        patch_u32(&mut self.bytes, at, size);
        patch_u32(&mut self.bytes, 0, count);
        self.len += 1;
        Ok(())
    }

    /// Validate a received frame.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, MatchError> {
        let mut r = Reader::new(&bytes);
        let count = r
            .u32()
            .ok_or(MatchError::Malformed("truncated entity count"))? as usize;
        for _ in 0..count {
            let size = r
                .u32()
                .ok_or(MatchError::Malformed("truncated entity length"))? as usize;
            r.take(size)
                .ok_or(MatchError::Malformed("truncated entity payload"))?;
        }
        if !r.is_empty() {
            return Err(MatchError::Malformed("trailing bytes after last entity"));
        }
        Ok(Self { bytes, len: count })
    }

    /// Number of entities.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the batch holds no entities.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The framed bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Give up the framed bytes, e.g. to send them.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Per-entity payloads, in packing order.
    pub fn payloads(&self) -> impl Iterator<Item = &[u8]> + '_ {
        let mut r = Reader::new(&self.bytes[4..]);
        (0..self.len).map(move |_| {
            let size = r
                .u32()
                .expect("ring batch invariant violated: frame was validated") as usize;
            r.take(size)
                .expect("ring batch invariant violated: frame was validated")
        })
    }

    /// Decode every payload through `adapter`.
    pub fn decode<'a, A: EntityAdapter + ?Sized>(
        &'a self,
        adapter: &'a A,
    ) -> impl Iterator<Item = Result<(EntityId, glam::DVec3), MatchError>> + 'a {
        self.payloads().map(move |bytes| {
            adapter
                .deserialize(bytes)
                .ok_or(MatchError::Malformed("undecodable entity payload"))
        })
    }
}
