// Copyright 2025 the Ringmatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Little-endian encoding helpers shared by the ring framing and the adapters.

use byteorder::{ByteOrder, LittleEndian};
use glam::DVec3;

pub(crate) fn put_u32(out: &mut Vec<u8>, v: u32) {
    let mut buf = [0_u8; 4];
    LittleEndian::write_u32(&mut buf, v);
    out.extend_from_slice(&buf);
}

pub(crate) fn put_u64(out: &mut Vec<u8>, v: u64) {
    let mut buf = [0_u8; 8];
    LittleEndian::write_u64(&mut buf, v);
    out.extend_from_slice(&buf);
}

pub(crate) fn put_vec3(out: &mut Vec<u8>, v: DVec3) {
    let mut buf = [0_u8; 24];
    LittleEndian::write_f64_into(&v.to_array(), &mut buf);
    out.extend_from_slice(&buf);
}

/// Overwrite a `u32` previously reserved at `at`.
pub(crate) fn patch_u32(out: &mut [u8], at: usize, v: u32) {
    LittleEndian::write_u32(&mut out[at..at + 4], v);
}

/// Cursor over a byte slice; every read fails softly on truncation.
#[derive(Debug)]
pub(crate) struct Reader<'a> {
    bytes: &'a [u8],
}

impl<'a> Reader<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub(crate) fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        if self.bytes.len() < n {
            return None;
        }
        let (head, tail) = self.bytes.split_at(n);
        self.bytes = tail;
        Some(head)
    }

    pub(crate) fn u32(&mut self) -> Option<u32> {
        self.take(4).map(LittleEndian::read_u32)
    }

    pub(crate) fn u64(&mut self) -> Option<u64> {
        self.take(8).map(LittleEndian::read_u64)
    }

    pub(crate) fn vec3(&mut self) -> Option<DVec3> {
        let raw = self.take(24)?;
        let mut xyz = [0.0_f64; 3];
        LittleEndian::read_f64_into(raw, &mut xyz);
        Some(DVec3::from_array(xyz))
    }
}
