// Copyright 2025 the Ringmatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Primitive geometry types.

use glam::DVec3;

/// Axis-aligned bounding box in 3D.
///
/// Boxes are padded by a tolerance when they are built from points. The
/// containment test itself is exact, so the padding is applied once, at
/// construction, and never again at query time.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BoundingBox {
    /// Minimum corner.
    pub min: DVec3,
    /// Maximum corner.
    pub max: DVec3,
}

impl BoundingBox {
    /// Create a box from its min/max corners.
    #[inline(always)]
    pub const fn new(min: DVec3, max: DVec3) -> Self {
        Self { min, max }
    }

    /// The box `point ± tol` on every axis.
    #[inline]
    pub fn around(point: DVec3, tol: f64) -> Self {
        let pad = DVec3::splat(tol);
        Self {
            min: point - pad,
            max: point + pad,
        }
    }

    /// Grow the box so that it contains `point ± tol` on every axis.
    #[inline]
    pub fn expand_to_include(&mut self, point: DVec3, tol: f64) {
        let pad = DVec3::splat(tol);
        self.min = self.min.min(point - pad);
        self.max = self.max.max(point + pad);
    }

    /// Whether the point lies in the box, boundary included.
    ///
    /// Any NaN component makes the point lie outside.
    ///
    /// # Examples
    ///
    /// ```
    /// use glam::DVec3;
    /// use ringmatch_octree::BoundingBox;
    ///
    /// let bb = BoundingBox::around(DVec3::ZERO, 0.5);
    /// assert!(bb.contains(DVec3::new(0.5, 0.0, -0.5)));
    /// assert!(!bb.contains(DVec3::new(0.5 + 1e-9, 0.0, 0.0)));
    /// ```
    #[inline]
    pub fn contains(&self, point: DVec3) -> bool {
        self.min.cmple(point).all() && point.cmple(self.max).all()
    }

    /// Whether `other` lies entirely inside this box.
    #[inline]
    pub fn contains_box(&self, other: &Self) -> bool {
        self.min.cmple(other.min).all() && other.max.cmple(self.max).all()
    }

    /// The smallest box enclosing both boxes.
    #[inline]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Edge lengths per axis.
    #[inline]
    pub fn extent(&self) -> DVec3 {
        self.max - self.min
    }

    /// Split the box at `cut` along `axis`, leaving a `2 * tol` overlap between
    /// the lower and the upper half. Both halves stay inside `self`.
    pub(crate) fn split(&self, axis: usize, cut: f64, tol: f64) -> (Self, Self) {
        let mut lower = *self;
        let mut upper = *self;
        lower.max[axis] = (cut + tol).min(self.max[axis]);
        upper.min[axis] = (cut - tol).max(self.min[axis]);
        (lower, upper)
    }
}
