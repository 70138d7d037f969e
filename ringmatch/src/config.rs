// Copyright 2025 the Ringmatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Matching parameters and the optional query-coordinate transform.

use glam::DVec3;

use crate::error::MatchError;

bitflags::bitflags! {
    /// Coordinate axes; two of them select a plane.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Axes: u8 {
        /// The x axis.
        const X = 0b0000_0001;
        /// The y axis.
        const Y = 0b0000_0010;
        /// The z axis.
        const Z = 0b0000_0100;
        /// The xy plane (normal z).
        const XY = Self::X.bits() | Self::Y.bits();
        /// The xz plane (normal y).
        const XZ = Self::X.bits() | Self::Z.bits();
        /// The yz plane (normal x).
        const YZ = Self::Y.bits() | Self::Z.bits();
    }
}

impl Axes {
    /// Index of the one axis not in the set, if the set is exactly a plane.
    pub fn normal_axis(self) -> Option<usize> {
        if self == Self::YZ {
            Some(0)
        } else if self == Self::XZ {
            Some(1)
        } else if self == Self::XY {
            Some(2)
        } else {
            None
        }
    }
}

/// Rotations smaller than this are treated as no rotation.
const MIN_ROTATION: f64 = 1e-13;

/// Transform applied to query coordinates before they are looked up.
///
/// Used for periodic boundaries: the query side is rotated about the z axis
/// onto the reference side, then its coordinate normal to `plane` is replaced
/// with the reference plane's, so only the in-plane position is compared.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct PlaneTransform {
    /// Rotation about the z axis, in radians.
    pub rotation_angle: f64,
    /// Plane whose normal coordinate is taken from the reference side.
    pub plane: Option<Axes>,
}

impl PlaneTransform {
    /// No rotation, no plane.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the rotation about the z axis.
    pub fn with_rotation(mut self, angle: f64) -> Self {
        self.rotation_angle = angle;
        self
    }

    /// Set the plane.
    pub fn with_plane(mut self, plane: Axes) -> Self {
        self.plane = Some(plane);
        self
    }

    /// Check that the plane (if any) leaves exactly one normal axis.
    pub fn validate(&self) -> Result<(), MatchError> {
        if !self.rotation_angle.is_finite() {
            return Err(MatchError::InvalidConfig("rotation angle must be finite"));
        }
        if let Some(plane) = self.plane
            && plane.normal_axis().is_none()
        {
            return Err(MatchError::InvalidConfig("plane must name exactly two axes"));
        }
        Ok(())
    }

    /// Transform a query coordinate.
    ///
    /// `plane_point` is a point on the reference plane; without one the
    /// normal coordinate is left alone.
    ///
    /// ```rust
    /// use glam::DVec3;
    /// use ringmatch::{Axes, PlaneTransform};
    ///
    /// let t = PlaneTransform::new().with_plane(Axes::XY);
    /// let x = t.apply(DVec3::new(1.0, 2.0, -4.0), Some(DVec3::new(9.0, 9.0, 0.5)));
    /// assert_eq!(x, DVec3::new(1.0, 2.0, 0.5));
    /// ```
    pub fn apply(&self, x: DVec3, plane_point: Option<DVec3>) -> DVec3 {
        let mut out = x;
        let a = self.rotation_angle;
        if a.abs() >= MIN_ROTATION {
            let (sin, cos) = a.sin_cos();
            out.x = x.x * cos + x.y * sin;
            out.y = -x.x * sin + x.y * cos;
        }
        if let (Some(axis), Some(p)) = (self.plane.and_then(Axes::normal_axis), plane_point) {
            out[axis] = p[axis];
        }
        out
    }
}

/// Parameters of a matching pass.
///
/// `tolerance`, `max_leaf_size` and `element_size` have no sensible defaults
/// and are required by [`new`](Self::new); the rest default to the values
/// used for mesh coupling.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MatchConfig {
    /// Box padding for the local tree, also the acceptance distance of
    /// [`Matcher::match_within_tolerance`](crate::Matcher::match_within_tolerance).
    pub tolerance: f64,
    /// Largest leaf the tree builder leaves unsplit.
    pub max_leaf_size: usize,
    /// Characteristic entity size; scales the leaf-scan tie band.
    pub element_size: f64,
    /// Absolute distance under which two matches count as tied when
    /// collecting ties. Default `1e-9`.
    pub tie_epsilon: f64,
    /// Leaf-scan tie band as a fraction of `element_size`. Default `1e-2`.
    pub band_factor: f64,
    /// Optional query transform.
    pub transform: Option<PlaneTransform>,
}

impl MatchConfig {
    /// Default for [`tie_epsilon`](Self::tie_epsilon).
    pub const DEFAULT_TIE_EPSILON: f64 = 1e-9;
    /// Default for [`band_factor`](Self::band_factor).
    pub const DEFAULT_BAND_FACTOR: f64 = 1e-2;

    /// Configuration with the given required values and default tie settings.
    pub fn new(tolerance: f64, max_leaf_size: usize, element_size: f64) -> Self {
        Self {
            tolerance,
            max_leaf_size,
            element_size,
            tie_epsilon: Self::DEFAULT_TIE_EPSILON,
            band_factor: Self::DEFAULT_BAND_FACTOR,
            transform: None,
        }
    }

    /// Override the tie epsilon.
    pub fn with_tie_epsilon(mut self, eps: f64) -> Self {
        self.tie_epsilon = eps;
        self
    }

    /// Override the band factor.
    pub fn with_band_factor(mut self, factor: f64) -> Self {
        self.band_factor = factor;
        self
    }

    /// Transform query coordinates before lookup.
    pub fn with_transform(mut self, transform: PlaneTransform) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Distance band used by the leaf scan.
    pub fn band(&self) -> f64 {
        self.band_factor * self.element_size
    }

    /// Apply the configured transform, if any.
    pub fn transform_query(&self, x: DVec3, plane_point: Option<DVec3>) -> DVec3 {
        match &self.transform {
            Some(t) => t.apply(x, plane_point),
            None => x,
        }
    }

    /// Reject unusable values.
    pub fn validate(&self) -> Result<(), MatchError> {
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(MatchError::InvalidConfig("tolerance must be finite and non-negative"));
        }
        if self.max_leaf_size == 0 {
            return Err(MatchError::InvalidConfig("max_leaf_size must be at least 1"));
        }
        if !self.element_size.is_finite() || self.element_size <= 0.0 {
            return Err(MatchError::InvalidConfig("element_size must be finite and positive"));
        }
        if !self.tie_epsilon.is_finite() || self.tie_epsilon < 0.0 {
            return Err(MatchError::InvalidConfig("tie_epsilon must be finite and non-negative"));
        }
        if !self.band_factor.is_finite() || self.band_factor < 0.0 {
            return Err(MatchError::InvalidConfig("band_factor must be finite and non-negative"));
        }
        match &self.transform {
            Some(t) => t.validate(),
            None => Ok(()),
        }
    }
}
