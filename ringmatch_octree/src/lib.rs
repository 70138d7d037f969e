// Copyright 2025 the Ringmatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Ringmatch Octree: an adaptively split 3D bounding-box tree for closest-point
//! lookups over a fixed, local point set.
//!
//! - Build once from `(id, position)` pairs with a padding tolerance and a
//!   maximum leaf size.
//! - Test whether a point lies in the covered region.
//! - Descend to the leaf containing a point and scan it for the closest entry,
//!   with a distance band that treats near-equal candidates as ties.
//!
//! The tree is binary: every split cuts one axis at the centroid of the node's
//! points, on the axis where that centroid sits farthest from the box faces.
//! Sibling boxes overlap by twice the tolerance and entries in that band are
//! stored on both sides. A closest-point lookup is a single root-to-leaf walk
//! followed by a linear scan, so it only answers reliably for query points
//! lying close to an indexed point, which is what point matching needs.
//!
//! Nodes live in an arena and are addressed by [`NodeIndex`]; the structure is
//! immutable after [`SpatialTree::build`].
//!
//! # Example
//!
//! ```rust
//! use glam::DVec3;
//! use ringmatch_octree::{BoundingBox, SpatialTree};
//!
//! let points = (0..64_u32).map(|i| {
//!     let p = DVec3::new((i % 4) as f64, ((i / 4) % 4) as f64, (i / 16) as f64);
//!     (i, p)
//! });
//! let tree = SpatialTree::build(points, 4, 1e-6).unwrap();
//!
//! let x = DVec3::new(2.0, 1.0, 3.0);
//! assert!(tree.is_point_in_box(x));
//! let leaf = tree.descend_to_leaf(x).unwrap();
//! assert!(leaf.len() <= 4);
//! let (id, dist) = leaf.closest(x, 1e-9, false);
//! assert_eq!((id, dist), (2 + 4 + 48, 0.0));
//!
//! // The root box is the point cloud padded by the tolerance.
//! let expected = BoundingBox::new(DVec3::splat(-1e-6), DVec3::splat(3.0 + 1e-6));
//! assert_eq!(tree.root_bounds(), expected);
//! ```
//!
//! ### Float semantics
//!
//! Positions must be finite; [`SpatialTree::build`] rejects NaN and infinite
//! coordinates. A query point with a NaN component is outside every box.

mod error;
mod tree;
mod types;

pub use error::BuildError;
pub use tree::{Leaf, MAX_DEPTH, NodeIndex, SpatialTree};
pub use types::BoundingBox;
