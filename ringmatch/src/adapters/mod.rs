// Copyright 2025 the Ringmatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Ready-made [`EntityAdapter`](crate::EntityAdapter) implementations.
//!
//! - [`PointSet`]: each entity is a single point (mesh nodes).
//! - [`CentroidSet`]: each entity is a group of sub-points and is located at
//!   their centroid (mesh elements).

mod centroid;
mod point;

pub use centroid::CentroidSet;
pub use point::PointSet;
