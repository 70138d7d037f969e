// Copyright 2025 the Ringmatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Errors reported while building a tree.

use thiserror::Error;

use crate::tree::MAX_DEPTH;

/// Errors that abort [`SpatialTree::build`](crate::SpatialTree::build).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildError {
    /// The tree was asked to index nothing.
    #[error("cannot build a tree without entries")]
    NoEntries,

    /// A leaf must be allowed to hold at least one entry.
    #[error("max_leaf_size must be at least 1")]
    ZeroLeafSize,

    /// The padding tolerance is negative or not finite.
    #[error("tolerance must be finite and non-negative, got {0}")]
    InvalidTolerance(f64),

    /// An entry has a NaN or infinite coordinate.
    #[error("entry {index} has a non-finite position")]
    NonFinitePosition {
        /// Position of the offending entry in the input.
        index: usize,
    },

    /// Splitting did not converge before the depth ceiling.
    ///
    /// This is what coincident points under a small `max_leaf_size` produce.
    #[error("tree exceeds the maximum depth of {MAX_DEPTH} with {entries} entries left to split")]
    DepthExceeded {
        /// Entries held by the node that could not be placed.
        entries: usize,
    },
}
