// Copyright 2025 the Ringmatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error type shared by indexing, the ring exchange and the matching API.

use ringmatch_octree::BuildError;
use thiserror::Error;

use crate::adapter::EntityId;

/// Errors that abort a matching pass.
///
/// Nothing here is retried. Configuration and contract errors point at the
/// caller; protocol and transport errors point at the communication layer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MatchError {
    /// A configuration value is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    /// The adapter does not know an id it was asked about on this rank.
    #[error("entity {0} is neither owned nor ghosted on this rank")]
    EntityNotLocal(EntityId),

    /// An entity has no usable coordinate.
    #[error("entity {0} has no coordinate")]
    MissingCoordinate(EntityId),

    /// Building the local tree failed.
    #[error(transparent)]
    Build(#[from] BuildError),

    /// The receive buffer still held data when a new receive was posted.
    #[error("receive buffer not empty before round {round} ({len} bytes left)")]
    ReceiveBufferNotEmpty {
        /// Round about to receive.
        round: usize,
        /// Bytes found in the buffer.
        len: usize,
    },

    /// A message arrived from someone other than the ring predecessor.
    #[error("expected a message from rank {expected}, got source {source_rank} with tag {tag}")]
    UnexpectedSender {
        /// The predecessor rank.
        expected: usize,
        /// Rank the message came from.
        source_rank: usize,
        /// Tag carried by the message.
        tag: usize,
    },

    /// A ring message or entity payload could not be decoded.
    #[error("malformed ring message: {0}")]
    Malformed(&'static str),

    /// The transport failed (e.g. a peer hung up).
    #[error("transport failure: {0}")]
    Transport(String),

    /// A matching pass was started before [`Matcher::build_index`](crate::Matcher::build_index).
    #[error("no local index; call build_index first")]
    IndexNotBuilt,
}
