// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use serde::{Deserialize, Serialize};

/// Negotiation/lifecycle state of a [`Port`](super::Port).
///
/// States are ordered; the buffer operations compare against them
/// (`UseBuffers` with a non-empty set needs at least `Ready`, anything past
/// `Paused` is paused on the data thread before buffers are swapped).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum PortState {
    /// Created, not yet attached to a node.
    #[default]
    Init,
    /// Attached, waiting for a format.
    Configure,
    /// Format negotiated, no buffers.
    Ready,
    /// Buffers installed, not processing.
    Paused,
    /// Driven by the scheduler.
    Streaming,
}

impl std::fmt::Display for PortState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::Configure => write!(f, "configure"),
            Self::Ready => write!(f, "ready"),
            Self::Paused => write!(f, "paused"),
            Self::Streaming => write!(f, "streaming"),
        }
    }
}
