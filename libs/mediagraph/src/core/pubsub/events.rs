// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use serde::{Deserialize, Serialize};

use crate::core::graph::PortId;
use crate::core::implementation::AsyncSeq;
use crate::core::node::ChangeMask;
use crate::core::port::{Direction, PortState};
use crate::core::properties::Properties;

/// Events emitted by a [`Port`](crate::core::port::Port).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PortEvent {
    StateChanged { old: PortState, new: PortState },
    PropertiesChanged(Properties),
    /// The port is about to be detached and removed from its node.
    Destroy,
    /// The port left its node; its buffers are released right after.
    Free,
}

/// Events emitted by a [`Node`](crate::core::node::Node).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeEvent {
    PortAdded {
        direction: Direction,
        port_id: PortId,
    },
    PortRemoved {
        direction: Direction,
        port_id: PortId,
    },
    InfoChanged(ChangeMask),
    AsyncComplete {
        seq: AsyncSeq,
        result: std::result::Result<(), String>,
    },
    Destroy,
    Free,
}

/// Events emitted by the [`Registry`](crate::core::registry::Registry).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistryEvent {
    ObjectAdded { id: u32, kind: String },
    ObjectRemoved { id: u32 },
}
