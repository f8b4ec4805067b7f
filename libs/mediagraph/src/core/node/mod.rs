// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

#[allow(clippy::module_inception)]
mod node;
mod node_id;
mod node_info;

pub use node::{Node, NodeBuilder};
pub use node_id::NodeUniqueId;
pub use node_info::{ChangeMask, NodeInfo, NodeState};
