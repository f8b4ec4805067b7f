// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::core::properties::Properties;

bitflags! {
    /// Which parts of [`NodeInfo`] changed since listeners were last told.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct ChangeMask: u32 {
        const MAX_INPUT_PORTS = 1 << 0;
        const INPUT_PORTS = 1 << 1;
        const MAX_OUTPUT_PORTS = 1 << 2;
        const OUTPUT_PORTS = 1 << 3;
        const STATE = 1 << 4;
        const PROPS = 1 << 5;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum NodeState {
    /// Constructed; ports may still be pending an asynchronous bring-up.
    #[default]
    Init,
    /// Ports created and the node is visible in the registry.
    Registered,
}

impl std::fmt::Display for NodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeState::Init => write!(f, "init"),
            NodeState::Registered => write!(f, "registered"),
        }
    }
}

/// Public description of a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub name: String,
    pub max_input_ports: u32,
    pub n_input_ports: u32,
    pub max_output_ports: u32,
    pub n_output_ports: u32,
    pub state: NodeState,
    pub change_mask: ChangeMask,
    pub properties: Properties,
}

impl NodeInfo {
    pub fn new(name: impl Into<String>, properties: Properties) -> Self {
        Self {
            name: name.into(),
            properties,
            ..Default::default()
        }
    }
}
