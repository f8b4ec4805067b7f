// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::slot::BufferId;
use crate::core::error::{GraphError, Result};

/// Descriptor of one buffer. Memory behind it is managed by whoever
/// allocated the set; the kernel only moves ids between slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Buffer {
    pub id: BufferId,
    /// Size in bytes of the data area.
    pub size: u32,
}

impl Buffer {
    pub fn new(id: u32, size: u32) -> Self {
        Self {
            id: BufferId(id),
            size,
        }
    }
}

/// Allocation parameters handed to the implementation by `AllocateBuffers`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocParam {
    pub size: u32,
    pub stride: u32,
    pub min_buffers: u32,
    pub max_buffers: u32,
    pub align: u32,
}

impl Default for AllocParam {
    fn default() -> Self {
        Self {
            size: 4096,
            stride: 0,
            min_buffers: 2,
            max_buffers: 32,
            align: 16,
        }
    }
}

/// The buffer set live on a port. Ownership is binary.
#[derive(Debug)]
pub enum BufferSet {
    /// Supplied by the caller through `UseBuffers`; never freed here, the
    /// port only drops its reference.
    External(Arc<[Buffer]>),
    /// Allocated by the implementation through `AllocateBuffers`; owned by
    /// the port and freed at the next reconfiguration or port destruction.
    Allocated(Vec<Buffer>),
}

impl BufferSet {
    pub fn buffers(&self) -> &[Buffer] {
        match self {
            BufferSet::External(buffers) => buffers,
            BufferSet::Allocated(buffers) => buffers,
        }
    }

    pub fn len(&self) -> usize {
        self.buffers().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers().is_empty()
    }

    pub fn is_allocated(&self) -> bool {
        matches!(self, BufferSet::Allocated(_))
    }

    /// Refuse a set containing the reserved [`BufferId::INVALID`].
    pub fn check_ids(buffers: &[Buffer]) -> Result<()> {
        match buffers.iter().find(|b| !b.id.is_valid()) {
            Some(buffer) => Err(GraphError::InvalidState(format!(
                "buffer id {} is reserved",
                buffer.id
            ))),
            None => Ok(()),
        }
    }
}
