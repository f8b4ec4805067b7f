// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Per-cycle buffer exchange slot.
//!
//! A slot is the `{status, buffer}` pair a port exposes to the scheduler. The
//! real port, its adapter's internal port and (for links) the two halves of a
//! link share one slot through an `Arc<IoSlot>`; copying a descriptor between
//! two slots is how buffers move across the graph.
//!
//! The pair is packed into a single `AtomicU64` so the data thread can read
//! and write it without locking. Writers follow a single-writer-per-phase
//! discipline (producer on the produce phase, consumer/adapter on the demand
//! phase); concurrent writers within one phase are a protocol violation and
//! are not detected here.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Identifier of a buffer within the buffer set installed on a port.
///
/// `u32::MAX` is reserved: a slot stores it to mean "no buffer", so a buffer
/// carrying it would read back as empty. Ports refuse buffer sets that use it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BufferId(pub u32);

impl BufferId {
    /// Reserved id meaning "no buffer".
    pub const INVALID: BufferId = BufferId(u32::MAX);

    /// `None` for the reserved value.
    pub const fn new(raw: u32) -> Option<Self> {
        if raw == Self::INVALID.0 {
            None
        } else {
            Some(Self(raw))
        }
    }

    pub const fn is_valid(self) -> bool {
        self.0 != Self::INVALID.0
    }
}

impl std::fmt::Display for BufferId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status half of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SlotStatus {
    /// Nothing pending; a consumed slot goes back to this.
    #[default]
    Ok,
    /// The consumer wants a buffer.
    NeedBuffer,
    /// The producer placed a buffer in the slot.
    HaveBuffer,
}

impl SlotStatus {
    fn to_raw(self) -> u32 {
        match self {
            SlotStatus::Ok => 0,
            SlotStatus::NeedBuffer => 1,
            SlotStatus::HaveBuffer => 2,
        }
    }

    fn from_raw(raw: u32) -> Self {
        match raw {
            1 => SlotStatus::NeedBuffer,
            2 => SlotStatus::HaveBuffer,
            _ => SlotStatus::Ok,
        }
    }
}

/// Plain-value snapshot of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BufferSlot {
    pub status: SlotStatus,
    pub buffer_id: Option<BufferId>,
}

impl BufferSlot {
    pub const fn new(status: SlotStatus, buffer_id: Option<BufferId>) -> Self {
        Self { status, buffer_id }
    }

    /// A slot carrying `buffer_id` ready for the consumer.
    pub const fn have(buffer_id: BufferId) -> Self {
        Self::new(SlotStatus::HaveBuffer, Some(buffer_id))
    }

    /// An empty slot asking for a buffer.
    pub const fn need() -> Self {
        Self::new(SlotStatus::NeedBuffer, None)
    }

    /// The state a slot is left in after its buffer was taken.
    pub const fn consumed() -> Self {
        Self::new(SlotStatus::Ok, None)
    }

    fn pack(self) -> u64 {
        let id = self.buffer_id.unwrap_or(BufferId::INVALID).0;
        (u64::from(self.status.to_raw()) << 32) | u64::from(id)
    }

    fn unpack(raw: u64) -> Self {
        let status = SlotStatus::from_raw((raw >> 32) as u32);
        let id = raw as u32;
        let buffer_id = BufferId::new(id);
        Self { status, buffer_id }
    }
}

/// Lock-free shared slot.
#[derive(Debug)]
pub struct IoSlot(AtomicU64);

impl IoSlot {
    /// A fresh slot: status `Ok`, no buffer.
    pub fn new() -> Self {
        Self(AtomicU64::new(BufferSlot::consumed().pack()))
    }

    pub fn load(&self) -> BufferSlot {
        BufferSlot::unpack(self.0.load(Ordering::Acquire))
    }

    pub fn store(&self, slot: BufferSlot) {
        self.0.store(slot.pack(), Ordering::Release);
    }

    pub fn status(&self) -> SlotStatus {
        self.load().status
    }

    /// Overwrite only the status, keeping the buffer id.
    pub fn set_status(&self, status: SlotStatus) {
        let mut slot = self.load();
        slot.status = status;
        self.store(slot);
    }
}

impl Default for IoSlot {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_slot_is_empty() {
        let slot = IoSlot::new();
        assert_eq!(slot.load(), BufferSlot::consumed());
    }

    #[test]
    fn test_store_load_preserves_descriptor() {
        let slot = IoSlot::new();
        slot.store(BufferSlot::have(BufferId(7)));
        assert_eq!(slot.status(), SlotStatus::HaveBuffer);
        assert_eq!(slot.load().buffer_id, Some(BufferId(7)));

        slot.set_status(SlotStatus::NeedBuffer);
        assert_eq!(slot.load(), BufferSlot::new(SlotStatus::NeedBuffer, Some(BufferId(7))));
    }

    #[test]
    fn test_reserved_id_is_not_a_buffer() {
        assert_eq!(BufferId::new(u32::MAX), None);
        assert!(!BufferId::INVALID.is_valid());
        assert_eq!(BufferId::new(u32::MAX - 1), Some(BufferId(u32::MAX - 1)));

        let slot = IoSlot::new();
        slot.store(BufferSlot::have(BufferId(u32::MAX - 1)));
        assert_eq!(slot.load().buffer_id, Some(BufferId(u32::MAX - 1)));
    }
}
