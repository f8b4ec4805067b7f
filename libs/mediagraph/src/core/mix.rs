// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Per-port mix/tee scheduling adapter.
//!
//! Every [`Port`](crate::core::port::Port) owns one adapter node in the
//! scheduling graph. The adapter has one internal port that shares the real
//! port's slot, plus one external port per link. An output port gets a tee
//! (one upstream buffer fanned out to every link), an input port gets a mix
//! (the first ready link feeds the consumer).
//!
//! Zero links on a tee is an idle state, not a fault: the tee answers
//! NEED_BUFFER upstream, writes nothing downstream and is asked again on the
//! next cycle. `idle_cycles` counts consecutive cycles spent that way.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::buffers::{BufferSlot, IoSlot, SlotStatus};
use crate::core::graph::{LinkId, ScheduleCallbacks};
use crate::core::port::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MixKind {
    /// Fan-out, owned by an output port.
    Tee,
    /// Fan-in, owned by an input port.
    Mix,
}

impl MixKind {
    pub fn for_direction(direction: Direction) -> Self {
        match direction {
            Direction::Output => MixKind::Tee,
            Direction::Input => MixKind::Mix,
        }
    }
}

impl std::fmt::Display for MixKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MixKind::Tee => write!(f, "tee"),
            MixKind::Mix => write!(f, "mix"),
        }
    }
}

#[derive(Debug)]
pub struct MixAdapter {
    kind: MixKind,
    internal: Arc<IoSlot>,
    /// External link ports in attachment order.
    links: Vec<(LinkId, Arc<IoSlot>)>,
    idle_cycles: u64,
}

impl MixAdapter {
    /// Build the adapter for a port of `direction` whose slot is `internal`.
    pub fn new(direction: Direction, internal: Arc<IoSlot>) -> Self {
        Self {
            kind: MixKind::for_direction(direction),
            internal,
            links: Vec::new(),
            idle_cycles: 0,
        }
    }

    pub fn kind(&self) -> MixKind {
        self.kind
    }

    pub fn internal_slot(&self) -> &Arc<IoSlot> {
        &self.internal
    }

    pub fn add_link(&mut self, link_id: LinkId, slot: Arc<IoSlot>) {
        self.links.push((link_id, slot));
    }

    pub fn remove_link(&mut self, link_id: &LinkId) -> Option<Arc<IoSlot>> {
        let pos = self.links.iter().position(|(id, _)| id == link_id)?;
        Some(self.links.remove(pos).1)
    }

    pub fn link_ids(&self) -> impl Iterator<Item = &LinkId> {
        self.links.iter().map(|(id, _)| id)
    }

    pub fn n_links(&self) -> usize {
        self.links.len()
    }

    /// Consecutive produce calls a tee spent with no links.
    pub fn idle_cycles(&self) -> u64 {
        self.idle_cycles
    }

    fn tee_produce(&mut self) -> SlotStatus {
        if self.links.is_empty() {
            self.internal.set_status(SlotStatus::NeedBuffer);
            self.idle_cycles += 1;
            if self.idle_cycles == 1 {
                tracing::trace!("[mix] tee idle, no links");
            }
            return SlotStatus::NeedBuffer;
        }

        let descriptor = self.internal.load();
        tracing::trace!(?descriptor, links = self.links.len(), "[mix] tee fan-out");
        for (_, slot) in &self.links {
            slot.store(descriptor);
        }
        self.internal.store(BufferSlot::consumed());
        self.idle_cycles = 0;
        SlotStatus::HaveBuffer
    }

    fn tee_demand(&mut self) -> SlotStatus {
        let mut descriptor = match self.links.first() {
            Some((_, slot)) => slot.load(),
            None => self.internal.load(),
        };
        descriptor.status = SlotStatus::NeedBuffer;
        self.internal.store(descriptor);
        SlotStatus::NeedBuffer
    }

    fn mix_produce(&mut self) -> SlotStatus {
        let ready = self
            .links
            .iter()
            .find(|(_, slot)| slot.status() == SlotStatus::HaveBuffer);

        match ready {
            Some((link_id, slot)) => {
                let descriptor = slot.load();
                tracing::trace!(link = %link_id, ?descriptor, "[mix] mix take");
                self.internal.store(descriptor);
                slot.store(BufferSlot::consumed());
                SlotStatus::HaveBuffer
            }
            None => SlotStatus::NeedBuffer,
        }
    }

    fn mix_demand(&mut self) -> SlotStatus {
        let mut descriptor = self.internal.load();
        descriptor.status = SlotStatus::NeedBuffer;
        for (_, slot) in &self.links {
            slot.store(descriptor);
        }
        self.internal.store(BufferSlot::need());
        SlotStatus::NeedBuffer
    }
}

impl ScheduleCallbacks for MixAdapter {
    fn on_produce(&mut self) -> SlotStatus {
        match self.kind {
            MixKind::Tee => self.tee_produce(),
            MixKind::Mix => self.mix_produce(),
        }
    }

    fn on_demand(&mut self) -> SlotStatus {
        match self.kind {
            MixKind::Tee => self.tee_demand(),
            MixKind::Mix => self.mix_demand(),
        }
    }
}
