// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Links between an output port's tee and an input port's mix.
//!
//! A link is one external port on each adapter, both bound to the same
//! fresh buffer slot. It stays in the graph until [`Link::disconnect`] or
//! until either port is destroyed; dropping the handle does not remove it.
//!
//! Each port keeps its links in a `PortLinks` set. The two sets of a link
//! know each other, so destroying one port removes the link from its peer
//! and marks the [`Link`] handle disconnected.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::core::buffers::IoSlot;
use crate::core::data_loop::DataLoop;
use crate::core::error::{GraphError, Result};
use crate::core::graph::{LinkId, SchedNodeId};
use crate::core::port::{Direction, Port};

struct LinkEntry {
    id: LinkId,
    peer: Weak<PortLinks>,
    connected: Arc<AtomicBool>,
}

/// The external links of one port.
#[derive(Default)]
pub(crate) struct PortLinks {
    entries: Mutex<Vec<LinkEntry>>,
}

impl std::fmt::Debug for PortLinks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.ids()).finish()
    }
}

impl PortLinks {
    pub(crate) fn ids(&self) -> Vec<LinkId> {
        self.entries.lock().iter().map(|e| e.id.clone()).collect()
    }

    fn insert(&self, id: LinkId, peer: &Arc<PortLinks>, connected: &Arc<AtomicBool>) {
        self.entries.lock().push(LinkEntry {
            id,
            peer: Arc::downgrade(peer),
            connected: Arc::clone(connected),
        });
    }

    fn remove(&self, id: &LinkId) {
        self.entries.lock().retain(|e| &e.id != id);
    }

    /// Forget every link on this port and on the peer ports, and mark the
    /// link handles disconnected. Returns the ids that were dropped.
    pub(crate) fn sever_all(&self) -> Vec<LinkId> {
        let entries = std::mem::take(&mut *self.entries.lock());
        entries
            .into_iter()
            .map(|entry| {
                entry.connected.store(false, Ordering::Release);
                if let Some(peer) = entry.peer.upgrade() {
                    peer.remove(&entry.id);
                }
                entry.id
            })
            .collect()
    }
}

#[derive(Debug)]
pub struct Link {
    id: LinkId,
    tee: SchedNodeId,
    mix: SchedNodeId,
    slot: Arc<IoSlot>,
    data_loop: DataLoop,
    connected: Arc<AtomicBool>,
}

impl Link {
    /// Connect `output` to `input`. Both ports must be attached to the
    /// scheduling graph.
    pub fn connect(output: &mut Port, input: &mut Port) -> Result<Link> {
        if output.direction() != Direction::Output || input.direction() != Direction::Input {
            return Err(GraphError::InvalidState(format!(
                "link must go from an output to an input, got {} -> {}",
                output.direction(),
                input.direction()
            )));
        }
        if !output.is_attached() || !input.is_attached() {
            return Err(GraphError::InvalidState(
                "link endpoints must be attached ports".into(),
            ));
        }

        let id = LinkId::new();
        let slot = Arc::new(IoSlot::new());
        let (tee, mix) = (output.mix_node(), input.mix_node());
        let data_loop = output.data_loop().clone();

        let (task_id, task_slot) = (id.clone(), Arc::clone(&slot));
        data_loop.invoke_sync("link_connect", move |graph| {
            graph.connect(tee, mix, task_id, task_slot).map(|_| ())
        })?;

        let connected = Arc::new(AtomicBool::new(true));
        output
            .link_set()
            .insert(id.clone(), input.link_set(), &connected);
        input
            .link_set()
            .insert(id.clone(), output.link_set(), &connected);
        tracing::debug!(link = %id, %tee, %mix, "[link] Connected");

        Ok(Link {
            id,
            tee,
            mix,
            slot,
            data_loop,
            connected,
        })
    }

    pub fn id(&self) -> &LinkId {
        &self.id
    }

    /// The slot both link halves exchange descriptors through.
    pub fn slot(&self) -> &Arc<IoSlot> {
        &self.slot
    }

    /// `false` after [`disconnect`](Self::disconnect) or once either
    /// endpoint port was destroyed.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Remove both halves from the graph and forget the link on its ports.
    /// Disconnecting a link that a port teardown already removed succeeds.
    pub fn disconnect(&mut self, output: &mut Port, input: &mut Port) -> Result<()> {
        if output.mix_node() != self.tee || input.mix_node() != self.mix {
            return Err(GraphError::InvalidState(format!(
                "ports are not the endpoints of link {}",
                self.id
            )));
        }
        if self.is_connected() {
            let id = self.id.clone();
            let removed = self
                .data_loop
                .invoke_sync("link_disconnect", move |graph| graph.disconnect(&id))?;
            if !removed {
                tracing::debug!(link = %self.id, "[link] Already gone from graph");
            }
            self.connected.store(false, Ordering::Release);
        }
        output.link_set().remove(&self.id);
        input.link_set().remove(&self.id);
        tracing::debug!(link = %self.id, "[link] Disconnected");
        Ok(())
    }
}
