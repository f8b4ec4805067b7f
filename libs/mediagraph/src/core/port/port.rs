// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Port state machine and buffer lifecycle.
//!
//! ```text
//! INIT --attach--> CONFIGURE --set_format(Some)--> READY --use/alloc_buffers--> PAUSED --start--> STREAMING
//!                      ^                             |  ^                          |
//!                      +------set_format(None)-------+  +--use_buffers(empty)------+
//! ```
//!
//! A port owns at most one buffer set. Installing a set always releases the
//! previous one first. Buffers are never swapped under a streaming port: the
//! port is paused on the data thread before the implementation sees the new
//! set.

use std::sync::Arc;

use crate::core::buffers::{AllocParam, Buffer, BufferSet, Format, FormatFlags, IoSlot};
use crate::core::data_loop::DataLoop;
use crate::core::error::{GraphError, Result};
use crate::core::graph::{LinkId, PortId, SchedNodeId};
use crate::core::implementation::{AsyncSeq, Completion, PortCommand, SharedImplementation};
use crate::core::link::PortLinks;
use crate::core::mix::MixKind;
use crate::core::node::NodeUniqueId;
use crate::core::properties::Properties;
use crate::core::pubsub::{EventListener, ListenerToken, PortEvent, Signal};

use super::{Direction, PortState};

/// A transition accepted asynchronously by the implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingTransition {
    seq: AsyncSeq,
    target: PortState,
    release_buffers: bool,
}

pub struct Port {
    node_id: NodeUniqueId,
    processor: SchedNodeId,
    direction: Direction,
    port_id: PortId,
    state: PortState,
    slot: Arc<IoSlot>,
    buffers: Option<BufferSet>,
    links: Arc<PortLinks>,
    mix_node: SchedNodeId,
    attached: bool,
    properties: Properties,
    signal: Signal<PortEvent>,
    implementation: SharedImplementation,
    data_loop: DataLoop,
    pending: Option<PendingTransition>,
}

impl std::fmt::Debug for Port {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Port")
            .field("node_id", &self.node_id)
            .field("direction", &self.direction)
            .field("port_id", &self.port_id)
            .field("state", &self.state)
            .field("n_buffers", &self.n_buffers())
            .field("links", &self.links)
            .finish()
    }
}

impl Port {
    pub(crate) fn new(
        node_id: NodeUniqueId,
        processor: SchedNodeId,
        direction: Direction,
        port_id: PortId,
        properties: Properties,
        implementation: SharedImplementation,
        data_loop: DataLoop,
    ) -> Self {
        Self {
            node_id,
            processor,
            direction,
            port_id,
            state: PortState::Init,
            slot: Arc::new(IoSlot::new()),
            buffers: None,
            links: Arc::new(PortLinks::default()),
            mix_node: SchedNodeId::next(),
            attached: false,
            properties,
            signal: Signal::new(),
            implementation,
            data_loop,
            pending: None,
        }
    }

    pub fn node_id(&self) -> &NodeUniqueId {
        &self.node_id
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn port_id(&self) -> PortId {
        self.port_id
    }

    pub fn state(&self) -> PortState {
        self.state
    }

    pub fn slot(&self) -> &Arc<IoSlot> {
        &self.slot
    }

    pub fn buffers(&self) -> Option<&BufferSet> {
        self.buffers.as_ref()
    }

    pub fn n_buffers(&self) -> usize {
        self.buffers.as_ref().map_or(0, BufferSet::len)
    }

    /// Ids of the links currently attached to this port.
    pub fn links(&self) -> Vec<LinkId> {
        self.links.ids()
    }

    pub fn mix_kind(&self) -> MixKind {
        MixKind::for_direction(self.direction)
    }

    /// Scheduling vertex of this port's adapter.
    pub fn mix_node(&self) -> SchedNodeId {
        self.mix_node
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Sequence number of the transition awaiting completion, if any.
    pub fn pending_seq(&self) -> Option<AsyncSeq> {
        self.pending.map(|p| p.seq)
    }

    pub(crate) fn data_loop(&self) -> &DataLoop {
        &self.data_loop
    }

    fn label(&self) -> String {
        format!("{}:{}:{}", self.node_id, self.direction, self.port_id)
    }

    pub fn add_listener(&mut self, listener: Box<dyn EventListener<PortEvent>>) -> ListenerToken {
        self.signal.subscribe(listener)
    }

    pub fn subscribe_fn<F>(&mut self, f: F) -> ListenerToken
    where
        F: FnMut(&PortEvent) -> Result<()> + Send + 'static,
    {
        self.signal.subscribe_fn(f)
    }

    pub fn remove_listener(&mut self, token: ListenerToken) -> bool {
        self.signal.unsubscribe(token)
    }

    /// Merge `properties` into the port's properties.
    pub fn update_properties(&mut self, properties: &Properties) {
        self.properties.update(properties);
        self.signal
            .emit(&PortEvent::PropertiesChanged(self.properties.clone()));
    }

    fn set_state(&mut self, state: PortState) {
        if self.state == state {
            return;
        }
        let old = self.state;
        tracing::debug!(port = %self.label(), %old, new = %state, "[port] State changed");
        self.state = state;
        self.signal.emit(&PortEvent::StateChanged { old, new: state });
    }

    fn release_buffers(&mut self) {
        if let Some(set) = self.buffers.take() {
            tracing::trace!(
                port = %self.label(),
                n_buffers = set.len(),
                allocated = set.is_allocated(),
                "[port] Releasing buffers"
            );
        }
    }

    fn install_buffers(&mut self, set: Option<BufferSet>) {
        self.release_buffers();
        self.buffers = set;
    }

    fn send_command(&self, command: PortCommand) -> Result<()> {
        let implementation = Arc::clone(&self.implementation);
        let (direction, port_id) = (self.direction, self.port_id);
        self.data_loop.invoke_sync("port_command", move |_| {
            implementation
                .lock()
                .port_send_command(direction, port_id, command)
        })
    }

    /// Pause on the data thread if the port is past PAUSED.
    fn pause_if_streaming(&mut self) -> Result<()> {
        if self.state > PortState::Paused {
            self.send_command(PortCommand::Pause)?;
            self.set_state(PortState::Paused);
        }
        Ok(())
    }

    /// Set (or with `None` clear) the port format.
    ///
    /// Clearing releases any buffers and moves to CONFIGURE; a format moves
    /// to READY. A pending completion defers the transition.
    pub fn set_format(&mut self, flags: FormatFlags, format: Option<&Format>) -> Result<Completion> {
        let completion = self
            .implementation
            .lock()
            .port_set_format(self.direction, self.port_id, flags, format)?;
        tracing::debug!(port = %self.label(), ?completion, format = ?format.map(ToString::to_string), "[port] Set format");

        if flags.test_only {
            return Ok(completion);
        }

        let target = if format.is_some() {
            PortState::Ready
        } else {
            PortState::Configure
        };
        match completion {
            Completion::Done => {
                if format.is_none() {
                    self.release_buffers();
                }
                self.set_state(target);
            }
            Completion::Pending(seq) => {
                self.pending = Some(PendingTransition {
                    seq,
                    target,
                    release_buffers: format.is_none(),
                });
            }
        }
        Ok(completion)
    }

    /// Use caller-owned buffers. An empty set releases the current buffers.
    pub fn use_buffers(&mut self, buffers: Arc<[Buffer]>) -> Result<Completion> {
        let count = buffers.len();

        if count == 0 && self.state <= PortState::Ready {
            return Ok(Completion::Done);
        }
        if count > 0 && self.state < PortState::Ready {
            return Err(GraphError::NoFormat(self.label()));
        }
        BufferSet::check_ids(&buffers)?;

        self.pause_if_streaming()?;

        tracing::debug!(port = %self.label(), count, "[port] Use buffers");
        let completion = self
            .implementation
            .lock()
            .port_use_buffers(self.direction, self.port_id, &buffers)?;

        if count == 0 {
            self.install_buffers(None);
            self.set_state(PortState::Ready);
            return Ok(completion);
        }

        self.install_buffers(Some(BufferSet::External(buffers)));
        match completion {
            Completion::Done => self.set_state(PortState::Paused),
            Completion::Pending(seq) => {
                self.pending = Some(PendingTransition {
                    seq,
                    target: PortState::Paused,
                    release_buffers: false,
                });
            }
        }
        Ok(completion)
    }

    /// Let the implementation allocate up to `count` buffers. The port owns
    /// them until the next reconfiguration or its destruction.
    pub fn alloc_buffers(&mut self, params: &[AllocParam], count: u32) -> Result<Completion> {
        if self.state < PortState::Ready {
            return Err(GraphError::NoFormat(self.label()));
        }

        self.pause_if_streaming()?;

        tracing::debug!(port = %self.label(), count, "[port] Alloc buffers");
        let (buffers, completion) = self.implementation.lock().port_alloc_buffers(
            self.direction,
            self.port_id,
            params,
            count,
        )?;
        if count > 0 && buffers.is_empty() {
            return Err(GraphError::AllocationFailed(format!(
                "{}: implementation returned no buffers",
                self.label()
            )));
        }
        BufferSet::check_ids(&buffers)?;

        self.install_buffers(Some(BufferSet::Allocated(buffers)));
        match completion {
            Completion::Done => self.set_state(PortState::Paused),
            Completion::Pending(seq) => {
                self.pending = Some(PendingTransition {
                    seq,
                    target: PortState::Paused,
                    release_buffers: false,
                });
            }
        }
        Ok(completion)
    }

    /// PAUSED -> STREAMING.
    pub fn start(&mut self) -> Result<()> {
        match self.state {
            PortState::Streaming => Ok(()),
            PortState::Paused => {
                self.send_command(PortCommand::Start)?;
                self.set_state(PortState::Streaming);
                Ok(())
            }
            state => Err(GraphError::InvalidState(format!(
                "{}: cannot start from {}",
                self.label(),
                state
            ))),
        }
    }

    /// STREAMING -> PAUSED. Returns once the data thread has handled the pause.
    pub fn pause(&mut self) -> Result<()> {
        match self.state {
            PortState::Paused => Ok(()),
            PortState::Streaming => self.pause_if_streaming(),
            state => Err(GraphError::InvalidState(format!(
                "{}: cannot pause from {}",
                self.label(),
                state
            ))),
        }
    }

    /// Apply the completion of a pending transition. Returns `true` if `seq`
    /// belonged to this port.
    pub(crate) fn complete_pending(
        &mut self,
        seq: AsyncSeq,
        result: &std::result::Result<(), String>,
    ) -> bool {
        match self.pending {
            Some(pending) if pending.seq == seq => {
                self.pending = None;
                match result {
                    Ok(()) => {
                        if pending.release_buffers {
                            self.release_buffers();
                        }
                        self.set_state(pending.target);
                    }
                    Err(e) => {
                        tracing::warn!(port = %self.label(), %seq, "[port] Async operation failed: {}", e);
                    }
                }
                true
            }
            _ => false,
        }
    }

    /// Queue insertion of the port and its adapter into the scheduling graph.
    pub(crate) fn attach(&mut self) -> Result<()> {
        let (processor, adapter, direction, port_id) =
            (self.processor, self.mix_node, self.direction, self.port_id);
        let slot = Arc::clone(&self.slot);
        self.data_loop.invoke_async("attach_port", move |graph| {
            graph.attach_port(processor, adapter, direction, port_id, slot)
        })?;
        self.attached = true;

        if self.state <= PortState::Init {
            self.set_state(PortState::Configure);
        }
        Ok(())
    }

    /// First half of destruction: tell listeners, then synchronously remove
    /// the port, its adapter and every link half from the graph.
    pub(crate) fn begin_destroy(&mut self) {
        tracing::debug!(port = %self.label(), "[port] Destroy");
        self.signal.emit(&PortEvent::Destroy);

        if self.attached {
            let (processor, adapter, direction, port_id) =
                (self.processor, self.mix_node, self.direction, self.port_id);
            if let Err(e) = self.data_loop.invoke_sync("detach_port", move |graph| {
                graph.detach_port(processor, adapter, direction, port_id)
            }) {
                tracing::warn!(port = %self.label(), "[port] Detach failed: {}", e);
            }
            self.attached = false;
        }

        let severed = self.links.sever_all();
        if !severed.is_empty() {
            tracing::debug!(port = %self.label(), links = severed.len(), "[port] Dropped links");
        }
    }

    /// Second half of destruction, after the port left its node.
    pub(crate) fn free(mut self) {
        tracing::debug!(port = %self.label(), "[port] Free");
        self.signal.emit(&PortEvent::Free);
        self.release_buffers();
    }

    pub(crate) fn link_set(&self) -> &Arc<PortLinks> {
        &self.links
    }
}
