// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Scheduling graph walked by the data thread.
//!
//! Owned exclusively by the data loop; every mutation arrives as a queued
//! invocation (see [`DataLoop`](crate::core::data_loop::DataLoop)), so the
//! graph itself needs no locking.
//!
//! Each node has one processor vertex. Each of its ports adds an adapter
//! vertex joined to the processor by an internal edge (processor -> tee for
//! outputs, mix -> processor for inputs). Links are edges tee -> mix.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use petgraph::Direction as EdgeDirection;
use petgraph::algo::toposort;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};

use super::ids::{LinkId, PortId, SchedNodeId};
use crate::core::buffers::{BufferId, IoSlot, SlotStatus};
use crate::core::error::{GraphError, Result};
use crate::core::implementation::SharedImplementation;
use crate::core::mix::MixAdapter;
use crate::core::port::Direction;

/// Per-cycle callbacks of a scheduling vertex.
pub trait ScheduleCallbacks: Send {
    /// Produce phase: data flows downstream.
    fn on_produce(&mut self) -> SlotStatus;

    /// Demand phase: requests flow upstream.
    fn on_demand(&mut self) -> SlotStatus;

    fn reuse_buffer(&mut self, _port_id: PortId, _buffer_id: BufferId) -> Result<()> {
        Ok(())
    }
}

/// Processor vertex: the node's implementation plus its real ports.
pub struct ProcessorVertex {
    implementation: SharedImplementation,
    ports: BTreeMap<(Direction, PortId), Arc<IoSlot>>,
}

impl ProcessorVertex {
    pub fn new(implementation: SharedImplementation) -> Self {
        Self {
            implementation,
            ports: BTreeMap::new(),
        }
    }

    pub fn port_slot(&self, direction: Direction, port_id: PortId) -> Option<&Arc<IoSlot>> {
        self.ports.get(&(direction, port_id))
    }

    pub fn n_ports(&self) -> usize {
        self.ports.len()
    }
}

impl ScheduleCallbacks for ProcessorVertex {
    fn on_produce(&mut self) -> SlotStatus {
        self.implementation.lock().process_input()
    }

    fn on_demand(&mut self) -> SlotStatus {
        self.implementation.lock().process_output()
    }

    fn reuse_buffer(&mut self, port_id: PortId, buffer_id: BufferId) -> Result<()> {
        self.implementation.lock().reuse_buffer(port_id, buffer_id)
    }
}

pub enum SchedNodeKind {
    Processor(ProcessorVertex),
    Adapter(MixAdapter),
}

impl ScheduleCallbacks for SchedNodeKind {
    fn on_produce(&mut self) -> SlotStatus {
        match self {
            SchedNodeKind::Processor(p) => p.on_produce(),
            SchedNodeKind::Adapter(a) => a.on_produce(),
        }
    }

    fn on_demand(&mut self) -> SlotStatus {
        match self {
            SchedNodeKind::Processor(p) => p.on_demand(),
            SchedNodeKind::Adapter(a) => a.on_demand(),
        }
    }

    fn reuse_buffer(&mut self, port_id: PortId, buffer_id: BufferId) -> Result<()> {
        match self {
            SchedNodeKind::Processor(p) => p.reuse_buffer(port_id, buffer_id),
            SchedNodeKind::Adapter(a) => a.reuse_buffer(port_id, buffer_id),
        }
    }
}

pub struct SchedNode {
    pub id: SchedNodeId,
    pub label: String,
    pub kind: SchedNodeKind,
    /// Status returned by the last callback.
    pub last_status: SlotStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedEdge {
    /// Real port to its adapter's internal port.
    Internal { direction: Direction, port_id: PortId },
    /// Link between a tee and a mix.
    External(LinkId),
}

#[derive(Default)]
pub struct SchedGraph {
    graph: StableDiGraph<SchedNode, SchedEdge>,
    index: HashMap<SchedNodeId, NodeIndex>,
    order: Vec<NodeIndex>,
    order_dirty: bool,
}

impl SchedGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(
        &mut self,
        id: SchedNodeId,
        label: impl Into<String>,
        kind: SchedNodeKind,
    ) -> Result<()> {
        if self.index.contains_key(&id) {
            return Err(GraphError::InvalidState(format!(
                "scheduling node {} already present",
                id
            )));
        }
        let idx = self.graph.add_node(SchedNode {
            id,
            label: label.into(),
            kind,
            last_status: SlotStatus::Ok,
        });
        self.index.insert(id, idx);
        self.order_dirty = true;
        Ok(())
    }

    pub fn remove_node(&mut self, id: SchedNodeId) -> Result<SchedNode> {
        let idx = self.find_node_index(id)?;
        self.index.remove(&id);
        self.order_dirty = true;
        self.graph
            .remove_node(idx)
            .ok_or_else(|| GraphError::InvalidState(format!("scheduling node {} vanished", id)))
    }

    pub fn contains(&self, id: SchedNodeId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn node(&self, id: SchedNodeId) -> Option<&SchedNode> {
        self.index.get(&id).and_then(|idx| self.graph.node_weight(*idx))
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn adapter(&self, id: SchedNodeId) -> Option<&MixAdapter> {
        match self.node(id).map(|n| &n.kind) {
            Some(SchedNodeKind::Adapter(a)) => Some(a),
            _ => None,
        }
    }

    pub fn processor(&self, id: SchedNodeId) -> Option<&ProcessorVertex> {
        match self.node(id).map(|n| &n.kind) {
            Some(SchedNodeKind::Processor(p)) => Some(p),
            _ => None,
        }
    }

    fn find_node_index(&self, id: SchedNodeId) -> Result<NodeIndex> {
        self.index
            .get(&id)
            .copied()
            .ok_or_else(|| GraphError::InvalidState(format!("scheduling node {} not found", id)))
    }

    fn adapter_mut(&mut self, idx: NodeIndex) -> Result<&mut MixAdapter> {
        match self.graph.node_weight_mut(idx).map(|n| &mut n.kind) {
            Some(SchedNodeKind::Adapter(a)) => Ok(a),
            _ => Err(GraphError::InvalidState(format!(
                "vertex {:?} is not an adapter",
                idx
            ))),
        }
    }

    fn processor_mut(&mut self, idx: NodeIndex) -> Result<&mut ProcessorVertex> {
        match self.graph.node_weight_mut(idx).map(|n| &mut n.kind) {
            Some(SchedNodeKind::Processor(p)) => Ok(p),
            _ => Err(GraphError::InvalidState(format!(
                "vertex {:?} is not a processor",
                idx
            ))),
        }
    }

    /// Insert a real port into `processor`, add its adapter vertex and the
    /// internal edge between the two.
    pub fn attach_port(
        &mut self,
        processor: SchedNodeId,
        adapter_id: SchedNodeId,
        direction: Direction,
        port_id: PortId,
        slot: Arc<IoSlot>,
    ) -> Result<()> {
        let proc_idx = self.find_node_index(processor)?;
        let label = format!("{}:{}:{}", processor, direction, port_id);
        {
            let vertex = self.processor_mut(proc_idx)?;
            if vertex.ports.contains_key(&(direction, port_id)) {
                return Err(GraphError::PortExists(label));
            }
            vertex.ports.insert((direction, port_id), Arc::clone(&slot));
        }

        let adapter = MixAdapter::new(direction, slot);
        self.add_node(adapter_id, label, SchedNodeKind::Adapter(adapter))?;
        let adapter_idx = self.find_node_index(adapter_id)?;

        let edge = SchedEdge::Internal { direction, port_id };
        match direction {
            Direction::Output => self.graph.add_edge(proc_idx, adapter_idx, edge),
            Direction::Input => self.graph.add_edge(adapter_idx, proc_idx, edge),
        };
        self.order_dirty = true;
        Ok(())
    }

    /// Inverse of [`attach_port`](Self::attach_port). Every link of the
    /// adapter is removed together with its half on the peer adapter.
    /// Returns the removed link ids.
    pub fn detach_port(
        &mut self,
        processor: SchedNodeId,
        adapter_id: SchedNodeId,
        direction: Direction,
        port_id: PortId,
    ) -> Result<Vec<LinkId>> {
        let adapter_idx = self.find_node_index(adapter_id)?;

        let links: Vec<(LinkId, NodeIndex)> = self
            .graph
            .edges_directed(adapter_idx, EdgeDirection::Outgoing)
            .chain(self.graph.edges_directed(adapter_idx, EdgeDirection::Incoming))
            .filter_map(|e| match e.weight() {
                SchedEdge::External(link_id) => {
                    let peer = if e.source() == adapter_idx {
                        e.target()
                    } else {
                        e.source()
                    };
                    Some((link_id.clone(), peer))
                }
                SchedEdge::Internal { .. } => None,
            })
            .collect();

        for (link_id, peer) in &links {
            self.adapter_mut(*peer)?.remove_link(link_id);
        }

        self.remove_node(adapter_id)?;

        if let Ok(proc_idx) = self.find_node_index(processor) {
            self.processor_mut(proc_idx)?
                .ports
                .remove(&(direction, port_id));
        }

        Ok(links.into_iter().map(|(id, _)| id).collect())
    }

    /// Add a link from a tee to a mix sharing `slot`.
    pub fn connect(
        &mut self,
        tee: SchedNodeId,
        mix: SchedNodeId,
        link_id: LinkId,
        slot: Arc<IoSlot>,
    ) -> Result<EdgeIndex> {
        let tee_idx = self.find_node_index(tee)?;
        let mix_idx = self.find_node_index(mix)?;
        self.adapter_mut(tee_idx)?
            .add_link(link_id.clone(), Arc::clone(&slot));
        self.adapter_mut(mix_idx)?.add_link(link_id.clone(), slot);
        self.order_dirty = true;
        Ok(self
            .graph
            .add_edge(tee_idx, mix_idx, SchedEdge::External(link_id)))
    }

    /// Remove a link. Returns `false` if it was already gone (for example
    /// because one of its ports was detached first).
    pub fn disconnect(&mut self, link_id: &LinkId) -> Result<bool> {
        let found = self
            .graph
            .edge_references()
            .find(|e| matches!(e.weight(), SchedEdge::External(id) if id == link_id))
            .map(|e| (e.id(), e.source(), e.target()));

        let Some((edge, tee_idx, mix_idx)) = found else {
            return Ok(false);
        };
        self.adapter_mut(tee_idx)?.remove_link(link_id);
        self.adapter_mut(mix_idx)?.remove_link(link_id);
        self.graph.remove_edge(edge);
        self.order_dirty = true;
        Ok(true)
    }

    fn refresh_order(&mut self) {
        if !self.order_dirty {
            return;
        }
        self.order = match toposort(&self.graph, None) {
            Ok(order) => order,
            Err(cycle) => {
                tracing::warn!(
                    node = ?cycle.node_id(),
                    "[data-loop] Scheduling graph has a cycle, using insertion order"
                );
                self.graph.node_indices().collect()
            }
        };
        self.order_dirty = false;
    }

    /// Visit every vertex in topological order, or reverse topological order
    /// when `reverse` is set.
    pub fn for_each_scheduled(&mut self, reverse: bool, mut f: impl FnMut(&mut SchedNode)) {
        self.refresh_order();
        let order = std::mem::take(&mut self.order);
        let mut visit = |idx: &NodeIndex| {
            if let Some(node) = self.graph.node_weight_mut(*idx) {
                f(node);
            }
        };
        if reverse {
            order.iter().rev().for_each(&mut visit);
        } else {
            order.iter().for_each(&mut visit);
        }
        self.order = order;
    }
}
