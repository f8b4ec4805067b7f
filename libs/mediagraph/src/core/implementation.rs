// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Interfaces a processing implementation exposes to the kernel.
//!
//! A [`Node`](crate::core::node::Node) drives its implementation through
//! [`NodeImplementation`]: port enumeration, format and buffer negotiation,
//! port commands, negotiable properties and the two per-cycle callbacks. The
//! implementation is shared between the control path and the data thread, so
//! it lives behind a [`SharedImplementation`] mutex; the data thread only
//! holds the lock for the duration of one callback.
//!
//! Plugins expose implementations through [`PluginHandle::capability`].

use std::sync::Arc;

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::buffers::{AllocParam, Buffer, BufferId, Format, FormatFlags, IoSlot, SlotStatus};
use crate::core::error::Result;
use crate::core::graph::PortId;
use crate::core::port::Direction;
use crate::core::properties::Properties;

/// Sequence number tying an asynchronous operation to its completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AsyncSeq(pub u32);

impl std::fmt::Display for AsyncSeq {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Outcome of an operation the implementation may finish later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Finished synchronously.
    Done,
    /// Accepted; a completion carrying this sequence number follows.
    Pending(AsyncSeq),
}

impl Completion {
    pub fn is_pending(&self) -> bool {
        matches!(self, Completion::Pending(_))
    }
}

/// Completion of an asynchronous operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsyncDone {
    pub seq: AsyncSeq,
    pub result: std::result::Result<(), String>,
}

/// Sending half handed to an implementation so it can report completions.
#[derive(Debug, Clone)]
pub struct CompletionNotifier {
    sender: Sender<AsyncDone>,
}

impl CompletionNotifier {
    pub(crate) fn new(sender: Sender<AsyncDone>) -> Self {
        Self { sender }
    }

    /// Report that `seq` finished. Safe to call from any thread; a node that
    /// is already gone silently drops the completion.
    pub fn notify(&self, seq: AsyncSeq, result: std::result::Result<(), String>) {
        if self.sender.send(AsyncDone { seq, result }).is_err() {
            tracing::debug!(%seq, "[node] Completion for a destroyed node dropped");
        }
    }
}

/// Current and maximum port counts reported by an implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PortCounts {
    pub n_inputs: u32,
    pub max_inputs: u32,
    pub n_outputs: u32,
    pub max_outputs: u32,
}

/// Commands sent to a single port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortCommand {
    Pause,
    Start,
}

/// Value of a negotiable property. The variant is the declared type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropValue {
    /// Identifier resolved through the process-wide type map.
    Id(u32),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
}

/// One negotiable property, keyed by its type-map id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prop {
    pub id: u32,
    pub value: PropValue,
}

pub trait NodeImplementation: Send {
    /// Static properties copied into the node at construction.
    fn info(&self) -> Option<Properties> {
        None
    }

    fn port_counts(&self) -> PortCounts;

    /// Current port ids, at most `max_inputs`/`max_outputs` of each.
    fn port_ids(&self, max_inputs: u32, max_outputs: u32) -> (Vec<PortId>, Vec<PortId>);

    /// Bind (or with `None` unbind) the slot the port exchanges buffers through.
    fn port_set_io(
        &mut self,
        direction: Direction,
        port_id: PortId,
        slot: Option<Arc<IoSlot>>,
    ) -> Result<()>;

    fn port_set_format(
        &mut self,
        direction: Direction,
        port_id: PortId,
        flags: FormatFlags,
        format: Option<&Format>,
    ) -> Result<Completion>;

    fn port_use_buffers(
        &mut self,
        direction: Direction,
        port_id: PortId,
        buffers: &[Buffer],
    ) -> Result<Completion>;

    /// Allocate up to `count` buffers; returns the buffers actually allocated.
    fn port_alloc_buffers(
        &mut self,
        direction: Direction,
        port_id: PortId,
        params: &[AllocParam],
        count: u32,
    ) -> Result<(Vec<Buffer>, Completion)>;

    fn port_send_command(
        &mut self,
        direction: Direction,
        port_id: PortId,
        command: PortCommand,
    ) -> Result<()>;

    /// Current negotiable properties.
    fn props(&self) -> Result<Vec<Prop>> {
        Ok(Vec::new())
    }

    fn set_props(&mut self, _props: &[Prop]) -> Result<()> {
        Ok(())
    }

    /// Consume the buffers present in the input slots. Called on the data
    /// thread during the produce phase.
    fn process_input(&mut self) -> SlotStatus;

    /// Fill the output slots that asked for a buffer. Called on the data
    /// thread during the demand phase.
    fn process_output(&mut self) -> SlotStatus;

    fn reuse_buffer(&mut self, _port_id: PortId, _buffer_id: BufferId) -> Result<()> {
        Ok(())
    }

    /// Called once at construction; keep the notifier to report completions.
    fn set_completion_notifier(&mut self, _notifier: CompletionNotifier) {}
}

pub type SharedImplementation = Arc<Mutex<dyn NodeImplementation>>;

/// Wrap an implementation for sharing with the data thread.
pub fn shared<I: NodeImplementation + 'static>(implementation: I) -> SharedImplementation {
    Arc::new(Mutex::new(implementation))
}

/// Optional clock capability.
pub trait Clock: Send + Sync {
    /// Monotonic time in nanoseconds.
    fn now_ns(&self) -> u64;

    /// Nominal rate of the clock in Hz.
    fn rate(&self) -> u32;
}

pub type SharedClock = Arc<dyn Clock>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityKind {
    Node,
    Clock,
}

impl std::fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CapabilityKind::Node => write!(f, "node"),
            CapabilityKind::Clock => write!(f, "clock"),
        }
    }
}

pub enum Capability {
    Node(SharedImplementation),
    Clock(SharedClock),
}

/// An instantiated plugin object. Dropped exactly once, before its library.
pub trait PluginHandle: Send {
    fn capability(&self, kind: CapabilityKind) -> Option<Capability>;
}
