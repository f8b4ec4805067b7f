// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Scripted node implementation shared by the integration tests.
//!
//! Outputs behave as a source (buffer ids 0, 1, 2, ... whenever the slot is
//! free), inputs as a sink (every received id is recorded). Negotiation can
//! be made asynchronous or rejecting through [`MockConfig`]; asynchronous
//! requests are completed by the test through [`MockState::complete`].

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use mediagraph::{
    AllocParam, AsyncSeq, Buffer, BufferId, BufferSlot, Completion, CompletionNotifier, Context,
    DataLoopConfig, Direction, Format, FormatFlags, GraphError, IoSlot, KernelConfig,
    NodeImplementation, PortCommand, PortCounts, PortId, Properties, Result, SharedImplementation,
    SlotStatus,
};
use parking_lot::Mutex;

#[derive(Debug, Clone, Copy)]
pub struct MockConfig {
    pub n_inputs: u32,
    pub max_inputs: u32,
    pub n_outputs: u32,
    pub max_outputs: u32,
    /// Format and buffer requests answer `Completion::Pending`.
    pub async_negotiation: bool,
    /// Buffer requests fail with `Rejected`.
    pub reject_buffers: bool,
}

impl MockConfig {
    pub fn source() -> Self {
        Self::ports(0, 0, 1, 1)
    }

    pub fn sink() -> Self {
        Self::ports(1, 1, 0, 0)
    }

    pub fn ports(n_inputs: u32, max_inputs: u32, n_outputs: u32, max_outputs: u32) -> Self {
        Self {
            n_inputs,
            max_inputs,
            n_outputs,
            max_outputs,
            async_negotiation: false,
            reject_buffers: false,
        }
    }
}

#[derive(Default)]
pub struct MockState {
    pub calls: Vec<String>,
    pub slots: BTreeMap<(Direction, PortId), Arc<IoSlot>>,
    pub received: Vec<BufferId>,
    pub notifier: Option<CompletionNotifier>,
    pub pending: Vec<AsyncSeq>,
    next_seq: u32,
    next_buffer: u32,
}

impl MockState {
    fn next_seq(&mut self) -> AsyncSeq {
        self.next_seq += 1;
        let seq = AsyncSeq(self.next_seq);
        self.pending.push(seq);
        seq
    }

    /// Report completion of `seq` through the node's notifier.
    pub fn complete(&mut self, seq: AsyncSeq, result: std::result::Result<(), String>) {
        self.pending.retain(|s| *s != seq);
        if let Some(notifier) = &self.notifier {
            notifier.notify(seq, result);
        }
    }
}

pub struct MockNode {
    config: MockConfig,
    state: Arc<Mutex<MockState>>,
}

impl MockNode {
    pub fn new(config: MockConfig) -> (SharedImplementation, Arc<Mutex<MockState>>) {
        let state = Arc::new(Mutex::new(MockState::default()));
        let node = MockNode {
            config,
            state: Arc::clone(&state),
        };
        (mediagraph::shared(node), state)
    }

    fn negotiation(&self, call: String) -> Completion {
        let mut state = self.state.lock();
        state.calls.push(call);
        if self.config.async_negotiation {
            Completion::Pending(state.next_seq())
        } else {
            Completion::Done
        }
    }
}

impl NodeImplementation for MockNode {
    fn info(&self) -> Option<Properties> {
        Some([("media.class", "Test/Mock")].into_iter().collect())
    }

    fn port_counts(&self) -> PortCounts {
        PortCounts {
            n_inputs: self.config.n_inputs,
            max_inputs: self.config.max_inputs,
            n_outputs: self.config.n_outputs,
            max_outputs: self.config.max_outputs,
        }
    }

    fn port_ids(&self, max_inputs: u32, max_outputs: u32) -> (Vec<PortId>, Vec<PortId>) {
        (
            (0..max_inputs).map(PortId).collect(),
            (0..max_outputs).map(PortId).collect(),
        )
    }

    fn port_set_io(
        &mut self,
        direction: Direction,
        port_id: PortId,
        slot: Option<Arc<IoSlot>>,
    ) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(format!(
            "set_io {}:{} {}",
            direction,
            port_id,
            if slot.is_some() { "bind" } else { "unbind" }
        ));
        match slot {
            Some(slot) => state.slots.insert((direction, port_id), slot),
            None => state.slots.remove(&(direction, port_id)),
        };
        Ok(())
    }

    fn port_set_format(
        &mut self,
        direction: Direction,
        port_id: PortId,
        _flags: FormatFlags,
        format: Option<&Format>,
    ) -> Result<Completion> {
        let format = format.map_or_else(|| "none".to_string(), |f| f.to_string());
        Ok(self.negotiation(format!("set_format {}:{} {}", direction, port_id, format)))
    }

    fn port_use_buffers(
        &mut self,
        direction: Direction,
        port_id: PortId,
        buffers: &[Buffer],
    ) -> Result<Completion> {
        if self.config.reject_buffers {
            return Err(GraphError::rejected(-12, "no memory"));
        }
        Ok(self.negotiation(format!(
            "use_buffers {}:{} {}",
            direction,
            port_id,
            buffers.len()
        )))
    }

    fn port_alloc_buffers(
        &mut self,
        direction: Direction,
        port_id: PortId,
        params: &[AllocParam],
        count: u32,
    ) -> Result<(Vec<Buffer>, Completion)> {
        if self.config.reject_buffers {
            return Err(GraphError::rejected(-12, "no memory"));
        }
        let size = params.first().map_or(4096, |p| p.size);
        let buffers = (0..count).map(|id| Buffer::new(id, size)).collect();
        let completion =
            self.negotiation(format!("alloc_buffers {}:{} {}", direction, port_id, count));
        Ok((buffers, completion))
    }

    fn port_send_command(
        &mut self,
        direction: Direction,
        port_id: PortId,
        command: PortCommand,
    ) -> Result<()> {
        self.state
            .lock()
            .calls
            .push(format!("command {}:{} {:?}", direction, port_id, command));
        Ok(())
    }

    fn process_input(&mut self) -> SlotStatus {
        let mut state = self.state.lock();
        let inputs: Vec<Arc<IoSlot>> = state
            .slots
            .iter()
            .filter(|((direction, _), _)| *direction == Direction::Input)
            .map(|(_, slot)| Arc::clone(slot))
            .collect();
        for slot in inputs {
            let current = slot.load();
            if current.status == SlotStatus::HaveBuffer {
                if let Some(id) = current.buffer_id {
                    state.received.push(id);
                }
                slot.store(BufferSlot::new(SlotStatus::Ok, current.buffer_id));
            }
        }
        SlotStatus::NeedBuffer
    }

    fn process_output(&mut self) -> SlotStatus {
        let mut state = self.state.lock();
        let outputs: Vec<Arc<IoSlot>> = state
            .slots
            .iter()
            .filter(|((direction, _), _)| *direction == Direction::Output)
            .map(|(_, slot)| Arc::clone(slot))
            .collect();
        if outputs.is_empty() {
            return SlotStatus::Ok;
        }
        for slot in outputs {
            if slot.status() != SlotStatus::HaveBuffer {
                slot.store(BufferSlot::have(BufferId(state.next_buffer)));
                state.next_buffer += 1;
            }
        }
        SlotStatus::HaveBuffer
    }

    fn set_completion_notifier(&mut self, notifier: CompletionNotifier) {
        self.state.lock().notifier = Some(notifier);
    }
}

/// Context whose data thread only cycles on request.
pub fn manual_context() -> Arc<Context> {
    let config = KernelConfig {
        data_loop: DataLoopConfig {
            cycle_period_ms: 0,
            ..DataLoopConfig::default()
        },
        ..KernelConfig::default()
    };
    Context::new(config).unwrap()
}

/// Wait until every queued invocation ran.
pub fn settle(ctx: &Context) {
    ctx.data_loop().invoke_sync("settle", |_| Ok(())).unwrap();
}
