// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Passthrough node plugin.
//!
//! One input port and one output port, both id 0. Every buffer arriving on
//! the input is handed to the output unchanged. Exposes a single negotiable
//! property, `mediagraph:props:passthrough.latency` (Int, cycles), reported
//! in the node info but otherwise informational.
//!
//! ```text
//! MEDIAGRAPH_PLUGIN_DIR=target/debug  Node::load(ctx, "libpassthrough_plugin", "passthrough", ...)
//! ```

use std::sync::Arc;

use mediagraph::{
    AllocParam, Buffer, BufferSlot, Capability, CapabilityKind, Completion, Direction,
    Format, FormatFlags, GraphError, IoSlot, NodeImplementation, PluginHandle, PortCommand,
    PortCounts, PortId, Prop, PropValue, Properties, Result, SharedImplementation, SlotStatus,
    SupportTable, shared,
};
use mediagraph_plugin_abi::{HandleFactory, export_plugin};

pub const FACTORY_NAME: &str = "passthrough";
pub const LATENCY_PROP: &str = "mediagraph:props:passthrough.latency";

const PORT: PortId = PortId(0);

#[derive(Default)]
struct PortData {
    slot: Option<Arc<IoSlot>>,
    format: Option<Format>,
    n_buffers: usize,
}

struct Passthrough {
    input: PortData,
    output: PortData,
    latency_id: u32,
    latency: i32,
}

impl Passthrough {
    fn new(latency_id: u32) -> Self {
        Self {
            input: PortData::default(),
            output: PortData::default(),
            latency_id,
            latency: 0,
        }
    }

    fn port(&mut self, direction: Direction, port_id: PortId) -> Result<&mut PortData> {
        if port_id != PORT {
            return Err(GraphError::PortNotFound(format!("{}:{}", direction, port_id)));
        }
        Ok(match direction {
            Direction::Input => &mut self.input,
            Direction::Output => &mut self.output,
        })
    }
}

impl NodeImplementation for Passthrough {
    fn info(&self) -> Option<Properties> {
        Some(
            [
                ("media.class", "Stream/Passthrough"),
                ("factory.name", FACTORY_NAME),
            ]
            .into_iter()
            .collect(),
        )
    }

    fn port_counts(&self) -> PortCounts {
        PortCounts {
            n_inputs: 1,
            max_inputs: 1,
            n_outputs: 1,
            max_outputs: 1,
        }
    }

    fn port_ids(&self, max_inputs: u32, max_outputs: u32) -> (Vec<PortId>, Vec<PortId>) {
        let inputs = if max_inputs > 0 { vec![PORT] } else { Vec::new() };
        let outputs = if max_outputs > 0 { vec![PORT] } else { Vec::new() };
        (inputs, outputs)
    }

    fn port_set_io(
        &mut self,
        direction: Direction,
        port_id: PortId,
        slot: Option<Arc<IoSlot>>,
    ) -> Result<()> {
        self.port(direction, port_id)?.slot = slot;
        Ok(())
    }

    fn port_set_format(
        &mut self,
        direction: Direction,
        port_id: PortId,
        flags: FormatFlags,
        format: Option<&Format>,
    ) -> Result<Completion> {
        // Both sides carry the same media; the peer's format, if any, wins.
        let peer = match direction {
            Direction::Input => self.output.format.as_ref(),
            Direction::Output => self.input.format.as_ref(),
        };
        if let (Some(format), Some(peer)) = (format, peer) {
            if format.media_type != peer.media_type || format.media_subtype != peer.media_subtype {
                return Err(GraphError::rejected(
                    -22,
                    format!("{} does not match {}", format, peer),
                ));
            }
        }
        if flags.test_only {
            return Ok(Completion::Done);
        }
        let port = self.port(direction, port_id)?;
        port.format = format.cloned();
        if port.format.is_none() {
            port.n_buffers = 0;
        }
        Ok(Completion::Done)
    }

    fn port_use_buffers(
        &mut self,
        direction: Direction,
        port_id: PortId,
        buffers: &[Buffer],
    ) -> Result<Completion> {
        self.port(direction, port_id)?.n_buffers = buffers.len();
        Ok(Completion::Done)
    }

    fn port_alloc_buffers(
        &mut self,
        direction: Direction,
        port_id: PortId,
        params: &[AllocParam],
        count: u32,
    ) -> Result<(Vec<Buffer>, Completion)> {
        let param = params.first().cloned().unwrap_or_default();
        let count = count.min(param.max_buffers.max(param.min_buffers));
        let buffers: Vec<Buffer> = (0..count)
            .map(|id| Buffer::new(id, param.size))
            .collect();
        self.port(direction, port_id)?.n_buffers = buffers.len();
        Ok((buffers, Completion::Done))
    }

    fn port_send_command(
        &mut self,
        direction: Direction,
        port_id: PortId,
        command: PortCommand,
    ) -> Result<()> {
        let port = self.port(direction, port_id)?;
        tracing::debug!(%direction, %port_id, ?command, n_buffers = port.n_buffers, "[passthrough] Command");
        Ok(())
    }

    fn props(&self) -> Result<Vec<Prop>> {
        Ok(vec![Prop {
            id: self.latency_id,
            value: PropValue::Int(self.latency),
        }])
    }

    fn set_props(&mut self, props: &[Prop]) -> Result<()> {
        for prop in props {
            if let (true, PropValue::Int(latency)) = (prop.id == self.latency_id, &prop.value) {
                self.latency = *latency;
            }
        }
        Ok(())
    }

    fn process_input(&mut self) -> SlotStatus {
        let (Some(input), Some(output)) = (&self.input.slot, &self.output.slot) else {
            return SlotStatus::NeedBuffer;
        };
        let slot = input.load();
        match (slot.status, slot.buffer_id) {
            (SlotStatus::HaveBuffer, Some(id)) if output.status() != SlotStatus::HaveBuffer => {
                output.store(BufferSlot::have(id));
                input.store(BufferSlot::consumed());
                SlotStatus::HaveBuffer
            }
            _ => SlotStatus::NeedBuffer,
        }
    }

    fn process_output(&mut self) -> SlotStatus {
        let (Some(input), Some(output)) = (&self.input.slot, &self.output.slot) else {
            return SlotStatus::Ok;
        };
        if output.status() == SlotStatus::HaveBuffer {
            return SlotStatus::HaveBuffer;
        }
        input.set_status(SlotStatus::NeedBuffer);
        SlotStatus::NeedBuffer
    }
}

struct PassthroughHandle {
    node: SharedImplementation,
}

impl PluginHandle for PassthroughHandle {
    fn capability(&self, kind: CapabilityKind) -> Option<Capability> {
        match kind {
            CapabilityKind::Node => Some(Capability::Node(Arc::clone(&self.node))),
            CapabilityKind::Clock => None,
        }
    }
}

fn init(
    support: &SupportTable,
    _properties: Option<&Properties>,
) -> Result<(Box<dyn PluginHandle>, Completion)> {
    let latency_id = support.type_map().get_id(LATENCY_PROP);

    let handle = PassthroughHandle {
        node: shared(Passthrough::new(latency_id)),
    };
    Ok((Box::new(handle), Completion::Done))
}

pub static PASSTHROUGH: HandleFactory = HandleFactory {
    name: FACTORY_NAME,
    init,
};

export_plugin!(PASSTHROUGH);

#[cfg(test)]
mod tests {
    use super::*;
    use mediagraph::{BufferId, TypeMap};

    fn instantiate() -> (Box<dyn PluginHandle>, SharedImplementation) {
        let support = SupportTable::default();
        let (handle, completion) = (PASSTHROUGH.init)(&support, None).unwrap();
        assert_eq!(completion, Completion::Done);
        let Some(Capability::Node(node)) = handle.capability(CapabilityKind::Node) else {
            panic!("passthrough must expose a node");
        };
        assert!(handle.capability(CapabilityKind::Clock).is_none());
        (handle, node)
    }

    #[test]
    fn test_latency_id_comes_from_shared_type_map() {
        let type_map = Arc::new(TypeMap::new());
        let support = SupportTable::new(Arc::clone(&type_map));
        let (handle, _) = (PASSTHROUGH.init)(&support, None).unwrap();

        let latency_id = type_map.find_id(LATENCY_PROP).unwrap();
        let Some(Capability::Node(node)) = handle.capability(CapabilityKind::Node) else {
            panic!("passthrough must expose a node");
        };
        let props = node.lock().props().unwrap();
        assert_eq!(props[0].id, latency_id);
    }

    #[test]
    fn test_forwards_input_to_output() {
        let (_handle, node) = instantiate();
        let (input, output) = (Arc::new(IoSlot::new()), Arc::new(IoSlot::new()));
        {
            let mut node = node.lock();
            node.port_set_io(Direction::Input, PORT, Some(Arc::clone(&input)))
                .unwrap();
            node.port_set_io(Direction::Output, PORT, Some(Arc::clone(&output)))
                .unwrap();
        }

        assert_eq!(node.lock().process_output(), SlotStatus::NeedBuffer);
        assert_eq!(input.status(), SlotStatus::NeedBuffer);

        input.store(BufferSlot::have(BufferId(7)));
        assert_eq!(node.lock().process_input(), SlotStatus::HaveBuffer);
        assert_eq!(output.load(), BufferSlot::have(BufferId(7)));
        assert_eq!(input.load(), BufferSlot::consumed());

        // Output still full: nothing more is taken.
        input.store(BufferSlot::have(BufferId(8)));
        assert_eq!(node.lock().process_input(), SlotStatus::NeedBuffer);
        assert_eq!(output.load().buffer_id, Some(BufferId(7)));
    }

    #[test]
    fn test_rejects_mismatched_formats() {
        let (_handle, node) = instantiate();
        let mut node = node.lock();
        let raw = Format::new("audio", "raw");
        node.port_set_format(Direction::Input, PORT, FormatFlags::default(), Some(&raw))
            .unwrap();

        let err = node
            .port_set_format(
                Direction::Output,
                PORT,
                FormatFlags::default(),
                Some(&Format::new("video", "raw")),
            )
            .unwrap_err();
        assert!(matches!(err, GraphError::Rejected { code: -22, .. }));

        let err = node
            .port_set_format(Direction::Output, PortId(1), FormatFlags::default(), Some(&raw))
            .unwrap_err();
        assert!(matches!(err, GraphError::PortNotFound(_)));
    }
}
