// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Node: one processing implementation and the ports it exposes.
//!
//! Lifecycle:
//!
//! 1. Built directly from an implementation ([`Node::builder`]) or loaded
//!    from a plugin library ([`Node::load`]). Either way it starts in
//!    [`NodeState::Init`].
//! 2. Bring-up: the implementation's port ids are enumerated, a [`Port`] is
//!    created and attached for each, then the node is registered. This runs
//!    during construction, or on the first completion notification when the
//!    implementation initialises asynchronously. It runs exactly once.
//! 3. Destruction (explicit [`Node::destroy`] or drop): listeners are told,
//!    every port is detached and removed, the processor vertex leaves the
//!    graph, the registry entry is dropped, then the implementation, the
//!    plugin object and finally its library are released.

use std::collections::BTreeMap;
use std::sync::Arc;

use crossbeam_channel::Receiver;

use super::node_id::NodeUniqueId;
use super::node_info::{ChangeMask, NodeInfo, NodeState};
use crate::core::context::Context;
use crate::core::error::{GraphError, Result};
use crate::core::graph::{PortId, ProcessorVertex, SchedNodeId, SchedNodeKind};
use crate::core::implementation::{
    AsyncDone, AsyncSeq, Capability, CapabilityKind, CompletionNotifier, PluginHandle,
    SharedClock, SharedImplementation,
};
use crate::core::plugin::{LoadedPlugin, apply_negotiable_properties};
use crate::core::port::{Direction, Port};
use crate::core::properties::Properties;
use crate::core::pubsub::{EventListener, ListenerToken, NodeEvent, Signal};
use crate::core::registry::GlobalId;

pub struct Node {
    id: NodeUniqueId,
    context: Arc<Context>,
    info: NodeInfo,
    inputs: BTreeMap<PortId, Port>,
    outputs: BTreeMap<PortId, Port>,
    processor: SchedNodeId,
    async_init: bool,
    global_id: Option<GlobalId>,
    completions: Receiver<AsyncDone>,
    signal: Signal<NodeEvent>,
    destroyed: bool,
    // Drop order matters for plugin-backed nodes: implementation and clock
    // first, then the plugin object, then its library.
    implementation: SharedImplementation,
    clock: Option<SharedClock>,
    plugin: Option<LoadedPlugin>,
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("info", &self.info)
            .field("inputs", &self.inputs.keys().collect::<Vec<_>>())
            .field("outputs", &self.outputs.keys().collect::<Vec<_>>())
            .field("plugin", &self.plugin)
            .finish()
    }
}

/// Builder for directly constructed nodes.
pub struct NodeBuilder {
    context: Arc<Context>,
    name: String,
    implementation: SharedImplementation,
    clock: Option<SharedClock>,
    properties: Option<Properties>,
    async_init: bool,
    plugin: Option<LoadedPlugin>,
}

impl NodeBuilder {
    pub fn clock(mut self, clock: Option<SharedClock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn properties(mut self, properties: Properties) -> Self {
        self.properties = Some(properties);
        self
    }

    /// The implementation reports its own bring-up through a completion;
    /// ports are enumerated when it arrives.
    pub fn async_init(mut self, async_init: bool) -> Self {
        self.async_init = async_init;
        self
    }

    pub(crate) fn plugin(mut self, plugin: LoadedPlugin) -> Self {
        self.plugin = Some(plugin);
        self
    }

    pub fn build(self) -> Result<Node> {
        let (sender, completions) = crossbeam_channel::unbounded();
        let mut properties = self.properties.unwrap_or_default();
        {
            let mut implementation = self.implementation.lock();
            implementation.set_completion_notifier(CompletionNotifier::new(sender));
            if let Some(info) = implementation.info() {
                properties.update(&info);
            }
        }

        let id = NodeUniqueId::new();
        let processor = SchedNodeId::next();
        let vertex = ProcessorVertex::new(Arc::clone(&self.implementation));
        let label = format!("{}:{}", self.name, id);
        self.context
            .data_loop()
            .invoke_async("add_node", move |graph| {
                graph.add_node(processor, label, SchedNodeKind::Processor(vertex))
            })?;

        let mut node = Node {
            id,
            context: self.context,
            info: NodeInfo::new(self.name, properties),
            inputs: BTreeMap::new(),
            outputs: BTreeMap::new(),
            processor,
            async_init: self.async_init,
            global_id: None,
            completions,
            signal: Signal::new(),
            destroyed: false,
            implementation: self.implementation,
            clock: self.clock,
            plugin: self.plugin,
        };
        tracing::debug!(node = %node.id, name = %node.info.name, async_init = node.async_init, "[node] Created");

        if !node.async_init {
            node.complete_init()?;
        }
        Ok(node)
    }
}

impl Node {
    /// Start building a node around an already instantiated implementation.
    pub fn builder(
        context: &Arc<Context>,
        name: impl Into<String>,
        implementation: SharedImplementation,
    ) -> NodeBuilder {
        NodeBuilder {
            context: Arc::clone(context),
            name: name.into(),
            implementation,
            clock: None,
            properties: None,
            async_init: false,
            plugin: None,
        }
    }

    /// Load factory `factory_name` from plugin library `lib` and build a node
    /// around the object it creates.
    ///
    /// Recognised `mediagraph:props:*` entries of `properties` are pushed
    /// into the implementation; the rest are kept as node properties only.
    pub fn load(
        context: &Arc<Context>,
        lib: &str,
        factory_name: &str,
        name: impl Into<String>,
        properties: Option<Properties>,
    ) -> Result<Node> {
        let library = context.plugin_loader().open(lib)?;
        let factory = library.find_factory(factory_name)?;

        let (handle, completion) =
            (factory.init)(context.support(), properties.as_ref()).map_err(|e| {
                tracing::error!(lib, factory = factory_name, "[plugin] Can't make factory instance: {}", e);
                e
            })?;

        let (implementation, clock) = node_interfaces(handle.as_ref()).map_err(|e| {
            tracing::error!(lib, factory = factory_name, "[plugin] Can't get node interface");
            e
        })?;

        if let Some(props) = &properties {
            if let Err(e) = apply_negotiable_properties(context.type_map(), &implementation, props) {
                tracing::debug!(lib, factory = factory_name, "[plugin] Unrecognized properties: {}", e);
            }
        }

        tracing::info!(
            lib,
            factory = factory_name,
            path = %library.path().display(),
            async_init = completion.is_pending(),
            "[plugin] Loaded"
        );

        let plugin = LoadedPlugin::new(handle, factory_name, library);
        let mut builder = Node::builder(context, name, implementation)
            .clock(clock)
            .async_init(completion.is_pending())
            .plugin(plugin);
        if let Some(props) = properties {
            builder = builder.properties(props);
        }
        builder.build()
    }

    pub fn id(&self) -> &NodeUniqueId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn info(&self) -> &NodeInfo {
        &self.info
    }

    pub fn state(&self) -> NodeState {
        self.info.state
    }

    pub fn properties(&self) -> &Properties {
        &self.info.properties
    }

    pub fn clock(&self) -> Option<&SharedClock> {
        self.clock.as_ref()
    }

    pub fn implementation(&self) -> &SharedImplementation {
        &self.implementation
    }

    pub fn plugin(&self) -> Option<&LoadedPlugin> {
        self.plugin.as_ref()
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    /// Scheduling vertex of the node's implementation.
    pub fn processor_id(&self) -> SchedNodeId {
        self.processor
    }

    pub fn global_id(&self) -> Option<GlobalId> {
        self.global_id
    }

    /// True while an asynchronous bring-up has not completed.
    pub fn is_init_pending(&self) -> bool {
        self.async_init
    }

    pub fn add_listener(&mut self, listener: Box<dyn EventListener<NodeEvent>>) -> ListenerToken {
        self.signal.subscribe(listener)
    }

    pub fn subscribe_fn<F>(&mut self, f: F) -> ListenerToken
    where
        F: FnMut(&NodeEvent) -> Result<()> + Send + 'static,
    {
        self.signal.subscribe_fn(f)
    }

    pub fn remove_listener(&mut self, token: ListenerToken) -> bool {
        self.signal.unsubscribe(token)
    }

    fn ports_of(&self, direction: Direction) -> &BTreeMap<PortId, Port> {
        match direction {
            Direction::Input => &self.inputs,
            Direction::Output => &self.outputs,
        }
    }

    pub fn port(&self, direction: Direction, port_id: PortId) -> Option<&Port> {
        self.ports_of(direction).get(&port_id)
    }

    pub fn port_mut(&mut self, direction: Direction, port_id: PortId) -> Option<&mut Port> {
        match direction {
            Direction::Input => self.inputs.get_mut(&port_id),
            Direction::Output => self.outputs.get_mut(&port_id),
        }
    }

    pub fn ports(&self, direction: Direction) -> impl Iterator<Item = &Port> {
        self.ports_of(direction).values()
    }

    /// A free port id for `direction`, or `None` when the node is full.
    pub fn free_port_id(&self, direction: Direction) -> Option<PortId> {
        let (ports, max) = match direction {
            Direction::Input => (&self.inputs, self.info.max_input_ports),
            Direction::Output => (&self.outputs, self.info.max_output_ports),
        };
        (0..max).map(PortId).find(|id| !ports.contains_key(id))
    }

    pub fn set_max_ports(&mut self, max_inputs: u32, max_outputs: u32) {
        if self.info.max_input_ports != max_inputs {
            self.info.max_input_ports = max_inputs;
            self.info.change_mask |= ChangeMask::MAX_INPUT_PORTS;
        }
        if self.info.max_output_ports != max_outputs {
            self.info.max_output_ports = max_outputs;
            self.info.change_mask |= ChangeMask::MAX_OUTPUT_PORTS;
        }
    }

    /// Create a port with `port_id`, bind its slot to the implementation and
    /// queue its attachment to the scheduling graph.
    pub fn add_port(
        &mut self,
        direction: Direction,
        port_id: PortId,
        properties: Option<Properties>,
    ) -> Result<&mut Port> {
        let (count, max) = match direction {
            Direction::Input => (self.info.n_input_ports, self.info.max_input_ports),
            Direction::Output => (self.info.n_output_ports, self.info.max_output_ports),
        };
        let label = format!("{}:{}:{}", self.id, direction, port_id);
        if self.ports_of(direction).contains_key(&port_id) {
            return Err(GraphError::PortExists(label));
        }
        if count >= max {
            return Err(GraphError::TooManyPorts(format!("{} (max {})", label, max)));
        }

        let mut port = Port::new(
            self.id.clone(),
            self.processor,
            direction,
            port_id,
            properties.unwrap_or_default(),
            Arc::clone(&self.implementation),
            self.context.data_loop().clone(),
        );
        self.implementation
            .lock()
            .port_set_io(direction, port_id, Some(Arc::clone(port.slot())))?;
        if let Err(e) = port.attach() {
            let _ = self.implementation.lock().port_set_io(direction, port_id, None);
            return Err(e);
        }

        match direction {
            Direction::Input => {
                self.info.n_input_ports += 1;
                self.info.change_mask |= ChangeMask::INPUT_PORTS;
            }
            Direction::Output => {
                self.info.n_output_ports += 1;
                self.info.change_mask |= ChangeMask::OUTPUT_PORTS;
            }
        }
        match direction {
            Direction::Input => self.inputs.insert(port_id, port),
            Direction::Output => self.outputs.insert(port_id, port),
        };
        tracing::debug!(node = %self.id, %direction, %port_id, "[node] Port added");
        self.signal.emit(&NodeEvent::PortAdded { direction, port_id });

        self.port_mut(direction, port_id)
            .ok_or(GraphError::PortNotFound(label))
    }

    /// Destroy a port: listeners first, then a synchronous detach from the
    /// graph, removal from the node, and finally the buffers.
    pub fn remove_port(&mut self, direction: Direction, port_id: PortId) -> Result<()> {
        let label = format!("{}:{}:{}", self.id, direction, port_id);
        self.port_mut(direction, port_id)
            .ok_or(GraphError::PortNotFound(label))?
            .begin_destroy();

        let removed = match direction {
            Direction::Input => {
                self.info.n_input_ports = self.info.n_input_ports.saturating_sub(1);
                self.info.change_mask |= ChangeMask::INPUT_PORTS;
                self.inputs.remove(&port_id)
            }
            Direction::Output => {
                self.info.n_output_ports = self.info.n_output_ports.saturating_sub(1);
                self.info.change_mask |= ChangeMask::OUTPUT_PORTS;
                self.outputs.remove(&port_id)
            }
        };
        if let Err(e) = self
            .implementation
            .lock()
            .port_set_io(direction, port_id, None)
        {
            tracing::warn!(node = %self.id, %direction, %port_id, "[node] Unbinding port io failed: {}", e);
        }

        tracing::debug!(node = %self.id, %direction, %port_id, "[node] Port removed");
        self.signal
            .emit(&NodeEvent::PortRemoved { direction, port_id });

        if let Some(port) = removed {
            port.free();
        }
        Ok(())
    }

    fn update_port_ids(&mut self) -> Result<()> {
        let counts = self.implementation.lock().port_counts();
        self.set_max_ports(counts.max_inputs, counts.max_outputs);

        let (input_ids, output_ids) = self
            .implementation
            .lock()
            .port_ids(counts.max_inputs, counts.max_outputs);
        tracing::debug!(
            node = %self.id,
            "[node] Update port ids {}/{}, {}/{}",
            counts.n_inputs,
            counts.max_inputs,
            counts.n_outputs,
            counts.max_outputs
        );

        for port_id in input_ids.into_iter().take(counts.n_inputs as usize) {
            self.add_port(Direction::Input, port_id, None)?;
        }
        for port_id in output_ids.into_iter().take(counts.n_outputs as usize) {
            self.add_port(Direction::Output, port_id, None)?;
        }
        Ok(())
    }

    fn register(&mut self) {
        let mut properties = self.info.properties.clone();
        properties.set("node.name", self.info.name.clone());
        properties.set("node.id", self.id.to_string());
        let global_id = self.context.registry().insert("node", properties);
        self.global_id = Some(global_id);

        self.info.state = NodeState::Registered;
        self.info.change_mask |= ChangeMask::STATE;
        tracing::info!(node = %self.id, name = %self.info.name, %global_id, "[node] Registered");
        self.signal.emit(&NodeEvent::InfoChanged(self.info.change_mask));
        self.info.change_mask = ChangeMask::empty();
    }

    fn complete_init(&mut self) -> Result<()> {
        self.update_port_ids()?;
        self.register();
        Ok(())
    }

    /// Deliver every completion the implementation reported so far. Returns
    /// how many were handled.
    pub fn dispatch_completions(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(done) = self.completions.try_recv() {
            self.on_async_complete(done.seq, done.result);
            handled += 1;
        }
        handled
    }

    /// Handle the completion of asynchronous operation `seq`.
    ///
    /// The first completion after an asynchronous bring-up finishes it;
    /// later ones never repeat it. A completion matching a port's pending
    /// transition applies that transition.
    pub fn on_async_complete(&mut self, seq: AsyncSeq, result: std::result::Result<(), String>) {
        tracing::debug!(node = %self.id, %seq, ?result, "[node] Async complete");

        if self.async_init {
            self.async_init = false;
            match &result {
                Ok(()) => {
                    if let Err(e) = self.complete_init() {
                        tracing::warn!(node = %self.id, "[node] Bring-up failed: {}", e);
                    }
                }
                Err(e) => {
                    tracing::warn!(node = %self.id, %seq, "[node] Asynchronous init failed: {}", e);
                }
            }
        } else {
            for port in self.inputs.values_mut().chain(self.outputs.values_mut()) {
                if port.complete_pending(seq, &result) {
                    break;
                }
            }
        }

        self.signal.emit(&NodeEvent::AsyncComplete { seq, result });
    }

    /// Tear the node down now instead of on drop.
    pub fn destroy(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        tracing::debug!(node = %self.id, "[node] Destroy");
        self.signal.emit(&NodeEvent::Destroy);

        let ports: Vec<(Direction, PortId)> = self
            .inputs
            .keys()
            .map(|id| (Direction::Input, *id))
            .chain(self.outputs.keys().map(|id| (Direction::Output, *id)))
            .collect();
        for (direction, port_id) in ports {
            if let Err(e) = self.remove_port(direction, port_id) {
                tracing::warn!(node = %self.id, %direction, %port_id, "[node] Removing port failed: {}", e);
            }
        }

        let processor = self.processor;
        if let Err(e) = self
            .context
            .data_loop()
            .invoke_sync("remove_node", move |graph| graph.remove_node(processor).map(|_| ()))
        {
            tracing::warn!(node = %self.id, "[node] Removing processor vertex failed: {}", e);
        }

        if let Some(global_id) = self.global_id.take() {
            self.context.registry().remove(global_id);
        }

        self.signal.emit(&NodeEvent::Free);
        tracing::info!(node = %self.id, name = %self.info.name, "[node] Destroyed");
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// The node capability a plugin object must expose, plus its optional clock.
fn node_interfaces(handle: &dyn PluginHandle) -> Result<(SharedImplementation, Option<SharedClock>)> {
    let implementation = match handle.capability(CapabilityKind::Node) {
        Some(Capability::Node(implementation)) => implementation,
        _ => {
            return Err(GraphError::IncompatiblePlugin(format!(
                "no {} capability",
                CapabilityKind::Node
            )));
        }
    };
    let clock = match handle.capability(CapabilityKind::Clock) {
        Some(Capability::Clock(clock)) => Some(clock),
        _ => None,
    };
    Ok((implementation, clock))
}
