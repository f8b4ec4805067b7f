// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Process-wide state threaded explicitly through node construction.

use std::any::Any;
use std::sync::Arc;

use crate::core::config::KernelConfig;
use crate::core::data_loop::DataLoop;
use crate::core::error::Result;
use crate::core::graph::{GraphWalk, TwoPhaseWalk};
use crate::core::plugin::PluginLoader;
use crate::core::registry::Registry;
use crate::core::support::{SupportTable, TypeMap};

/// Everything a node needs from its surroundings: the support table handed
/// to plugin factories, the identifier registry, the data loop of the graph
/// the node joins and the plugin loader.
pub struct Context {
    config: KernelConfig,
    support: SupportTable,
    registry: Registry,
    plugin_loader: PluginLoader,
    data_loop: DataLoop,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.config)
            .field("support", &self.support)
            .field("data_loop", &self.data_loop)
            .finish()
    }
}

impl Context {
    /// Context with default settings and the default walk.
    pub fn new(config: KernelConfig) -> Result<Arc<Self>> {
        ContextBuilder::new(config).build()
    }

    pub fn builder(config: KernelConfig) -> ContextBuilder {
        ContextBuilder::new(config)
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn support(&self) -> &SupportTable {
        &self.support
    }

    pub fn type_map(&self) -> &Arc<TypeMap> {
        self.support.type_map()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn plugin_loader(&self) -> &PluginLoader {
        &self.plugin_loader
    }

    pub fn data_loop(&self) -> &DataLoop {
        &self.data_loop
    }
}

/// Builder for configuring and constructing a [`Context`].
pub struct ContextBuilder {
    config: KernelConfig,
    support: SupportTable,
    walk: Option<Box<dyn GraphWalk>>,
}

impl ContextBuilder {
    pub fn new(config: KernelConfig) -> Self {
        Self {
            config,
            support: SupportTable::default(),
            walk: None,
        }
    }

    /// Add an entry to the support table handed to plugin factories.
    pub fn with_support<T: Any + Send + Sync>(mut self, name: impl Into<String>, value: Arc<T>) -> Self {
        self.support = self.support.with(name, value);
        self
    }

    /// Replace the default [`TwoPhaseWalk`].
    pub fn with_walk<W: GraphWalk + 'static>(mut self, walk: W) -> Self {
        self.walk = Some(Box::new(walk));
        self
    }

    /// Start the data thread and build the context.
    pub fn build(self) -> Result<Arc<Context>> {
        let walk = self
            .walk
            .unwrap_or_else(|| Box::new(TwoPhaseWalk::new()));
        let data_loop = DataLoop::with_walk(&self.config.data_loop, walk)?;
        let plugin_loader = PluginLoader::new(self.config.plugin_search_dir());

        Ok(Arc::new(Context {
            config: self.config,
            support: self.support,
            registry: Registry::new(),
            plugin_loader,
            data_loop,
        }))
    }
}
