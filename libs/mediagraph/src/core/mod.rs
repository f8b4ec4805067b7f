// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

pub mod buffers;
pub mod config;
pub mod context;
pub mod data_loop;
pub mod error;
pub mod graph;
pub mod implementation;
pub mod link;
pub mod logging;
pub mod mix;
pub mod node;
pub mod plugin;
pub mod port;
pub mod properties;
pub mod pubsub;
pub mod registry;
pub mod support;

pub use buffers::*;
pub use config::{DataLoopConfig, KernelConfig};
pub use context::*;
pub use data_loop::*;
pub use error::*;
pub use graph::*;
pub use implementation::*;
pub use link::Link;
pub use logging::init_tracing;
pub use mix::*;
pub use node::*;
pub use plugin::{LoadedPlugin, PluginLibrary, PluginLoader};
pub use port::*;
pub use properties::Properties;
pub use pubsub::*;
pub use registry::*;
pub use support::*;
