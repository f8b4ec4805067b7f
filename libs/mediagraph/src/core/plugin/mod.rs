// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

pub mod abi;
mod loader;
mod props;

pub use abi::{
    FactoryEnumFn, FactoryInitFn, HandleFactory, MEDIAGRAPH_ABI_VERSION, PLUGIN_SYMBOL,
    PluginDeclaration,
};
pub use loader::{LoadedPlugin, PluginLibrary, PluginLoader};
pub use props::{PROPS_PREFIX, apply_negotiable_properties};
