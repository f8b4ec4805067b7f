// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Declaration a plugin library exports for the loader.
//!
//! Plugins and host are built with the same toolchain; the ABI version is
//! the only compatibility check. Plugin crates use the `export_plugin!` macro
//! from `mediagraph-plugin-abi` rather than these types directly.

use crate::core::error::Result;
use crate::core::implementation::{Completion, PluginHandle};
use crate::core::properties::Properties;
use crate::core::support::SupportTable;

/// Current ABI version. Plugins must match this exactly.
///
/// Increment when making breaking changes to the plugin interface.
pub const MEDIAGRAPH_ABI_VERSION: u32 = 1;

/// Name of the static symbol holding the [`PluginDeclaration`].
pub const PLUGIN_SYMBOL: &[u8] = b"MEDIAGRAPH_PLUGIN\0";

/// Instantiate a plugin object. `Completion::Pending` means the object
/// finishes its bring-up asynchronously and reports through its node's
/// completion notifier.
pub type FactoryInitFn =
    fn(support: &SupportTable, properties: Option<&Properties>) -> Result<(Box<dyn PluginHandle>, Completion)>;

/// A named constructor for plugin objects.
pub struct HandleFactory {
    pub name: &'static str,
    pub init: FactoryInitFn,
}

impl std::fmt::Debug for HandleFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandleFactory")
            .field("name", &self.name)
            .finish()
    }
}

/// Returns the factory at `index`, or `None` past the last one.
#[allow(improper_ctypes_definitions)]
pub type FactoryEnumFn = extern "C" fn(index: u32) -> Option<&'static HandleFactory>;

/// Plugin declaration exported by dynamic libraries.
///
/// Plugins must export a static symbol named `MEDIAGRAPH_PLUGIN` of this type.
#[repr(C)]
pub struct PluginDeclaration {
    /// ABI version - must match [`MEDIAGRAPH_ABI_VERSION`].
    pub abi_version: u32,

    /// Factory enumeration entry point.
    pub enum_factories: FactoryEnumFn,
}

// Safety: PluginDeclaration contains only a version number and function pointer,
// both of which are Send + Sync.
unsafe impl Send for PluginDeclaration {}
unsafe impl Sync for PluginDeclaration {}
