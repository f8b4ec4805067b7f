// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Plugin interface for mediagraph dynamic node loading.
//!
//! A plugin is a `cdylib` exporting one [`PluginDeclaration`] named
//! `MEDIAGRAPH_PLUGIN`. The declaration carries the ABI version and an
//! enumeration entry point returning the library's [`HandleFactory`]s by
//! index. The host opens the library, enumerates factories until it finds
//! the requested name, then calls its `init` with the process-wide support
//! table.
//!
//! # Example Plugin
//!
//! ```ignore
//! use mediagraph::{Capability, CapabilityKind, Completion, PluginHandle, SupportTable};
//! use mediagraph_plugin_abi::{HandleFactory, export_plugin};
//!
//! static TONE: HandleFactory = HandleFactory {
//!     name: "tone",
//!     init: |support, props| {
//!         let handle = ToneHandle::new(support, props)?;
//!         Ok((Box::new(handle), Completion::Done))
//!     },
//! };
//!
//! export_plugin!(TONE);
//! ```
//!
//! # Plugin Cargo.toml
//!
//! ```toml
//! [lib]
//! crate-type = ["cdylib"]
//!
//! [dependencies]
//! mediagraph = "0.3"
//! mediagraph-plugin-abi = "0.3"
//! ```

pub use mediagraph::core::plugin::abi::{
    FactoryEnumFn, FactoryInitFn, HandleFactory, MEDIAGRAPH_ABI_VERSION, PLUGIN_SYMBOL,
    PluginDeclaration,
};

/// Export factories for dynamic loading.
///
/// Takes the paths of one or more `static` [`HandleFactory`] items and
/// generates the `MEDIAGRAPH_PLUGIN` symbol the loader looks for. Factories
/// are enumerated in the order given.
///
/// ```ignore
/// export_plugin!(SOURCE_FACTORY, SINK_FACTORY);
/// ```
#[macro_export]
macro_rules! export_plugin {
    ($($factory:path),+ $(,)?) => {
        #[allow(improper_ctypes_definitions)]
        extern "C" fn __mediagraph_enum_factories(
            index: u32,
        ) -> ::core::option::Option<&'static $crate::HandleFactory> {
            static FACTORIES: &[&$crate::HandleFactory] = &[$(&$factory),+];
            FACTORIES.get(index as usize).copied()
        }

        #[unsafe(no_mangle)]
        pub static MEDIAGRAPH_PLUGIN: $crate::PluginDeclaration = $crate::PluginDeclaration {
            abi_version: $crate::MEDIAGRAPH_ABI_VERSION,
            enum_factories: __mediagraph_enum_factories,
        };
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediagraph::{GraphError, Result};
    use mediagraph::{PluginHandle, Properties, SupportTable};

    fn refuse(
        _support: &SupportTable,
        _props: Option<&Properties>,
    ) -> Result<(Box<dyn PluginHandle>, mediagraph::Completion)> {
        Err(GraphError::AllocationFailed("test factory".into()))
    }

    static FIRST: HandleFactory = HandleFactory {
        name: "first",
        init: refuse,
    };
    static SECOND: HandleFactory = HandleFactory {
        name: "second",
        init: refuse,
    };

    export_plugin!(FIRST, SECOND);

    #[test]
    fn test_declaration_enumerates_in_order() {
        assert_eq!(MEDIAGRAPH_PLUGIN.abi_version, MEDIAGRAPH_ABI_VERSION);

        let names: Vec<&str> = (0..)
            .map_while(|i| (MEDIAGRAPH_PLUGIN.enum_factories)(i))
            .map(|f| f.name)
            .collect();
        assert_eq!(names, vec!["first", "second"]);
    }
}
