// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Loads the built passthrough library through the plugin loader, the same
//! way a host process does.

use std::path::PathBuf;
use std::sync::Arc;

use mediagraph::{
    Context, DataLoopConfig, Direction, ErrorKind, GraphError, KernelConfig, Node, NodeState,
    PortId, PropValue, Properties,
};
use passthrough_plugin::{FACTORY_NAME, LATENCY_PROP};

fn library_name() -> String {
    format!("{}passthrough_plugin", std::env::consts::DLL_PREFIX)
}

/// Directory holding the built cdylib: next to the test binary in `deps/`,
/// or one level up where cargo copies final artifacts.
fn plugin_dir() -> PathBuf {
    let file = format!("{}.{}", library_name(), std::env::consts::DLL_EXTENSION);
    let exe = std::env::current_exe().unwrap();
    let deps = exe.parent().unwrap().to_path_buf();
    let candidates = [deps.clone(), deps.parent().unwrap().to_path_buf()];
    candidates
        .into_iter()
        .find(|dir| dir.join(&file).exists())
        .unwrap_or_else(|| panic!("{} not found near {}", file, deps.display()))
}

fn plugin_context() -> Arc<Context> {
    let config = KernelConfig {
        plugin_dir: Some(plugin_dir()),
        data_loop: DataLoopConfig {
            cycle_period_ms: 0,
            ..DataLoopConfig::default()
        },
        ..KernelConfig::default()
    };
    Context::new(config).unwrap()
}

#[test]
fn test_load_brings_up_registered_node() {
    let ctx = plugin_context();
    let props: Properties = [(LATENCY_PROP, "12"), ("node.description", "pt")]
        .into_iter()
        .collect();

    let node = Node::load(&ctx, &library_name(), FACTORY_NAME, "pt", Some(props)).unwrap();

    assert_eq!(node.state(), NodeState::Registered);
    assert!(node.port(Direction::Input, PortId(0)).is_some());
    assert!(node.port(Direction::Output, PortId(0)).is_some());
    assert_eq!(
        node.properties().get("media.class"),
        Some("Stream/Passthrough")
    );
    assert_eq!(node.plugin().unwrap().factory_name(), FACTORY_NAME);
    assert_eq!(ctx.plugin_loader().open_libraries(), 1);
    assert_eq!(ctx.registry().len(), 1);

    // The plugin resolved the property name through the host's type map.
    let latency_id = ctx.type_map().find_id(LATENCY_PROP).unwrap();
    let values = node.implementation().lock().props().unwrap();
    let latency = values.iter().find(|p| p.id == latency_id).unwrap();
    assert_eq!(latency.value, PropValue::Int(12));

    drop(node);
    assert_eq!(ctx.plugin_loader().open_libraries(), 0);
    assert!(ctx.registry().is_empty());
}

#[test]
fn test_unknown_factory_closes_library() {
    let ctx = plugin_context();

    let err = Node::load(&ctx, &library_name(), "no-such-factory", "pt", None).unwrap_err();

    assert!(matches!(err, GraphError::ResourceNotFound(_)));
    assert_eq!(err.kind(), ErrorKind::Resource);
    assert_eq!(ctx.plugin_loader().open_libraries(), 0);
    assert!(ctx.registry().is_empty());
}

#[test]
fn test_library_enumerates_its_factory() {
    let ctx = plugin_context();

    let library = ctx.plugin_loader().open(&library_name()).unwrap();
    let names: Vec<&str> = library.factories().map(|f| f.name).collect();

    assert_eq!(names, vec![FACTORY_NAME]);
    assert_eq!(ctx.plugin_loader().open_libraries(), 1);
    drop(library);
    assert_eq!(ctx.plugin_loader().open_libraries(), 0);
}
