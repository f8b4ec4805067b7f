// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Dynamic node loading failure paths, plugin directory resolution and
//! negotiable property conversion.
//!
//! Every test here touches `MEDIAGRAPH_PLUGIN_DIR` or builds a context that
//! reads it, so they all run serially.

use std::path::PathBuf;
use std::sync::Arc;

use mediagraph::config::PLUGIN_DIR_ENV;
use mediagraph::plugin::{PROPS_PREFIX, apply_negotiable_properties};
use mediagraph::{
    AllocParam, Buffer, Completion, Context, Direction, ErrorKind, Format, FormatFlags,
    GraphError, IoSlot, KernelConfig, Node, NodeImplementation, PortCommand, PortCounts, PortId,
    Prop, PropValue, Properties, Result, SlotStatus, shared,
};
use serial_test::serial;

fn context_with_plugin_dir(dir: PathBuf) -> Arc<Context> {
    let config = KernelConfig {
        plugin_dir: Some(dir),
        ..KernelConfig::default()
    };
    Context::new(config).unwrap()
}

#[test]
#[serial]
fn test_missing_library_is_resource_error() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context_with_plugin_dir(dir.path().to_path_buf());

    let err = Node::load(&ctx, "libnothing", "passthrough", "n", None).unwrap_err();

    assert!(matches!(err, GraphError::ResourceNotFound(_)));
    assert_eq!(err.kind(), ErrorKind::Resource);
    assert_eq!(ctx.plugin_loader().open_libraries(), 0);
    assert!(ctx.registry().is_empty());
}

#[test]
#[serial]
fn test_garbage_library_is_rejected_without_leak() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context_with_plugin_dir(dir.path().to_path_buf());
    let path = ctx.plugin_loader().library_path("libgarbage");
    std::fs::write(&path, b"definitely not an ELF file").unwrap();

    let err = Node::load(&ctx, "libgarbage", "passthrough", "n", None).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Resource);
    assert_eq!(ctx.plugin_loader().open_libraries(), 0);
}

#[test]
#[serial]
fn test_env_overrides_configured_plugin_dir() {
    let configured = KernelConfig {
        plugin_dir: Some(PathBuf::from("/opt/configured")),
        ..KernelConfig::default()
    };
    assert_eq!(
        configured.plugin_search_dir(),
        PathBuf::from("/opt/configured")
    );

    // Safety: serial test, no other thread reads the environment meanwhile.
    unsafe { std::env::set_var(PLUGIN_DIR_ENV, "/opt/from-env") };
    let resolved = configured.plugin_search_dir();
    let ctx = Context::new(configured.clone()).unwrap();
    let loader_dir = ctx.plugin_loader().search_dir().to_path_buf();
    unsafe { std::env::remove_var(PLUGIN_DIR_ENV) };

    assert_eq!(resolved, PathBuf::from("/opt/from-env"));
    assert_eq!(loader_dir, PathBuf::from("/opt/from-env"));
    assert_eq!(
        configured.plugin_search_dir(),
        PathBuf::from("/opt/configured")
    );
}

/// Implementation with one negotiable property of each kind.
struct Tunable {
    props: Vec<Prop>,
}

impl NodeImplementation for Tunable {
    fn port_counts(&self) -> PortCounts {
        PortCounts::default()
    }

    fn port_ids(&self, _: u32, _: u32) -> (Vec<PortId>, Vec<PortId>) {
        (Vec::new(), Vec::new())
    }

    fn port_set_io(&mut self, _: Direction, _: PortId, _: Option<Arc<IoSlot>>) -> Result<()> {
        Ok(())
    }

    fn port_set_format(
        &mut self,
        _: Direction,
        _: PortId,
        _: FormatFlags,
        _: Option<&Format>,
    ) -> Result<Completion> {
        Ok(Completion::Done)
    }

    fn port_use_buffers(&mut self, _: Direction, _: PortId, _: &[Buffer]) -> Result<Completion> {
        Ok(Completion::Done)
    }

    fn port_alloc_buffers(
        &mut self,
        _: Direction,
        _: PortId,
        _: &[AllocParam],
        _: u32,
    ) -> Result<(Vec<Buffer>, Completion)> {
        Ok((Vec::new(), Completion::Done))
    }

    fn port_send_command(&mut self, _: Direction, _: PortId, _: PortCommand) -> Result<()> {
        Ok(())
    }

    fn props(&self) -> Result<Vec<Prop>> {
        Ok(self.props.clone())
    }

    fn set_props(&mut self, props: &[Prop]) -> Result<()> {
        self.props = props.to_vec();
        Ok(())
    }

    fn process_input(&mut self) -> SlotStatus {
        SlotStatus::Ok
    }

    fn process_output(&mut self) -> SlotStatus {
        SlotStatus::Ok
    }
}

#[test]
#[serial]
fn test_negotiable_properties_convert_by_declared_type() {
    let ctx = Context::new(KernelConfig::default()).unwrap();
    let type_map = ctx.type_map();
    let key = |name: &str| format!("{}{}", PROPS_PREFIX, name);

    let volume = type_map.get_id(&key("volume"));
    let device = type_map.get_id(&key("device"));
    let wave = type_map.get_id(&key("wave"));
    let period = type_map.get_id(&key("period"));
    let implementation = shared(Tunable {
        props: vec![
            Prop { id: volume, value: PropValue::Double(1.0) },
            Prop { id: device, value: PropValue::String(String::new()) },
            Prop { id: wave, value: PropValue::Id(0) },
            Prop { id: period, value: PropValue::Int(1024) },
        ],
    });

    let props: Properties = [
        (key("volume"), "0.25".to_string()),
        (key("device"), " hw:1 ".to_string()),
        (key("wave"), "mediagraph:wave:sine".to_string()),
        (key("period"), "loud".to_string()),
        (key("unknown"), "1".to_string()),
        ("node.name".to_string(), "tone".to_string()),
    ]
    .into_iter()
    .collect();

    let configured = apply_negotiable_properties(type_map, &implementation, &props).unwrap();
    assert_eq!(configured, 3);

    let sine = type_map.find_id("mediagraph:wave:sine").unwrap();
    let values = implementation.lock().props().unwrap();
    assert_eq!(
        values.iter().map(|p| p.value.clone()).collect::<Vec<_>>(),
        vec![
            PropValue::Double(0.25),
            PropValue::String(" hw:1 ".into()),
            PropValue::Id(sine),
            PropValue::Int(1024),
        ]
    );
}
