// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Pushing caller-supplied text properties into an implementation's typed
//! negotiable properties.

use crate::core::error::Result;
use crate::core::implementation::{PropValue, SharedImplementation};
use crate::core::properties::Properties;
use crate::core::support::TypeMap;

/// Keys with this prefix name negotiable properties.
pub const PROPS_PREFIX: &str = "mediagraph:props:";

/// Convert `text` to the type `current` is declared as. `None` when the text
/// does not parse.
fn convert(current: &PropValue, text: &str, type_map: &TypeMap) -> Option<PropValue> {
    let trimmed = text.trim();
    match current {
        PropValue::Id(_) => Some(PropValue::Id(type_map.get_id(trimmed))),
        PropValue::Int(_) => trimmed.parse().ok().map(PropValue::Int),
        PropValue::Long(_) => trimmed.parse().ok().map(PropValue::Long),
        PropValue::Float(_) => trimmed.parse().ok().map(PropValue::Float),
        PropValue::Double(_) => trimmed.parse().ok().map(PropValue::Double),
        // Assigned verbatim.
        PropValue::String(_) => Some(PropValue::String(text.to_string())),
    }
}

/// Apply every recognised `mediagraph:props:*` entry of `properties` to the
/// implementation. Unknown keys and values that do not convert are skipped
/// one by one. Returns how many properties were changed; an error only when
/// the implementation refused to report or accept its property set.
pub fn apply_negotiable_properties(
    type_map: &TypeMap,
    implementation: &SharedImplementation,
    properties: &Properties,
) -> Result<usize> {
    let mut implementation = implementation.lock();
    let mut props = implementation.props()?;
    let mut configured = 0;

    for (key, value) in properties.iter() {
        if !key.starts_with(PROPS_PREFIX) {
            continue;
        }
        let Some(id) = type_map.find_id(key) else {
            tracing::debug!(key, "[plugin] Unknown property");
            continue;
        };
        let Some(prop) = props.iter_mut().find(|p| p.id == id) else {
            tracing::debug!(key, "[plugin] Property not supported by implementation");
            continue;
        };
        match convert(&prop.value, value, type_map) {
            Some(converted) => {
                tracing::info!(key, value, "[plugin] Configure prop");
                prop.value = converted;
                configured += 1;
            }
            None => {
                tracing::debug!(key, value, "[plugin] Can't convert property value");
            }
        }
    }

    implementation.set_props(&props)?;
    Ok(configured)
}
