// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Process-wide capability table handed to plugin factories.
//!
//! The table is an explicit value threaded through node construction; there
//! is no global instance.
//!
//! A plugin library links its own copy of this crate, so a `TypeId` seen
//! inside the plugin never equals the host's. Interfaces every plugin needs
//! are therefore concrete fields; the named `Any` entries only serve
//! in-process extras and miss across a library boundary.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

/// Bidirectional map between type names and small integer ids.
///
/// Ids are assigned on first lookup and stay stable for the life of the map.
#[derive(Debug, Default)]
pub struct TypeMap {
    inner: RwLock<TypeMapInner>,
}

#[derive(Debug, Default)]
struct TypeMapInner {
    ids: HashMap<String, u32>,
    names: Vec<String>,
}

impl TypeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id for `name`, registering it if needed.
    pub fn get_id(&self, name: &str) -> u32 {
        if let Some(id) = self.find_id(name) {
            return id;
        }
        let mut inner = self.inner.write();
        if let Some(id) = inner.ids.get(name) {
            return *id;
        }
        let id = inner.names.len() as u32;
        inner.names.push(name.to_string());
        inner.ids.insert(name.to_string(), id);
        id
    }

    /// Id for `name` without registering it.
    pub fn find_id(&self, name: &str) -> Option<u32> {
        self.inner.read().ids.get(name).copied()
    }

    pub fn get_name(&self, id: u32) -> Option<String> {
        self.inner.read().names.get(id as usize).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

type SupportEntry = Arc<dyn Any + Send + Sync>;

/// Interfaces a plugin may use at init time.
#[derive(Clone)]
pub struct SupportTable {
    type_map: Arc<TypeMap>,
    entries: Vec<(String, SupportEntry)>,
}

impl Default for SupportTable {
    fn default() -> Self {
        Self::new(Arc::new(TypeMap::new()))
    }
}

impl std::fmt::Debug for SupportTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupportTable")
            .field("types", &self.type_map.len())
            .field("entries", &self.entries.iter().map(|(name, _)| name).collect::<Vec<_>>())
            .finish()
    }
}

impl SupportTable {
    pub fn new(type_map: Arc<TypeMap>) -> Self {
        Self {
            type_map,
            entries: Vec::new(),
        }
    }

    /// The type map shared by the host and every plugin.
    pub fn type_map(&self) -> &Arc<TypeMap> {
        &self.type_map
    }

    /// Add an entry; a later entry with the same name shadows earlier ones.
    pub fn with<T: Any + Send + Sync>(mut self, name: impl Into<String>, value: Arc<T>) -> Self {
        self.entries.insert(0, (name.into(), value as SupportEntry));
        self
    }

    /// In-process lookup of a named entry. Always `None` when `T` comes from
    /// a different build of the type than the one that stored it.
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, entry)| Arc::clone(entry).downcast::<T>().ok())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_map_ids_are_stable() {
        let map = TypeMap::new();
        let a = map.get_id("mediagraph:props:volume");
        let b = map.get_id("mediagraph:props:mute");
        assert_ne!(a, b);
        assert_eq!(map.get_id("mediagraph:props:volume"), a);
        assert_eq!(map.find_id("mediagraph:props:mute"), Some(b));
        assert_eq!(map.find_id("unknown"), None);
        assert_eq!(map.get_name(a).as_deref(), Some("mediagraph:props:volume"));
    }

    #[test]
    fn test_support_lookup_by_name_and_type() {
        let type_map = Arc::new(TypeMap::new());
        let support = SupportTable::new(Arc::clone(&type_map)).with("answer", Arc::new(42u32));

        assert!(Arc::ptr_eq(support.type_map(), &type_map));
        assert_eq!(support.get::<u32>("answer").as_deref(), Some(&42));
        assert!(support.get::<String>("answer").is_none());
        assert!(support.get::<u32>("missing").is_none());
    }
}
